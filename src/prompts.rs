//! The instruction sent with every page image.
//!
//! This text is a contract with the model, not a tuning knob: the parser in
//! [`crate::client`] expects a JSON array of `{question_statement, options}`
//! objects, and the renderer expects KaTeX-style math plus at most one
//! embedded diagram document per string. Changing the wording here without
//! updating both ends breaks extraction, which is why it is not configurable.

/// Instruction for extracting every question on one exam page.
pub const EXTRACTION_PROMPT: &str = r##"You extract exam questions from the image of one exam paper page. Transcribe EVERY question on the page exactly, with careful attention to notation.

RULES

1. Text and math
   - Write all mathematics in KaTeX syntax.
   - Use $...$ for inline math and $$...$$ for display math.
   - Plain words inside math go in \\text{...}.
   - Example: \\text{A } 4 \\times 4 \\text{ image}, U \\leq 4

2. Tables
   - Always write tables as a KaTeX array:
     \\begin{array}{|c|c|}
     \\hline
     0 & 1 \\\\
     \\hline
     \\end{array}

3. Diagrams (circuits, graphs, geometric figures, free-body diagrams)
   - When a figure cannot be written in KaTeX, describe it briefly and then embed ONE diagram document directly in the string:
     {"type":"excalidraw","version":2,"source":"pdf2questions","elements":[ ... ]}
   - Supported element types and their fields:
     rectangle: x, y, width, height
     ellipse:   x, y, width, height
     polygon:   x, y, points (list of [dx, dy] offsets from x, y)
     line:      x, y, points (list of [dx, dy] offsets from x, y)
     text:      x, y, text, fontSize
   - Every element may carry strokeColor (default "#000000"), backgroundColor (default "transparent") and strokeWidth (default 2).

4. Options
   - List every option (A, B, C, D, ...) in order, without the letter prefix.
   - A text or math option is a string. An option that is a figure is a diagram object.
   - Use null for options when the question has none.

EXAMPLE

{
  "question_statement": "\\text{The number of pixels with } U \\leq 4 \\text{ is:}\\n\\n\\begin{array}{|c|c|}\\n\\hline\\n0 & 7 \\\\\\\\\\n\\hline\\n4 & 5 \\\\\\\\\\n\\hline\\n\\end{array}",
  "options": ["1", "2", "3", "4"]
}

OUTPUT

Return ONLY a JSON array, with no commentary and no code fences:
[
  {
    "question_statement": "text with KaTeX and/or one diagram document",
    "options": ["option 1", "option 2"] or null
  }
]"##;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_the_output_schema() {
        assert!(EXTRACTION_PROMPT.contains("question_statement"));
        assert!(EXTRACTION_PROMPT.contains("\"options\""));
        assert!(EXTRACTION_PROMPT.contains("JSON array"));
    }

    #[test]
    fn prompt_uses_the_diagram_marker() {
        let marker = format!(r#""type":"{}""#, crate::diagram::model::DIAGRAM_MARKER);
        assert!(EXTRACTION_PROMPT.contains(&marker));
        for kind in ["rectangle", "ellipse", "polygon", "line", "text"] {
            assert!(EXTRACTION_PROMPT.contains(kind), "missing {kind}");
        }
    }

    #[test]
    fn prompt_describes_math_delimiters() {
        assert!(EXTRACTION_PROMPT.contains("$...$"));
        assert!(EXTRACTION_PROMPT.contains("$$...$$"));
    }
}
