//! Mixed-markup tokenizer: split question text into prose, math and diagram segments.
//!
//! Recognition order, left to right and non-overlapping:
//!
//! 1. the first embedded diagram document: a brace-balanced JSON object
//!    whose top-level `type` is [`DIAGRAM_MARKER`]; the text on either side
//!    is tokenized independently by the remaining rules
//! 2. block math `$$…$$`
//! 3. inline math `$…$`
//! 4. bare commands outside delimiters: `\text{…}`, `\frac{…}{…}`, `\name`
//! 5. everything else, kept verbatim
//!
//! Concatenating [`ContentSegment::source`] over the output always yields the
//! input string again.
//!
//! When the diagram marker is present but no span around it parses, the
//! whole string is returned as a single [`ContentSegment::Text`] so a
//! half-interpreted diagram never reaches the renderer.

use crate::diagram::model::{DiagramDocument, DIAGRAM_MARKER};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use tracing::{debug, warn};

/// A classified, contiguous span of question markup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSegment {
    Text { text: String },
    /// `delimited` is false for a bare command such as `\alpha`, whose
    /// source carries no `$` delimiters.
    InlineMath { tex: String, delimited: bool },
    BlockMath { tex: String },
    Diagram {
        document: DiagramDocument,
        source: String,
    },
}

impl ContentSegment {
    pub fn text(s: impl Into<String>) -> Self {
        ContentSegment::Text { text: s.into() }
    }

    /// The exact slice of the input this segment was cut from.
    pub fn source(&self) -> Cow<'_, str> {
        match self {
            ContentSegment::Text { text } => Cow::Borrowed(text),
            ContentSegment::InlineMath {
                tex,
                delimited: false,
            } => Cow::Borrowed(tex),
            ContentSegment::InlineMath {
                tex,
                delimited: true,
            } => Cow::Owned(format!("${tex}$")),
            ContentSegment::BlockMath { tex } => Cow::Owned(format!("$${tex}$$")),
            ContentSegment::Diagram { source, .. } => Cow::Borrowed(source),
        }
    }
}

/// Concatenate the source text of `segments`.
pub fn reconstruct(segments: &[ContentSegment]) -> String {
    segments.iter().map(|s| s.source()).collect()
}

static RE_DIAGRAM_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r#""type"\s*:\s*"{}""#, regex::escape(DIAGRAM_MARKER))).unwrap()
});

// Alternation is leftmost-first, so `$$` wins over `$` at the same offset
// and a bare `\begin{array}` table is taken whole before `\begin` alone.
static RE_MATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)\$\$.+?\$\$|\$[^$]+?\$|\\begin\{array\}.*?\\end\{array\}|\\text\{[^}]*\}|\\frac\{[^}]*\}\{[^}]*\}|\\[a-zA-Z]+",
    )
    .unwrap()
});

/// Split `content` into ordered segments.
pub fn tokenize(content: &str) -> Vec<ContentSegment> {
    let mut segments = Vec::new();
    match find_diagram(content) {
        DiagramScan::Absent => tokenize_math(content, &mut segments),
        DiagramScan::Found {
            start,
            end,
            document,
        } => {
            let rest = &content[end..];
            if RE_DIAGRAM_MARKER.is_match(rest) {
                debug!("Second diagram marker after offset {end}; treating it as text");
            }
            tokenize_math(&content[..start], &mut segments);
            segments.push(ContentSegment::Diagram {
                document,
                source: content[start..end].to_string(),
            });
            tokenize_math(rest, &mut segments);
        }
        DiagramScan::Malformed => {
            warn!("Diagram marker present but no parsable diagram JSON; rendering as text");
            segments.push(ContentSegment::text(content));
        }
    }
    segments
}

fn tokenize_math(text: &str, out: &mut Vec<ContentSegment>) {
    let mut last = 0;
    for m in RE_MATH.find_iter(text) {
        if m.start() > last {
            out.push(ContentSegment::text(&text[last..m.start()]));
        }
        out.push(classify_math(m.as_str()));
        last = m.end();
    }
    if last < text.len() {
        out.push(ContentSegment::text(&text[last..]));
    }
}

fn classify_math(fragment: &str) -> ContentSegment {
    if let Some(inner) = fragment
        .strip_prefix("$$")
        .and_then(|s| s.strip_suffix("$$"))
    {
        ContentSegment::BlockMath {
            tex: inner.to_string(),
        }
    } else if let Some(inner) = fragment.strip_prefix('$').and_then(|s| s.strip_suffix('$')) {
        ContentSegment::InlineMath {
            tex: inner.to_string(),
            delimited: true,
        }
    } else {
        ContentSegment::InlineMath {
            tex: fragment.to_string(),
            delimited: false,
        }
    }
}

#[derive(Debug)]
enum DiagramScan {
    Absent,
    Found {
        start: usize,
        end: usize,
        document: DiagramDocument,
    },
    Malformed,
}

/// Locate the first brace-balanced span that carries the marker and parses.
fn find_diagram(content: &str) -> DiagramScan {
    if !RE_DIAGRAM_MARKER.is_match(content) {
        return DiagramScan::Absent;
    }
    for (start, _) in content.match_indices('{') {
        let Some(end) = balanced_object_end(content, start) else {
            continue;
        };
        let span = &content[start..end];
        if !RE_DIAGRAM_MARKER.is_match(span) {
            continue;
        }
        match DiagramDocument::from_json(span) {
            Ok(document) => {
                return DiagramScan::Found {
                    start,
                    end,
                    document,
                }
            }
            Err(e) => debug!("Candidate diagram at offset {start} rejected: {e}"),
        }
    }
    DiagramScan::Malformed
}

/// Byte offset just past the `}` closing the object opened at `start`.
///
/// Braces inside JSON string literals are ignored.
fn balanced_object_end(content: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, byte) in content.as_bytes()[start..].iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIAGRAM: &str = r##"{"type":"excalidraw","version":2,"source":"t","elements":[{"type":"rectangle","x":0,"y":0,"width":100,"height":50,"strokeColor":"#000000"}]}"##;

    fn kinds(segments: &[ContentSegment]) -> Vec<&'static str> {
        segments
            .iter()
            .map(|s| match s {
                ContentSegment::Text { .. } => "text",
                ContentSegment::InlineMath { delimited: true, .. } => "inline",
                ContentSegment::InlineMath { delimited: false, .. } => "bare",
                ContentSegment::BlockMath { .. } => "block",
                ContentSegment::Diagram { .. } => "diagram",
            })
            .collect()
    }

    #[test]
    fn plain_text_is_one_segment() {
        let segs = tokenize("What is the capital\nof France?");
        assert_eq!(segs, vec![ContentSegment::text("What is the capital\nof France?")]);
    }

    #[test]
    fn empty_input_has_no_segments() {
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn inline_and_block_math() {
        let input = "Let $x^2$ be given:\n$$\\int_0^1 x\\,dx$$ done";
        let segs = tokenize(input);
        assert_eq!(kinds(&segs), vec!["text", "inline", "text", "block", "text"]);
        assert_eq!(
            segs[1],
            ContentSegment::InlineMath {
                tex: "x^2".into(),
                delimited: true
            }
        );
        assert_eq!(
            segs[3],
            ContentSegment::BlockMath {
                tex: "\\int_0^1 x\\,dx".into()
            }
        );
        assert_eq!(reconstruct(&segs), input);
    }

    #[test]
    fn bare_commands_become_inline_math() {
        let input = r"\text{A } 4 \times 4 \text{ image}, U \leq 4 and \frac{a}{b}";
        let segs = tokenize(input);
        assert_eq!(
            kinds(&segs),
            vec!["bare", "text", "bare", "text", "bare", "text", "bare", "text", "bare"]
        );
        assert_eq!(
            segs[0],
            ContentSegment::InlineMath {
                tex: r"\text{A }".into(),
                delimited: false
            }
        );
        assert_eq!(
            segs[8],
            ContentSegment::InlineMath {
                tex: r"\frac{a}{b}".into(),
                delimited: false
            }
        );
        assert_eq!(reconstruct(&segs), input);
    }

    #[test]
    fn bare_array_table_is_one_fragment() {
        let table = "\\begin{array}{|c|c|}\n\\hline\n0 & 7 \\\\\n\\hline\n\\end{array}";
        let input = format!("Count:\n\n{table}\nthen \\hline");
        let segs = tokenize(&input);
        assert_eq!(kinds(&segs), vec!["text", "bare", "text", "bare"]);
        assert_eq!(
            segs[1],
            ContentSegment::InlineMath {
                tex: table.into(),
                delimited: false
            }
        );
        assert_eq!(reconstruct(&segs), input);
    }

    #[test]
    fn adjacent_inline_then_block() {
        let input = "a$x$$$y$$";
        let segs = tokenize(input);
        assert_eq!(kinds(&segs), vec!["text", "inline", "block"]);
        assert_eq!(reconstruct(&segs), input);
    }

    #[test]
    fn unbalanced_dollar_stays_text() {
        let input = "costs $5 only";
        assert_eq!(tokenize(input), vec![ContentSegment::text(input)]);
    }

    #[test]
    fn diagram_splits_surrounding_text() {
        let input = format!("Consider $P$ in the figure:\n\n{DIAGRAM}\n\nFind \\alpha.");
        let segs = tokenize(&input);
        assert_eq!(
            kinds(&segs),
            vec!["text", "inline", "text", "diagram", "text", "bare", "text"]
        );
        match &segs[3] {
            ContentSegment::Diagram { document, source } => {
                assert_eq!(source, DIAGRAM);
                assert_eq!(document.elements.len(), 1);
            }
            other => panic!("expected diagram, got {other:?}"),
        }
        assert_eq!(reconstruct(&segs), input);
    }

    #[test]
    fn braces_in_preceding_math_do_not_hide_the_diagram() {
        let input = format!("\\frac{{1}}{{2}} of {DIAGRAM}");
        let segs = tokenize(&input);
        assert_eq!(kinds(&segs), vec!["bare", "text", "diagram"]);
    }

    #[test]
    fn braces_inside_json_strings_are_ignored() {
        let doc = r#"{"type":"excalidraw","elements":[{"type":"text","x":0,"y":0,"text":"}{"}]}"#;
        let segs = tokenize(doc);
        assert_eq!(kinds(&segs), vec!["diagram"]);
    }

    #[test]
    fn second_diagram_is_left_as_text() {
        let input = format!("{DIAGRAM} and {DIAGRAM}");
        let segs = tokenize(&input);
        assert_eq!(segs.iter().filter(|s| matches!(s, ContentSegment::Diagram { .. })).count(), 1);
        assert!(matches!(segs[0], ContentSegment::Diagram { .. }));
        assert_eq!(reconstruct(&segs), input);
    }

    #[test]
    fn malformed_diagram_falls_back_to_whole_text() {
        let input = r#"See $x$ {"type": "excalidraw", "elements": [ {"type":"rectangle", "x": }"#;
        assert_eq!(tokenize(input), vec![ContentSegment::text(input)]);
    }

    #[test]
    fn reconstruction_is_lossless_for_mixed_compositions() {
        let pieces = [
            "plain words ",
            "$a+b$",
            "\n\n",
            "$$\\sum_{i=1}^n i$$",
            " tail with 100% & <html> ",
            "\\beta",
            DIAGRAM,
            "\u{00e9}t\u{00e9} ",
        ];
        // Every rotation of the pieces, so the diagram lands in each position.
        for shift in 0..pieces.len() {
            let input: String = pieces.iter().cycle().skip(shift).take(pieces.len()).copied().collect();
            let segs = tokenize(&input);
            assert_eq!(reconstruct(&segs), input, "rotation {shift}");
            assert_eq!(
                segs.iter().filter(|s| matches!(s, ContentSegment::Diagram { .. })).count(),
                1
            );
        }
    }
}
