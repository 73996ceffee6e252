//! Math typesetting behind a small trait so the renderer can be tested
//! against a deterministic engine.
//!
//! The default [`MathMlEngine`] converts the KaTeX-style LaTeX the model is
//! told to emit into MathML via `latex2mathml`. That converter is lenient:
//! it reports parse errors inline, drops spaces in `\text{…}`, knows no
//! `array` or `\hline`, and leaves `<` unescaped. [`MathMlEngine`] rewrites
//! the input before the call and repairs the output after it.

use crate::error::MarkupError;
use once_cell::sync::Lazy;
use quick_xml::escape::{escape, unescape};
use regex::{Captures, Regex};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Inline,
    Block,
}

pub trait MathEngine: Send + Sync {
    /// Typeset one LaTeX fragment (without its `$` delimiters).
    fn typeset(&self, tex: &str, mode: DisplayMode) -> Result<String, MarkupError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MathMlEngine;

impl MathEngine for MathMlEngine {
    fn typeset(&self, tex: &str, mode: DisplayMode) -> Result<String, MarkupError> {
        check_braces(tex)?;
        let prepared = Prepared::new(tex);
        let style = match mode {
            DisplayMode::Inline => latex2mathml::DisplayStyle::Inline,
            DisplayMode::Block => latex2mathml::DisplayStyle::Block,
        };
        let mathml =
            latex2mathml::latex_to_mathml(&prepared.tex, style).map_err(|e| MarkupError::Typeset {
                tex: tex.to_string(),
                detail: format!("{e:?}"),
            })?;
        if let Some(at) = mathml.find(PARSE_ERROR_MARKER) {
            let detail = mathml[at..].split('<').next().unwrap_or_default();
            return Err(MarkupError::Typeset {
                tex: tex.to_string(),
                detail: detail.to_string(),
            });
        }
        Ok(prepared.finish(&mathml))
    }
}

// ── Pre- and post-processing ─────────────────────────────────────────────

/// How `latex2mathml` reports an unknown command or stray token in an `Ok` result.
const PARSE_ERROR_MARKER: &str = "[PARSE ERROR";

/// Letters only, so the converter keeps it as one run of `<mtext>`.
const TEXT_PLACEHOLDER: &str = "pdfqtextslot";

static RE_TEXT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\text\{([^}]*)\}").unwrap());
static RE_ARRAY_BEGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\begin\{array\}\s*\{([^}]*)\}").unwrap());
static RE_HLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\hline\b").unwrap());
static RE_TRAILING_ROW_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\\\\s*\\end\{matrix\}").unwrap());
static RE_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)<(mi|mo|mn|mtext|ms)(\s[^>]*)?>(.*?)</(?:mi|mo|mn|mtext|ms)>").unwrap()
});

/// A fragment rewritten into the subset `latex2mathml` handles.
struct Prepared {
    tex: String,
    /// `\text{…}` bodies, in order; slot `i` is `placeholder(i)` in `tex`.
    texts: Vec<String>,
    /// An `array` had `|` columns or `\hline` rows.
    ruled: bool,
}

impl Prepared {
    fn new(tex: &str) -> Self {
        let mut texts = Vec::new();
        let tex = RE_TEXT.replace_all(tex, |c: &Captures| {
            texts.push(c[1].to_string());
            format!(r"\text{{{}}}", placeholder(texts.len() - 1))
        });

        let mut ruled = RE_HLINE.is_match(&tex);
        let tex = RE_ARRAY_BEGIN.replace_all(&tex, |c: &Captures| {
            ruled |= c[1].contains('|');
            r"\begin{matrix}".to_string()
        });
        let tex = RE_HLINE.replace_all(&tex, "").replace(r"\end{array}", r"\end{matrix}");
        let tex = RE_TRAILING_ROW_BREAK
            .replace_all(&tex, r"\end{matrix}")
            .into_owned();

        Self { tex, texts, ruled }
    }

    fn finish(&self, mathml: &str) -> String {
        let mut out = RE_TOKEN
            .replace_all(mathml, |c: &Captures| {
                let body = &c[3];
                let body = match unescape(body) {
                    Ok(raw) => escape(raw.as_ref()).into_owned(),
                    Err(_) => escape(body).into_owned(),
                };
                format!("<{}{}>{}</{}>", &c[1], c.get(2).map_or("", |m| m.as_str()), body, &c[1])
            })
            .into_owned();

        // Highest index first so slot `b` is not matched inside slot `ba`.
        for (i, text) in self.texts.iter().enumerate().rev() {
            let shown = escape(text.as_str()).replace(' ', "\u{a0}");
            out = out.replace(&placeholder(i), &shown);
        }
        if self.ruled {
            out = out.replace(
                "<mtable",
                r#"<mtable frame="solid" rowlines="solid" columnlines="solid""#,
            );
        }
        out
    }
}

/// `pdfqtextslot` followed by the index spelled in letters (`a` = 0).
fn placeholder(index: usize) -> String {
    let letters: String = index
        .to_string()
        .bytes()
        .map(|d| char::from(b'a' + (d - b'0')))
        .collect();
    format!("{TEXT_PLACEHOLDER}{letters}")
}

/// Reject fragments whose unescaped `{`/`}` do not pair up.
pub fn check_braces(tex: &str) -> Result<(), MarkupError> {
    let mut depth: i64 = 0;
    let mut chars = tex.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth < 0 {
                    return Err(unbalanced(tex, "unexpected '}'"));
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(unbalanced(tex, "missing '}'"));
    }
    Ok(())
}

fn unbalanced(tex: &str, detail: &str) -> MarkupError {
    MarkupError::Typeset {
        tex: tex.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_fragments_pass() {
        assert!(check_braces(r"\frac{a}{b}").is_ok());
        assert!(check_braces(r"\{ x \}").is_ok());
        assert!(check_braces("x^2").is_ok());
    }

    #[test]
    fn unbalanced_fragments_fail() {
        assert!(matches!(check_braces(r"\frac{a}{b"), Err(MarkupError::Typeset { .. })));
        assert!(check_braces("a}{").is_err());
    }

    #[test]
    fn mathml_engine_produces_math_element() {
        let out = MathMlEngine.typeset("x^2", DisplayMode::Inline).expect("typesets");
        assert!(out.contains("<math"), "{out}");
        let block = MathMlEngine.typeset("x^2", DisplayMode::Block).expect("typesets");
        assert!(block.contains("block"), "{block}");
    }

    #[test]
    fn mathml_engine_rejects_unbalanced_input() {
        assert!(MathMlEngine.typeset(r"\sqrt{2", DisplayMode::Inline).is_err());
    }

    #[test]
    fn unknown_commands_and_stray_tokens_are_errors() {
        for tex in [r"\foo x", "a & b"] {
            match MathMlEngine.typeset(tex, DisplayMode::Inline) {
                Err(MarkupError::Typeset { detail, .. }) => {
                    assert!(detail.starts_with(PARSE_ERROR_MARKER), "{detail}")
                }
                other => panic!("{tex}: expected typeset error, got {other:?}"),
            }
        }
    }

    #[test]
    fn text_keeps_its_spaces() {
        let out = MathMlEngine
            .typeset(r"\text{A } 4 \times 4 \text{ digital image}", DisplayMode::Inline)
            .expect("typesets");
        assert!(out.contains("A\u{a0}"), "{out}");
        assert!(out.contains("\u{a0}digital\u{a0}image"), "{out}");
        assert!(!out.contains("digitalimage"), "{out}");
        assert!(!out.contains(TEXT_PLACEHOLDER), "{out}");
    }

    #[test]
    fn text_bodies_are_escaped() {
        let out = MathMlEngine
            .typeset(r"\text{a<b} + \text{c}", DisplayMode::Inline)
            .expect("typesets");
        assert!(out.contains("a&lt;b"), "{out}");
        assert!(!out.contains("a<b"), "{out}");
    }

    #[test]
    fn ruled_array_becomes_framed_table() {
        let tex = "\\begin{array}{|c|c|}\n\\hline\n0 & 7 \\\\\n\\hline\n4 & 5 \\\\\n\\hline\n\\end{array}";
        let out = MathMlEngine.typeset(tex, DisplayMode::Block).expect("typesets");
        assert!(out.contains("<mtable"), "{out}");
        assert!(out.contains(r#"rowlines="solid""#), "{out}");
        assert!(!out.contains("hline"), "{out}");
        assert!(!out.contains(PARSE_ERROR_MARKER), "{out}");
    }

    #[test]
    fn plain_array_has_no_rules() {
        let out = MathMlEngine
            .typeset(r"\begin{array}{cc} 1 & 2 \\ 3 & 4 \end{array}", DisplayMode::Inline)
            .expect("typesets");
        assert!(out.contains("<mtable"), "{out}");
        assert!(!out.contains("rowlines"), "{out}");
    }

    #[test]
    fn relations_are_escaped_in_tokens() {
        let out = MathMlEngine.typeset("x<3", DisplayMode::Inline).expect("typesets");
        assert!(!out.contains("<mo><</mo>"), "{out}");
        assert!(out.contains("&lt;"), "{out}");
    }

    #[test]
    fn placeholders_are_letters_only() {
        assert_eq!(placeholder(0), "pdfqtextslota");
        assert_eq!(placeholder(12), "pdfqtextslotbc");
    }
}
