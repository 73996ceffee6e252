//! HTML preview of extracted questions.
//!
//! Each card shows the statement, the options labelled `A.`, `B.`, … and a
//! footer with the marking scheme. Statements and string options go through
//! the [`ContentRenderer`]; diagram options are drawn directly.

use super::content::{nodes_to_html, ContentRenderer};
use crate::markup::math::MathEngine;
use crate::question::{ExtractedQuestion, QuestionOption, QuestionRecord};
use quick_xml::escape::escape;
use std::fmt::Write;

const PAGE_STYLE: &str = "\
body{font-family:system-ui,sans-serif;max-width:860px;margin:2rem auto;color:#111827}\
.question{border:1px solid #e5e7eb;border-radius:8px;padding:1.5rem;margin-bottom:1.5rem}\
.question-header{font-size:.875rem;color:#6b7280;margin-bottom:1rem}\
.question-content{white-space:pre-wrap;line-height:1.6}\
.option{display:flex;gap:.75rem;padding:.75rem;background:#f9fafb;border-radius:8px;margin-top:.5rem}\
.option-label{font-weight:600;color:#4b5563}\
.diagram{border:1px solid #d1d5db;border-radius:6px;padding:.5rem;margin:.5rem 0}\
.footer{display:flex;flex-wrap:wrap;gap:1.5rem;margin-top:1rem;padding-top:1rem;border-top:1px solid #e5e7eb;font-size:.75rem;color:#4b5563}";

/// `A`, `B`, …, `Z`, then `AA`, `AB`, …
pub fn option_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}

impl<E: MathEngine> ContentRenderer<E> {
    /// One question card. `number` is 1-based.
    pub fn render_question_html(&self, question: &ExtractedQuestion, number: usize) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            r#"<div class="question"><div class="question-header">Question {number}</div>{}"#,
            self.render_html(&question.question_statement)
        );

        if let Some(options) = question.options.as_ref().filter(|o| !o.is_empty()) {
            html.push_str(r#"<div class="options"><p>Options:</p>"#);
            for (i, option) in options.iter().enumerate() {
                let body = match option {
                    QuestionOption::Markup(text) => self.render_html(text),
                    QuestionOption::Diagram(doc) => nodes_to_html(&[self.render_diagram(doc)]),
                };
                let _ = write!(
                    html,
                    r#"<div class="option"><span class="option-label">{}.</span>{body}</div>"#,
                    option_label(i)
                );
            }
            html.push_str("</div>");
        }

        let _ = write!(
            html,
            r#"<div class="footer"><span>Type: {}</span><span>Correct: +{}</span><span>Incorrect: {}</span><span>Skipped: {}</span><span>Time: {} min</span></div></div>"#,
            escape(question.question_type.as_str()),
            question.correct_marks,
            question.incorrect_marks,
            question.skipped_marks,
            question.time_minutes
        );
        html
    }

    /// A standalone HTML document listing every record.
    pub fn render_preview_page(&self, records: &[QuestionRecord]) -> String {
        let mut html = String::new();
        let _ = write!(
            html,
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>Extracted Questions</title><style>{PAGE_STYLE}</style></head><body><h1>Extracted Questions ({})</h1>",
            records.len()
        );
        for (i, record) in records.iter().enumerate() {
            html.push_str(&self.render_question_html(&record.question, i + 1));
        }
        html.push_str("</body></html>\n");
        html
    }
}

/// Render one question with the default math engine.
pub fn render_question_html(question: &ExtractedQuestion, number: usize) -> String {
    ContentRenderer::new().render_question_html(question, number)
}

/// Render a full preview page with the default math engine.
pub fn render_preview_page(records: &[QuestionRecord]) -> String {
    ContentRenderer::new().render_preview_page(records)
}
