//! Rendering of question markup to HTML.
//!
//! 1. [`content`] — token sequence → [`RenderNode`]s (text, typeset math, SVG diagrams)
//! 2. [`preview`] — question cards and a standalone preview page

pub mod content;
pub mod preview;

pub use content::{nodes_to_html, ContentRenderer, RenderNode};
pub use preview::{option_label, render_preview_page, render_question_html};
