//! Content renderer: token sequence → renderable nodes → HTML.
//!
//! Each segment maps to exactly one node, in input order:
//!
//! | Segment        | Node                                              |
//! |----------------|---------------------------------------------------|
//! | `Text`         | `Text` (verbatim)                                 |
//! | `InlineMath`   | `Math { Inline }`, or `Text` with the source on failure |
//! | `BlockMath`    | `Math { Block }`, or `Text` with the source on failure  |
//! | `Diagram`      | `Diagram` holding the SVG from the geometry engine |
//!
//! Rendering has no side effects; the same input always yields the same nodes.

use crate::diagram::model::DiagramDocument;
use crate::diagram::svg::diagram_to_svg;
use crate::markup::math::{DisplayMode, MathEngine, MathMlEngine};
use crate::markup::tokenizer::{tokenize, ContentSegment};
use quick_xml::escape::escape;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderNode {
    Text { text: String },
    Math { markup: String, display: DisplayMode },
    Diagram { svg: String },
}

impl RenderNode {
    /// HTML for this node. Diagrams sit in a bordered container.
    pub fn to_html(&self) -> String {
        match self {
            RenderNode::Text { text } => escape(text.as_str()).into_owned(),
            RenderNode::Math {
                markup,
                display: DisplayMode::Inline,
            } => format!(r#"<span class="math-inline">{markup}</span>"#),
            RenderNode::Math {
                markup,
                display: DisplayMode::Block,
            } => format!(r#"<div class="math-block">{markup}</div>"#),
            RenderNode::Diagram { svg } => format!(r#"<div class="diagram">{svg}</div>"#),
        }
    }
}

/// Renders question markup with a pluggable math engine.
#[derive(Debug, Clone, Default)]
pub struct ContentRenderer<E = MathMlEngine> {
    engine: E,
}

impl ContentRenderer<MathMlEngine> {
    pub fn new() -> Self {
        Self {
            engine: MathMlEngine,
        }
    }
}

impl<E: MathEngine> ContentRenderer<E> {
    pub fn with_engine(engine: E) -> Self {
        Self { engine }
    }

    /// Render pre-tokenized segments.
    pub fn render(&self, segments: &[ContentSegment]) -> Vec<RenderNode> {
        segments.iter().map(|s| self.render_segment(s)).collect()
    }

    /// Tokenize and render a content string.
    pub fn render_content(&self, content: &str) -> Vec<RenderNode> {
        self.render(&tokenize(content))
    }

    /// Tokenize, render and serialise a content string as an HTML fragment.
    pub fn render_html(&self, content: &str) -> String {
        nodes_to_html(&self.render_content(content))
    }

    pub fn render_diagram(&self, document: &DiagramDocument) -> RenderNode {
        RenderNode::Diagram {
            svg: diagram_to_svg(document),
        }
    }

    fn render_segment(&self, segment: &ContentSegment) -> RenderNode {
        match segment {
            ContentSegment::Text { text } => RenderNode::Text { text: text.clone() },
            ContentSegment::InlineMath { tex, .. } => self.math(segment, tex, DisplayMode::Inline),
            ContentSegment::BlockMath { tex } => self.math(segment, tex, DisplayMode::Block),
            ContentSegment::Diagram { document, .. } => self.render_diagram(document),
        }
    }

    fn math(&self, segment: &ContentSegment, tex: &str, display: DisplayMode) -> RenderNode {
        match self.engine.typeset(tex, display) {
            Ok(markup) => RenderNode::Math { markup, display },
            Err(e) => {
                debug!("Math fallback to literal text: {e}");
                RenderNode::Text {
                    text: segment.source().into_owned(),
                }
            }
        }
    }
}

/// Serialise nodes into one HTML fragment. Newlines in text are kept and
/// shown by the `white-space: pre-wrap` container style.
pub fn nodes_to_html(nodes: &[RenderNode]) -> String {
    let body: String = nodes.iter().map(RenderNode::to_html).collect();
    format!(r#"<div class="question-content">{body}</div>"#)
}
