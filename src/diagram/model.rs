//! Diagram markup: the Excalidraw-flavoured JSON object the model embeds in
//! question statements and options.
//!
//! ```json
//! {"type":"excalidraw","version":2,"source":"...","elements":[
//!   {"type":"rectangle","x":0,"y":0,"width":100,"height":50},
//!   {"type":"text","x":10,"y":10,"text":"A","fontSize":16}
//! ]}
//! ```
//!
//! Element kinds this crate cannot draw (arrows, freehand strokes, …)
//! deserialize to [`DiagramElement::Unsupported`] and are skipped at layout
//! time instead of failing the whole diagram.

use crate::error::MarkupError;
use serde::{Deserialize, Serialize};

/// Value of the top-level `type` field that identifies a diagram document.
pub const DIAGRAM_MARKER: &str = "excalidraw";

pub const DEFAULT_STROKE_COLOR: &str = "#000000";
pub const DEFAULT_BACKGROUND_COLOR: &str = "transparent";
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;
pub const DEFAULT_FONT_SIZE: f64 = 16.0;

/// The only accepted document type. Any other `type` fails deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DiagramKind {
    #[default]
    #[serde(rename = "excalidraw")]
    Excalidraw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagramDocument {
    #[serde(rename = "type")]
    pub kind: DiagramKind,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub elements: Vec<DiagramElement>,
}

fn default_version() -> u32 {
    2
}

impl DiagramDocument {
    pub fn new(elements: Vec<DiagramElement>) -> Self {
        Self {
            kind: DiagramKind::Excalidraw,
            version: default_version(),
            source: String::new(),
            elements,
        }
    }

    /// Parse a diagram document from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, MarkupError> {
        serde_json::from_str(json).map_err(|e| MarkupError::InvalidDiagram(e.to_string()))
    }

    /// Parse a diagram document from an already-decoded JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self, MarkupError> {
        serde_json::from_value(value).map_err(|e| MarkupError::InvalidDiagram(e.to_string()))
    }

    /// Append an element, returning the document for chaining.
    pub fn with(mut self, element: DiagramElement) -> Self {
        self.elements.push(element);
        self
    }
}

/// One shape of a diagram, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DiagramElement {
    Rectangle(BoxShape),
    Ellipse(BoxShape),
    Polygon(PathShape),
    Line(PathShape),
    Text(TextShape),
    #[serde(other)]
    Unsupported,
}

impl DiagramElement {
    pub fn rectangle(x: f64, y: f64, width: f64, height: f64) -> Self {
        DiagramElement::Rectangle(BoxShape::new(x, y, width, height))
    }

    pub fn ellipse(x: f64, y: f64, width: f64, height: f64) -> Self {
        DiagramElement::Ellipse(BoxShape::new(x, y, width, height))
    }

    pub fn polygon(x: f64, y: f64, points: Vec<[f64; 2]>) -> Self {
        DiagramElement::Polygon(PathShape::new(x, y, points))
    }

    pub fn line(x: f64, y: f64, points: Vec<[f64; 2]>) -> Self {
        DiagramElement::Line(PathShape::new(x, y, points))
    }

    pub fn text(x: f64, y: f64, text: impl Into<String>, font_size: f64) -> Self {
        DiagramElement::Text(TextShape {
            id: None,
            x,
            y,
            text: text.into(),
            font_size: Some(font_size),
            style: Style::default(),
        })
    }

    pub fn style(&self) -> Option<&Style> {
        match self {
            DiagramElement::Rectangle(s) | DiagramElement::Ellipse(s) => Some(&s.style),
            DiagramElement::Polygon(s) | DiagramElement::Line(s) => Some(&s.style),
            DiagramElement::Text(s) => Some(&s.style),
            DiagramElement::Unsupported => None,
        }
    }
}

/// Rectangle and ellipse geometry: the top-left corner and the size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(flatten)]
    pub style: Style,
}

impl BoxShape {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: None,
            x,
            y,
            width,
            height,
            style: Style::default(),
        }
    }
}

/// Polygon and line geometry: an origin plus points relative to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub points: Vec<[f64; 2]>,
    #[serde(flatten)]
    pub style: Style,
}

impl PathShape {
    pub fn new(x: f64, y: f64, points: Vec<[f64; 2]>) -> Self {
        Self {
            id: None,
            x,
            y,
            points,
            style: Style::default(),
        }
    }

    /// Points translated into document coordinates.
    pub fn absolute_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().map(|[dx, dy]| (self.x + dx, self.y + dy))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextShape {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "fontSize", default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    #[serde(flatten)]
    pub style: Style,
}

impl TextShape {
    pub fn font_size(&self) -> f64 {
        self.font_size.unwrap_or(DEFAULT_FONT_SIZE)
    }
}

/// Optional paint attributes shared by every element kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Style {
    #[serde(rename = "strokeColor", default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(rename = "backgroundColor", default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(rename = "strokeWidth", default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

impl Style {
    pub fn stroke_color(&self) -> &str {
        non_empty(self.stroke_color.as_deref()).unwrap_or(DEFAULT_STROKE_COLOR)
    }

    pub fn background_color(&self) -> &str {
        non_empty(self.background_color.as_deref()).unwrap_or(DEFAULT_BACKGROUND_COLOR)
    }

    pub fn stroke_width(&self) -> f64 {
        self.stroke_width.unwrap_or(DEFAULT_STROKE_WIDTH)
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
