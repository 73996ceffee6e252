//! Diagram geometry: bounding box and draw primitives for a
//! [`DiagramDocument`].
//!
//! Layout is a pure function of the document. No text metrics are available,
//! so a text label is assumed to occupy a fixed [`TEXT_EXTENT`] box from its
//! anchor. The union of all element extents is padded by [`PADDING`] on every
//! side and becomes the output coordinate frame (the SVG `viewBox`).

use super::model::{BoxShape, DiagramDocument, DiagramElement, PathShape, TextShape};
use serde::Serialize;

/// Margin added around the content on every side.
pub const PADDING: f64 = 20.0;

/// Nominal `(width, height)` of a text label.
pub const TEXT_EXTENT: (f64, f64) = (100.0, 30.0);

/// Axis-aligned box in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Degenerate box covering a single point.
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    pub fn include(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn union(mut self, other: BoundingBox) -> Self {
        self.include(other.min_x, other.min_y);
        self.include(other.max_x, other.max_y);
        self
    }

    /// Grow the box by `margin` on all four sides.
    pub fn expand(self, margin: f64) -> Self {
        Self {
            min_x: self.min_x - margin,
            min_y: self.min_y - margin,
            max_x: self.max_x + margin,
            max_y: self.max_y + margin,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    /// True when `other` lies entirely inside `self` (edges inclusive).
    pub fn contains(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && self.max_x >= other.max_x
            && self.max_y >= other.max_y
    }
}

/// Resolved paint for closed shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Paint {
    pub stroke: String,
    pub fill: String,
    pub stroke_width: f64,
}

/// One draw instruction in document coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Primitive {
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        paint: Paint,
    },
    Ellipse {
        cx: f64,
        cy: f64,
        rx: f64,
        ry: f64,
        paint: Paint,
    },
    /// Closed shape through the points.
    Polygon { points: Vec<(f64, f64)>, paint: Paint },
    /// Open stroke through the points; never filled.
    Polyline {
        points: Vec<(f64, f64)>,
        stroke: String,
        stroke_width: f64,
    },
    /// Text with its baseline at `(x, y)`.
    Label {
        x: f64,
        y: f64,
        text: String,
        font_size: f64,
        color: String,
    },
}

/// Result of [`layout`]: the padded frame and the primitives in document order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub frame: BoundingBox,
    pub primitives: Vec<Primitive>,
}

/// Extent contributed by a single element, if it has any geometry.
pub fn element_extent(element: &DiagramElement) -> Option<BoundingBox> {
    match element {
        DiagramElement::Rectangle(b) | DiagramElement::Ellipse(b) => {
            let mut bb = BoundingBox::at(b.x, b.y);
            bb.include(b.x + b.width, b.y + b.height);
            Some(bb)
        }
        DiagramElement::Text(t) => {
            let mut bb = BoundingBox::at(t.x, t.y);
            bb.include(t.x + TEXT_EXTENT.0, t.y + TEXT_EXTENT.1);
            Some(bb)
        }
        DiagramElement::Polygon(p) | DiagramElement::Line(p) => {
            let mut points = p.absolute_points();
            let (x, y) = points.next()?;
            let mut bb = BoundingBox::at(x, y);
            for (x, y) in points {
                bb.include(x, y);
            }
            Some(bb)
        }
        DiagramElement::Unsupported => None,
    }
}

/// Padded bounding box of the whole document.
///
/// `None` when no element contributes geometry, so that adding an element to
/// a document never shrinks its box.
pub fn bounding_box(document: &DiagramDocument) -> Option<BoundingBox> {
    document
        .elements
        .iter()
        .filter_map(element_extent)
        .reduce(BoundingBox::union)
        .map(|bb| bb.expand(PADDING))
}

/// Lay out a document: compute its frame and emit one primitive per drawable element.
///
/// A document without drawable elements gets the zero box at the origin,
/// padded like any other frame.
pub fn layout(document: &DiagramDocument) -> Layout {
    let frame = bounding_box(document).unwrap_or_else(|| BoundingBox::at(0.0, 0.0).expand(PADDING));
    let primitives = document.elements.iter().filter_map(primitive_for).collect();
    Layout { frame, primitives }
}

fn primitive_for(element: &DiagramElement) -> Option<Primitive> {
    match element {
        DiagramElement::Rectangle(b) => Some(rect(b)),
        DiagramElement::Ellipse(b) => Some(ellipse(b)),
        DiagramElement::Polygon(p) => Some(Primitive::Polygon {
            points: p.absolute_points().collect(),
            paint: paint(&p.style),
        }),
        DiagramElement::Line(p) => Some(polyline(p)),
        DiagramElement::Text(t) => Some(label(t)),
        DiagramElement::Unsupported => None,
    }
}

fn paint(style: &super::model::Style) -> Paint {
    Paint {
        stroke: style.stroke_color().to_string(),
        fill: style.background_color().to_string(),
        stroke_width: style.stroke_width(),
    }
}

// Negative sizes are normalised so the emitted rectangle is always valid SVG.
fn rect(b: &BoxShape) -> Primitive {
    Primitive::Rect {
        x: b.x.min(b.x + b.width),
        y: b.y.min(b.y + b.height),
        width: b.width.abs(),
        height: b.height.abs(),
        paint: paint(&b.style),
    }
}

fn ellipse(b: &BoxShape) -> Primitive {
    Primitive::Ellipse {
        cx: b.x + b.width / 2.0,
        cy: b.y + b.height / 2.0,
        rx: (b.width / 2.0).abs(),
        ry: (b.height / 2.0).abs(),
        paint: paint(&b.style),
    }
}

fn polyline(p: &PathShape) -> Primitive {
    Primitive::Polyline {
        points: p.absolute_points().collect(),
        stroke: p.style.stroke_color().to_string(),
        stroke_width: p.style.stroke_width(),
    }
}

fn label(t: &TextShape) -> Primitive {
    let font_size = t.font_size();
    Primitive::Label {
        x: t.x,
        y: t.y + font_size,
        text: t.text.clone(),
        font_size,
        color: t.style.stroke_color().to_string(),
    }
}
