//! Diagram documents and the geometry engine that draws them.
//!
//! ```text
//! DiagramDocument ──▶ geometry::layout ──▶ Layout { frame, primitives } ──▶ svg
//! ```
//!
//! 1. [`model`]    — serde model of the embedded diagram JSON
//! 2. [`geometry`] — bounding box + resolved draw primitives (pure)
//! 3. [`svg`]      — primitives → SVG markup

pub mod geometry;
pub mod model;
pub mod svg;

pub use geometry::{bounding_box, layout, BoundingBox, Layout, Primitive, PADDING};
pub use model::{DiagramDocument, DiagramElement, Style, DIAGRAM_MARKER};
pub use svg::diagram_to_svg;
