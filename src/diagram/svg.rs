//! SVG serialisation of a diagram [`Layout`].
//!
//! The `viewBox` is the padded frame, so the drawing keeps document
//! coordinates and scales to the container width. Attribute values and label
//! text are XML-escaped; numbers use Rust's shortest round-trip formatting,
//! which makes the output byte-for-byte stable for a given document.

use super::geometry::{layout, Layout, Paint, Primitive};
use super::model::DiagramDocument;
use quick_xml::escape::escape;
use std::fmt::Write;

const SVG_NS: &str = "http://www.w3.org/2000/svg";
const LABEL_FONT_FAMILY: &str = "Arial, sans-serif";

/// Lay out and serialise a diagram in one step.
pub fn diagram_to_svg(document: &DiagramDocument) -> String {
    layout_to_svg(&layout(document))
}

pub fn layout_to_svg(layout: &Layout) -> String {
    let f = &layout.frame;
    let mut svg = String::with_capacity(128 + layout.primitives.len() * 96);
    let _ = write!(
        svg,
        r#"<svg xmlns="{SVG_NS}" viewBox="{} {} {} {}" width="100%" height="auto">"#,
        f.min_x,
        f.min_y,
        f.width(),
        f.height()
    );
    for primitive in &layout.primitives {
        write_primitive(&mut svg, primitive);
    }
    svg.push_str("</svg>");
    svg
}

fn write_primitive(out: &mut String, primitive: &Primitive) {
    // Writing to a String cannot fail.
    let _ = match primitive {
        Primitive::Rect {
            x,
            y,
            width,
            height,
            paint,
        } => write!(
            out,
            r#"<rect x="{x}" y="{y}" width="{width}" height="{height}" {}/>"#,
            paint_attrs(paint)
        ),
        Primitive::Ellipse { cx, cy, rx, ry, paint } => write!(
            out,
            r#"<ellipse cx="{cx}" cy="{cy}" rx="{rx}" ry="{ry}" {}/>"#,
            paint_attrs(paint)
        ),
        Primitive::Polygon { points, paint } => write!(
            out,
            r#"<polygon points="{}" {}/>"#,
            points_attr(points),
            paint_attrs(paint)
        ),
        Primitive::Polyline {
            points,
            stroke,
            stroke_width,
        } => write!(
            out,
            r#"<polyline points="{}" stroke="{}" fill="none" stroke-width="{stroke_width}"/>"#,
            points_attr(points),
            escape(stroke.as_str())
        ),
        Primitive::Label {
            x,
            y,
            text,
            font_size,
            color,
        } => write!(
            out,
            r#"<text x="{x}" y="{y}" font-size="{font_size}" font-family="{LABEL_FONT_FAMILY}" fill="{}">{}</text>"#,
            escape(color.as_str()),
            escape(text.as_str())
        ),
    };
}

fn paint_attrs(paint: &Paint) -> String {
    format!(
        r#"stroke="{}" fill="{}" stroke-width="{}""#,
        escape(paint.stroke.as_str()),
        escape(paint.fill.as_str()),
        paint.stroke_width
    )
}

fn points_attr(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x},{y}"))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::model::DiagramElement;

    #[test]
    fn declares_padded_view_box() {
        let doc = DiagramDocument::new(vec![DiagramElement::rectangle(0.0, 0.0, 100.0, 50.0)]);
        let svg = diagram_to_svg(&doc);
        assert!(svg.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="-20 -20 140 90""#));
        assert!(svg.contains(
            r##"<rect x="0" y="0" width="100" height="50" stroke="#000000" fill="transparent" stroke-width="2"/>"##
        ));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn emits_primitives_in_document_order() {
        let doc = DiagramDocument::new(vec![
            DiagramElement::text(0.0, 0.0, "first", 12.0),
            DiagramElement::line(0.0, 0.0, vec![[0.0, 0.0], [5.5, 5.0]]),
            DiagramElement::polygon(1.0, 1.0, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]),
        ]);
        let svg = diagram_to_svg(&doc);
        let text = svg.find("<text").unwrap();
        let line = svg.find("<polyline").unwrap();
        let poly = svg.find("<polygon").unwrap();
        assert!(text < line && line < poly);
        assert!(svg.contains(r##"points="0,0 5.5,5" stroke="#000000" fill="none""##));
        assert!(svg.contains(r#"points="1,1 2,1 1,2""#));
    }

    #[test]
    fn label_text_is_escaped() {
        let doc = DiagramDocument::new(vec![DiagramElement::text(0.0, 0.0, "a<b & c", 10.0)]);
        let svg = diagram_to_svg(&doc);
        assert!(svg.contains(">a&lt;b &amp; c</text>"), "{svg}");
        assert!(svg.contains(r#"y="10""#));
    }

    #[test]
    fn output_is_byte_stable() {
        let doc = DiagramDocument::new(vec![
            DiagramElement::ellipse(0.1, 0.2, 0.3, 0.7),
            DiagramElement::text(1.0 / 3.0, 2.0, "x", 16.0),
        ]);
        assert_eq!(diagram_to_svg(&doc), diagram_to_svg(&doc.clone()));
    }
}
