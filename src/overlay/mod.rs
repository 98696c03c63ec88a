mod engine;
mod font;
mod render;
mod session;

pub use engine::{
    adjusted_annotations, display_width, grapheme_count, layout_annotations, merge_annotations,
    try_merge, Extent, MeasurementSurface,
};
pub use font::{
    load_font_metrics, resolve_overlay_font, EstimateSurface, FontMetrics, FontSurface,
    ResolvedOverlayFont,
};
pub use render::{
    render_debug_svg, render_html, render_svg, render_svg_bytes, FrameDocument, SelectionStyle,
};
pub use session::{LayoutSession, PassTicket, RenderSink, TextLayer};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

/// One detector token. The detector only tags the leading summary entry with a locale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTextBox {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub description: String,
    #[serde(default)]
    pub bounding_poly: BoundingPoly,
}

impl RawTextBox {
    pub fn new(description: impl Into<String>, vertices: [(f64, f64); 4]) -> Self {
        Self {
            locale: None,
            description: description.into(),
            bounding_poly: BoundingPoly {
                vertices: vertices
                    .iter()
                    .map(|&(x, y)| Vertex { x, y })
                    .collect(),
            },
        }
    }

    /// Axis-aligned bounding rectangle of the quad.
    pub fn bounds(&self) -> Annotation {
        let vertices = &self.bounding_poly.vertices;
        if vertices.is_empty() {
            return Annotation::new(self.description.clone(), 0.0, 0.0, 0.0, 0.0);
        }
        let mut left = f64::INFINITY;
        let mut top = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        let mut bottom = f64::NEG_INFINITY;
        for vertex in vertices {
            left = left.min(vertex.x);
            top = top.min(vertex.y);
            right = right.max(vertex.x);
            bottom = bottom.max(vertex.y);
        }
        Annotation::new(self.description.clone(), left, top, right, bottom)
    }
}

/// A phrase-level region in natural image pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl Annotation {
    pub fn new(text: impl Into<String>, left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            text: text.into(),
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    /// The narrower dimension, used as a stand-in for the font scale.
    pub fn size(&self) -> f64 {
        self.width().min(self.height())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WritingDirection {
    Horizontal,
    Vertical,
}

impl WritingDirection {
    pub fn css_writing_mode(self) -> &'static str {
        match self {
            WritingDirection::Horizontal => "horizontal-tb",
            WritingDirection::Vertical => "vertical-rl",
        }
    }
}

/// Fully specified invisible text run in display pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRun {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub writing_direction: WritingDirection,
    pub font_size: f64,
    pub letter_spacing: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGeometry {
    pub natural_width: f64,
    pub natural_height: f64,
    pub display_width: f64,
    pub display_height: f64,
}

impl ImageGeometry {
    pub fn new(natural_width: f64, natural_height: f64, display_width: f64, display_height: f64) -> Self {
        Self {
            natural_width,
            natural_height,
            display_width,
            display_height,
        }
    }

    /// Geometry displayed at natural size.
    pub fn natural(width: f64, height: f64) -> Self {
        Self::new(width, height, width, height)
    }

    /// Natural dimensions stay zero until the image has been decoded.
    pub fn is_decoded(&self) -> bool {
        self.natural_width > 0.0 && self.natural_height > 0.0
    }

    pub fn scale(&self) -> (f64, f64) {
        (
            self.display_width / self.natural_width,
            self.display_height / self.natural_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_reduce_rotated_quad() {
        let raw = RawTextBox::new("tilt", [(12.0, 4.0), (30.0, 8.0), (28.0, 20.0), (10.0, 16.0)]);
        let annotation = raw.bounds();
        assert_eq!(annotation.left, 10.0);
        assert_eq!(annotation.top, 4.0);
        assert_eq!(annotation.right, 30.0);
        assert_eq!(annotation.bottom, 20.0);
        assert_eq!(annotation.size(), 16.0);
    }

    #[test]
    fn vertices_default_missing_coordinates_to_zero() {
        let raw: RawTextBox = serde_json::from_value(serde_json::json!({
            "description": "A",
            "boundingPoly": { "vertices": [{}, { "x": 9 }, { "x": 9, "y": 12 }, { "y": 12 }] }
        }))
        .expect("raw box");
        let annotation = raw.bounds();
        assert_eq!((annotation.left, annotation.top), (0.0, 0.0));
        assert_eq!((annotation.right, annotation.bottom), (9.0, 12.0));
    }

    #[test]
    fn undecoded_geometry_is_reported() {
        assert!(!ImageGeometry::new(0.0, 0.0, 800.0, 600.0).is_decoded());
        assert!(ImageGeometry::natural(640.0, 480.0).is_decoded());
    }
}
