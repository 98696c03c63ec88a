use anyhow::Result;
use tracing::{debug, warn};

use crate::overlay::{Annotation, ImageGeometry, OverlayRun, WritingDirection};

use super::text::{display_width, grapheme_count};

/// Shorter texts are laid out horizontally whatever the box shape.
const MIN_VERTICAL_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    /// Length along the dominant axis.
    pub fn length(&self) -> f64 {
        self.width.max(self.height)
    }
}

/// Something that can render styled text with zero letter-spacing and report its bounding box.
pub trait MeasurementSurface {
    fn measure(&mut self, text: &str, font_size: f64, direction: WritingDirection) -> Result<Extent>;
}

/// Lays out every annotation for the current geometry, in input order.
///
/// Annotations whose text cannot be measured, or measures as zero length, produce no run.
pub fn layout_annotations<M>(
    annotations: &[Annotation],
    geometry: &ImageGeometry,
    surface: &mut M,
) -> Vec<OverlayRun>
where
    M: MeasurementSurface + ?Sized,
{
    if !geometry.is_decoded() {
        debug!("natural image size unknown; skipping layout");
        return Vec::new();
    }
    let (scale_x, scale_y) = geometry.scale();

    let mut runs = Vec::with_capacity(annotations.len());
    for annotation in annotations {
        match layout_one(annotation, scale_x, scale_y, surface) {
            Ok(Some(run)) => runs.push(run),
            Ok(None) => debug!(text = %annotation.text, "zero-length measurement; run skipped"),
            Err(err) => warn!(text = %annotation.text, "measurement failed: {:#}", err),
        }
    }
    runs
}

fn layout_one<M>(
    annotation: &Annotation,
    scale_x: f64,
    scale_y: f64,
    surface: &mut M,
) -> Result<Option<OverlayRun>>
where
    M: MeasurementSurface + ?Sized,
{
    let left = annotation.left * scale_x;
    let top = annotation.top * scale_y;
    let width = annotation.width() * scale_x;
    let height = annotation.height() * scale_y;

    let writing_direction = choose_direction(&annotation.text, width, height);
    let font_size = width.min(height);
    let expected_length = width.max(height);

    let actual_length = surface
        .measure(&annotation.text, font_size, writing_direction)?
        .length();
    if !(actual_length.is_finite() && actual_length > 0.0) {
        return Ok(None);
    }

    let clusters = grapheme_count(&annotation.text).max(1) as f64;
    let letter_spacing = (expected_length - actual_length).max(0.0) / clusters;
    let font_size = font_size * (expected_length / actual_length).min(1.0);

    Ok(Some(OverlayRun {
        text: annotation.text.clone(),
        left,
        top,
        width,
        height,
        writing_direction,
        font_size,
        letter_spacing,
    }))
}

fn choose_direction(text: &str, width: f64, height: f64) -> WritingDirection {
    if display_width(text) < MIN_VERTICAL_WIDTH || width >= height {
        WritingDirection::Horizontal
    } else {
        WritingDirection::Vertical
    }
}
