use tracing::debug;

use crate::overlay::{Annotation, RawTextBox};

use super::geom::{intersects, size_growth, union_bounds};
use super::text::{display_width, first_grapheme, is_narrow, last_grapheme};

const NEIGHBOR_MARGIN: f64 = 0.5;
const TOUCHING_MARGIN: f64 = 0.0625;
const CONFIDENT_WIDTH: usize = 3;
const MAX_SIZE_GROWTH: f64 = 0.5;

/// Phrase annotations for detector output. The leading summary entry is dropped.
pub fn adjusted_annotations(raw: &[RawTextBox]) -> Vec<Annotation> {
    let annotations = raw.iter().skip(1).map(RawTextBox::bounds).collect();
    merge_annotations(annotations)
}

/// Single left-to-right pass folding each annotation into its right neighbor where possible.
///
/// After a merge the combined box is tested again against its new neighbor, except at
/// index 0 where the scan moves on.
pub fn merge_annotations(mut annotations: Vec<Annotation>) -> Vec<Annotation> {
    let before = annotations.len();
    let mut index = 0;
    while index + 1 < annotations.len() {
        match try_merge(&annotations[index], &annotations[index + 1]) {
            Some(merged) => {
                annotations[index] = merged;
                annotations.remove(index + 1);
                if index == 0 {
                    index += 1;
                }
            }
            None => index += 1,
        }
    }
    debug!(before, after = annotations.len(), "merged annotations");
    annotations
}

pub fn try_merge(a: &Annotation, b: &Annotation) -> Option<Annotation> {
    if !intersects(a, b, NEIGHBOR_MARGIN) {
        return None;
    }

    let inserts_space = is_narrow(last_grapheme(&a.text))
        && is_narrow(first_grapheme(&b.text))
        && !intersects(a, b, TOUCHING_MARGIN);
    let text = if inserts_space {
        format!("{} {}", a.text, b.text)
    } else {
        format!("{}{}", a.text, b.text)
    };
    let merged = union_bounds(a, b, text);

    if grows_confident_part(a, &merged) || grows_confident_part(b, &merged) {
        return None;
    }
    Some(merged)
}

fn grows_confident_part(part: &Annotation, merged: &Annotation) -> bool {
    display_width(&part.text) >= CONFIDENT_WIDTH && size_growth(part, merged) >= MAX_SIZE_GROWTH
}
