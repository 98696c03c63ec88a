use crate::overlay::Annotation;

/// Fuzzy adjacency: both boxes grown by `margin` times their own size overlap on both axes.
pub(super) fn intersects(a: &Annotation, b: &Annotation, margin: f64) -> bool {
    let a_pad = a.size() * margin;
    let b_pad = b.size() * margin;
    a.right + a_pad >= b.left - b_pad
        && a.bottom + a_pad >= b.top - b_pad
        && b.right + b_pad >= a.left - a_pad
        && b.bottom + b_pad >= a.top - a_pad
}

pub(super) fn union_bounds(a: &Annotation, b: &Annotation, text: String) -> Annotation {
    Annotation {
        text,
        left: a.left.min(b.left),
        top: a.top.min(b.top),
        right: a.right.max(b.right),
        bottom: a.bottom.max(b.bottom),
    }
}

/// Relative growth of `merged.size()` over `part.size()`.
pub(super) fn size_growth(part: &Annotation, merged: &Annotation) -> f64 {
    (merged.size() - part.size()) / part.size()
}
