mod geom;
mod layout;
mod merge;
mod text;

pub use layout::{layout_annotations, Extent, MeasurementSurface};
pub use merge::{adjusted_annotations, merge_annotations, try_merge};
pub use text::{display_width, grapheme_count};

pub(crate) use text::is_wide;
