use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::sync::Arc;
use ttf_parser::name_id;
use ttf_parser::Face;
use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;
use usvg::fontdb;

use super::engine::{is_wide, Extent, MeasurementSurface};
use super::WritingDirection;

#[derive(Clone)]
pub struct FontMetrics {
    data: Arc<Vec<u8>>,
    units_per_em: u16,
    space_advance: u16,
    family: Option<String>,
    face_index: u32,
}

impl FontMetrics {
    pub fn family(&self) -> Option<&str> {
        self.family.as_deref()
    }

    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }
}

impl std::fmt::Debug for FontMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMetrics")
            .field("family", &self.family)
            .field("face_index", &self.face_index)
            .field("units_per_em", &self.units_per_em)
            .finish()
    }
}

pub fn load_font_metrics(path: &Path) -> Result<FontMetrics> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read font: {}", path.display()))?;
    load_font_metrics_from_data(&data)
        .map_err(|err| anyhow!("failed to parse font: {} ({})", path.display(), err))
}

pub struct ResolvedOverlayFont {
    pub metrics: FontMetrics,
    pub family: String,
}

pub fn resolve_overlay_font(
    font_path: Option<&Path>,
    font_family: Option<&str>,
    fallback: &[String],
) -> Result<ResolvedOverlayFont> {
    if let Some(path) = font_path {
        let metrics = load_font_metrics(path)?;
        let family = metrics
            .family()
            .or(font_family)
            .unwrap_or("sans-serif")
            .to_string();
        return Ok(ResolvedOverlayFont { metrics, family });
    }

    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    resolve_from_database(&db, font_family, fallback)
}

/// The configured family first, then each fallback in order.
fn resolve_from_database(
    db: &fontdb::Database,
    font_family: Option<&str>,
    fallback: &[String],
) -> Result<ResolvedOverlayFont> {
    let candidates: Vec<&str> = font_family
        .into_iter()
        .chain(fallback.iter().map(String::as_str))
        .collect();
    for candidate in &candidates {
        match load_font_metrics_from_family(db, candidate) {
            Ok(resolved) => return Ok(resolved),
            Err(err) => debug!("font candidate skipped: {:#}", err),
        }
    }
    Err(anyhow!(
        "none of the configured fonts are installed: {}",
        candidates.join(", ")
    ))
}

/// Measures text with real glyph advances from a parsed font.
///
/// Vertical runs follow mixed orientation: wide graphemes stand upright, narrow ones are
/// rotated and advance by their horizontal advance.
pub struct FontSurface {
    font: FontMetrics,
}

impl FontSurface {
    pub fn new(font: FontMetrics) -> Self {
        Self { font }
    }

    /// Advance of one grapheme in font units, taken from its base character.
    ///
    /// Combining marks and variation selectors ride on the base glyph and add nothing.
    fn grapheme_advance(&self, face: &Face<'_>, grapheme: &str, direction: WritingDirection) -> u16 {
        let font = &self.font;
        let Some(base) = grapheme.chars().find(|ch| *ch != '\n' && *ch != '\r') else {
            return 0;
        };
        let wide = is_wide(grapheme);
        let upright = wide && direction == WritingDirection::Vertical;
        match face.glyph_index(base) {
            Some(glyph) if upright => face.glyph_ver_advance(glyph).unwrap_or(font.units_per_em),
            Some(glyph) => face.glyph_hor_advance(glyph).unwrap_or(font.space_advance),
            None if wide => font.units_per_em,
            None => font.space_advance,
        }
    }
}

impl MeasurementSurface for FontSurface {
    fn measure(&mut self, text: &str, font_size: f64, direction: WritingDirection) -> Result<Extent> {
        let face = Face::parse(&self.font.data, self.font.face_index)
            .map_err(|err| anyhow!("failed to parse font face: {}", err))?;
        let units: u32 = text
            .graphemes(true)
            .map(|grapheme| self.grapheme_advance(&face, grapheme, direction) as u32)
            .sum();
        let units_per_em = self.font.units_per_em.max(1) as f64;
        let along = units as f64 * font_size / units_per_em;
        Ok(oriented_extent(text, along, font_size, direction))
    }
}

/// Font-free measurement from per-character em estimates.
#[derive(Debug, Default, Clone, Copy)]
pub struct EstimateSurface;

impl MeasurementSurface for EstimateSurface {
    fn measure(&mut self, text: &str, font_size: f64, direction: WritingDirection) -> Result<Extent> {
        let units: f64 = text
            .graphemes(true)
            .map(estimate_grapheme_units)
            .sum();
        Ok(oriented_extent(text, units * font_size, font_size, direction))
    }
}

/// Line height is one em; an empty run has no box at all.
fn oriented_extent(text: &str, along: f64, font_size: f64, direction: WritingDirection) -> Extent {
    let across = if text.is_empty() { 0.0 } else { font_size };
    match direction {
        WritingDirection::Horizontal => Extent {
            width: along,
            height: across,
        },
        WritingDirection::Vertical => Extent {
            width: across,
            height: along,
        },
    }
}

fn estimate_grapheme_units(grapheme: &str) -> f64 {
    if is_wide(grapheme) {
        return 1.0;
    }
    grapheme
        .chars()
        .next()
        .map(estimate_char_units_for_width)
        .unwrap_or(0.0)
}

fn estimate_char_units_for_width(ch: char) -> f64 {
    if ch == '\n' {
        0.0
    } else if ch.is_whitespace() {
        0.25
    } else if ch.is_ascii_alphanumeric() {
        0.55
    } else if ch.is_ascii() {
        0.35
    } else {
        0.9
    }
}

/// First parseable face of a font file or collection.
fn load_font_metrics_from_data(data: &[u8]) -> Result<FontMetrics> {
    let shared = Arc::new(data.to_vec());
    let count = ttf_parser::fonts_in_collection(data).unwrap_or(1);
    (0..count)
        .find_map(|index| metrics_for_face(&shared, index))
        .ok_or_else(|| anyhow!("failed to parse font data"))
}

fn metrics_for_face(data: &Arc<Vec<u8>>, index: u32) -> Option<FontMetrics> {
    let face = Face::parse(data, index).ok()?;
    let units_per_em = face.units_per_em().max(1);
    let space_advance = face
        .glyph_index(' ')
        .and_then(|id| face.glyph_hor_advance(id))
        .unwrap_or(units_per_em / 2);
    Some(FontMetrics {
        data: Arc::clone(data),
        units_per_em,
        space_advance,
        family: face_family_name(&face),
        face_index: index,
    })
}

fn load_font_metrics_from_family(
    db: &fontdb::Database,
    family: &str,
) -> Result<ResolvedOverlayFont> {
    let families = match family.to_ascii_lowercase().as_str() {
        "sans-serif" => vec![fontdb::Family::SansSerif],
        "serif" => vec![fontdb::Family::Serif],
        "monospace" => vec![fontdb::Family::Monospace],
        _ => vec![fontdb::Family::Name(family)],
    };
    let query = fontdb::Query {
        families: &families,
        ..Default::default()
    };
    let id = db
        .query(&query)
        .ok_or_else(|| anyhow!("font not found: {}", family))?;
    let (data, face_index) = db
        .with_face_data(id, |data, index| (data.to_vec(), index))
        .ok_or_else(|| anyhow!("failed to load font data: {}", family))?;
    let metrics = metrics_for_face(&Arc::new(data), face_index)
        .ok_or_else(|| anyhow!("failed to parse font data: {}", family))?;
    let resolved_family = metrics
        .family()
        .map(|name| name.to_string())
        .unwrap_or_else(|| family.to_string());
    Ok(ResolvedOverlayFont {
        metrics,
        family: resolved_family,
    })
}

/// Typographic family when the font declares one, else the legacy family name.
fn face_family_name(face: &Face<'_>) -> Option<String> {
    let lookup = |wanted: u16| {
        face.names()
            .into_iter()
            .filter(|name| name.name_id == wanted)
            .find_map(|name| name.to_string())
    };
    lookup(name_id::TYPOGRAPHIC_FAMILY).or_else(|| lookup(name_id::FAMILY))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_swaps_axes_for_vertical_runs() {
        let mut surface = EstimateSurface;
        let horizontal = surface
            .measure("日本語", 20.0, WritingDirection::Horizontal)
            .expect("measure");
        let vertical = surface
            .measure("日本語", 20.0, WritingDirection::Vertical)
            .expect("measure");
        assert_eq!(horizontal.width, 60.0);
        assert_eq!(horizontal.height, 20.0);
        assert_eq!(vertical.width, 20.0);
        assert_eq!(vertical.height, 60.0);
    }

    #[test]
    fn estimate_counts_clusters_not_code_points() {
        let mut surface = EstimateSurface;
        let composed = surface
            .measure("e\u{301}", 10.0, WritingDirection::Horizontal)
            .expect("measure");
        let plain = surface
            .measure("e", 10.0, WritingDirection::Horizontal)
            .expect("measure");
        assert_eq!(composed, plain);
    }

    #[test]
    fn estimate_of_empty_text_is_zero() {
        let mut surface = EstimateSurface;
        let extent = surface
            .measure("", 12.0, WritingDirection::Horizontal)
            .expect("measure");
        assert_eq!(extent.length(), 0.0);
    }

    fn fixture_path() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSans.ttf")
    }

    fn fixture_surface() -> FontSurface {
        FontSurface::new(load_font_metrics(&fixture_path()).expect("fixture font"))
    }

    fn hor_advance_px(text: &str, font_size: f64) -> f64 {
        let data = std::fs::read(fixture_path()).expect("fixture bytes");
        let face = Face::parse(&data, 0).expect("fixture face");
        let units: u32 = text
            .chars()
            .map(|ch| {
                let glyph = face.glyph_index(ch).expect("latin glyph");
                face.glyph_hor_advance(glyph).expect("advance") as u32
            })
            .sum();
        units as f64 * font_size / face.units_per_em() as f64
    }

    #[test]
    fn fixture_reports_its_family() {
        let metrics = load_font_metrics(&fixture_path()).expect("fixture font");
        assert_eq!(metrics.family(), Some("DejaVu Sans"));
    }

    #[test]
    fn horizontal_width_sums_glyph_advances() {
        let extent = fixture_surface()
            .measure("Hello", 20.0, WritingDirection::Horizontal)
            .expect("measure");
        assert!((extent.width - hor_advance_px("Hello", 20.0)).abs() < 1e-9);
        assert_eq!(extent.height, 20.0);
    }

    #[test]
    fn vertical_latin_advances_sideways() {
        let extent = fixture_surface()
            .measure("Hello", 20.0, WritingDirection::Vertical)
            .expect("measure");
        assert!((extent.height - hor_advance_px("Hello", 20.0)).abs() < 1e-9);
        assert_eq!(extent.width, 20.0);
    }

    #[test]
    fn wide_text_without_glyphs_takes_one_em_per_cluster() {
        let mut surface = fixture_surface();
        let vertical = surface
            .measure("葛葛葛", 20.0, WritingDirection::Vertical)
            .expect("measure");
        let horizontal = surface
            .measure("葛葛葛", 20.0, WritingDirection::Horizontal)
            .expect("measure");
        assert_eq!(vertical.height, 60.0);
        assert_eq!(horizontal.width, 60.0);
    }

    #[test]
    fn variation_selectors_add_no_advance() {
        let mut surface = fixture_surface();
        for direction in [WritingDirection::Vertical, WritingDirection::Horizontal] {
            let plain = surface.measure("葛葛葛", 20.0, direction).expect("measure");
            let ivs = surface
                .measure("葛\u{E0100}葛\u{E0100}葛\u{E0100}", 20.0, direction)
                .expect("measure");
            let svs = surface
                .measure("葛\u{FE00}葛\u{FE00}葛\u{FE00}", 20.0, direction)
                .expect("measure");
            assert_eq!(ivs, plain);
            assert_eq!(svs, plain);
        }
    }

    #[test]
    fn combining_marks_ride_on_the_base_glyph() {
        let mut surface = fixture_surface();
        let composed = surface
            .measure("e\u{301}", 16.0, WritingDirection::Horizontal)
            .expect("measure");
        let plain = surface
            .measure("e", 16.0, WritingDirection::Horizontal)
            .expect("measure");
        assert_eq!(composed, plain);
    }

    #[test]
    fn mixed_vertical_run_uprights_only_wide_clusters() {
        let extent = fixture_surface()
            .measure("葛A", 20.0, WritingDirection::Vertical)
            .expect("measure");
        assert!((extent.height - (20.0 + hor_advance_px("A", 20.0))).abs() < 1e-9);
    }

    #[test]
    fn missing_family_falls_back_to_next_candidate() {
        let mut db = fontdb::Database::new();
        db.load_font_data(std::fs::read(fixture_path()).expect("fixture bytes"));
        let fallback = vec!["Nonexistent Gothic".to_string(), "DejaVu Sans".to_string()];
        let resolved =
            resolve_from_database(&db, Some("Nonexistent Mincho"), &fallback).expect("fallback");
        assert_eq!(resolved.family, "DejaVu Sans");
    }

    #[test]
    fn unresolvable_fonts_list_every_candidate() {
        let db = fontdb::Database::new();
        let fallback = vec!["Nonexistent Gothic".to_string()];
        let err = match resolve_from_database(&db, Some("Nonexistent Mincho"), &fallback) {
            Ok(_) => panic!("empty database resolved a font"),
            Err(err) => err,
        };
        let message = err.to_string();
        assert!(message.contains("Nonexistent Mincho, Nonexistent Gothic"));
    }

    #[test]
    fn garbage_font_data_is_rejected() {
        let err = load_font_metrics_from_data(b"not a font").expect_err("invalid font");
        assert!(err.to_string().contains("failed to parse font data"));
    }

    #[test]
    fn missing_font_file_reports_path() {
        let err = load_font_metrics(Path::new("/nonexistent/overlay.ttf")).expect_err("missing");
        assert!(format!("{:#}", err).contains("/nonexistent/overlay.ttf"));
    }
}
