use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub mod logging;
pub mod overlay;
pub mod payload;
pub mod settings;
#[cfg(test)]
mod test_util;

use overlay::{
    EstimateSurface, FontSurface, FrameDocument, ImageGeometry, LayoutSession, MeasurementSurface,
    OverlayRun, SelectionStyle, TextLayer,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Runs,
    Annotations,
    Html,
    Svg,
    Png,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub image: Option<PathBuf>,
    pub natural_width: Option<f64>,
    pub natural_height: Option<f64>,
    pub display_width: Option<f64>,
    pub display_height: Option<f64>,
    pub font: Option<PathBuf>,
    pub format: OutputFormat,
    pub output: Option<PathBuf>,
    pub settings_path: Option<String>,
}

/// Result of a run: text for stdout, or the path a file was written to.
#[derive(Debug)]
pub enum RunOutput {
    Text(String),
    Written(PathBuf),
}

struct LoadedImage {
    bytes: Vec<u8>,
    mime: String,
    width: u32,
    height: u32,
}

pub fn run(config: Config, input: &str) -> Result<RunOutput> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let payload = payload::parse_payload(input)?;

    let annotations = overlay::adjusted_annotations(&payload.text_annotations);
    info!(
        id = payload.id.as_deref().unwrap_or("-"),
        detected = payload.text_annotations.len().saturating_sub(1),
        merged = annotations.len(),
        "merged detector output"
    );
    if config.format == OutputFormat::Annotations {
        return emit(annotations_json(&annotations)?.into_bytes(), config.output.as_deref());
    }

    let image = config.image.as_deref().map(load_image).transpose()?;
    let geometry = resolve_geometry(&config, image.as_ref())?;

    let font_path = config
        .font
        .clone()
        .or_else(|| settings.font_path.as_ref().map(PathBuf::from));
    let font = match overlay::resolve_overlay_font(
        font_path.as_deref(),
        settings.font_family.as_deref(),
        &settings.font_fallback,
    ) {
        Ok(font) => {
            info!(family = %font.family, "measuring with font");
            Some(font)
        }
        Err(err) if font_path.is_some() => return Err(err),
        Err(err) => {
            warn!("no usable font ({:#}); falling back to estimated metrics", err);
            None
        }
    };
    let mut surface: Box<dyn MeasurementSurface> = match &font {
        Some(font) => Box::new(FontSurface::new(font.metrics.clone())),
        None => Box::new(EstimateSurface),
    };

    let runs = layout_pass(&LayoutSession::new(), &annotations, &geometry, surface.as_mut())?;

    let font_family = font.as_ref().map(|font| font.family.as_str());
    let frame = FrameDocument {
        image_bytes: image.as_ref().map(|image| image.bytes.as_slice()),
        image_mime: image
            .as_ref()
            .map(|image| image.mime.as_str())
            .unwrap_or("application/octet-stream"),
        alt: payload.alt.as_deref().unwrap_or(""),
        locale: payload.locale(),
        description: payload.full_text(),
        display_width: geometry.display_width,
        display_height: geometry.display_height,
    };

    match config.format {
        OutputFormat::Annotations => {
            emit(annotations_json(&annotations)?.into_bytes(), config.output.as_deref())
        }
        OutputFormat::Runs => emit(runs_json(&runs)?.into_bytes(), config.output.as_deref()),
        OutputFormat::Html => {
            let style = SelectionStyle {
                background: settings.selection_background.clone(),
                color: settings.selection_color.clone(),
                font_family: font_family.map(str::to_string),
            };
            let html = overlay::render_html(&frame, &runs, &style)?;
            emit(html.into_bytes(), config.output.as_deref())
        }
        OutputFormat::Svg => {
            let svg = overlay::render_svg(&frame, &runs, font_family);
            emit(svg.into_bytes(), config.output.as_deref())
        }
        OutputFormat::Png => {
            let output = config
                .output
                .as_deref()
                .ok_or_else(|| anyhow!("--format png requires --output"))?;
            if image.is_none() {
                return Err(anyhow!("--format png requires --image"));
            }
            let svg = overlay::render_debug_svg(
                &frame,
                &runs,
                font_family,
                &settings.debug_box_color,
                &settings.debug_text_color,
            );
            let font_data = font.as_ref().map(|font| font.metrics.data());
            let png = overlay::render_svg_bytes(&svg, "image/png", font_data)?;
            emit(png, Some(output))
        }
    }
}

/// One layout pass through `session` into a fresh text layer.
fn layout_pass(
    session: &LayoutSession,
    annotations: &[overlay::Annotation],
    geometry: &ImageGeometry,
    surface: &mut dyn MeasurementSurface,
) -> Result<Vec<OverlayRun>> {
    let ticket = session.begin_pass();
    let runs = overlay::layout_annotations(annotations, geometry, surface);
    let mut layer = TextLayer::default();
    if !session.commit(ticket, &runs, &mut layer) {
        return Err(anyhow!("layout pass was superseded before it could be applied"));
    }
    Ok(layer.into_runs())
}

fn annotations_json(annotations: &[overlay::Annotation]) -> Result<String> {
    serde_json::to_string_pretty(annotations).with_context(|| "failed to serialize annotations")
}

fn runs_json(runs: &[OverlayRun]) -> Result<String> {
    serde_json::to_string_pretty(runs).with_context(|| "failed to serialize overlay runs")
}

fn emit(bytes: Vec<u8>, output: Option<&Path>) -> Result<RunOutput> {
    match output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write output: {}", path.display()))?;
            Ok(RunOutput::Written(path.to_path_buf()))
        }
        None => {
            let text = String::from_utf8(bytes)
                .map_err(|_| anyhow!("binary output requires --output"))?;
            Ok(RunOutput::Text(text))
        }
    }
}

fn load_image(path: &Path) -> Result<LoadedImage> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read image: {}", path.display()))?;
    let (width, height) = image::image_dimensions(path)
        .with_context(|| format!("failed to decode image header: {}", path.display()))?;
    let mime = infer::get(&bytes)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(LoadedImage {
        bytes,
        mime,
        width,
        height,
    })
}

fn resolve_geometry(config: &Config, image: Option<&LoadedImage>) -> Result<ImageGeometry> {
    let natural_width = config
        .natural_width
        .or_else(|| image.map(|image| image.width as f64));
    let natural_height = config
        .natural_height
        .or_else(|| image.map(|image| image.height as f64));
    let (Some(natural_width), Some(natural_height)) = (natural_width, natural_height) else {
        return Err(anyhow!(
            "natural image size unknown; pass --image or --natural-width/--natural-height"
        ));
    };
    if !(natural_width > 0.0 && natural_height > 0.0) {
        return Err(anyhow!(
            "natural image size must be positive ({}x{})",
            natural_width,
            natural_height
        ));
    }
    let (display_width, display_height) = resolve_display_size(
        natural_width,
        natural_height,
        config.display_width,
        config.display_height,
    );
    Ok(ImageGeometry::new(
        natural_width,
        natural_height,
        display_width,
        display_height,
    ))
}

/// A single given display dimension keeps the natural aspect ratio.
fn resolve_display_size(
    natural_width: f64,
    natural_height: f64,
    display_width: Option<f64>,
    display_height: Option<f64>,
) -> (f64, f64) {
    match (display_width, display_height) {
        (Some(width), Some(height)) => (width, height),
        (Some(width), None) => (width, natural_height * width / natural_width),
        (None, Some(height)) => (natural_width * height / natural_height, height),
        (None, None) => (natural_width, natural_height),
    }
}
