use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use resvg::render;
use serde::Serialize;
use std::io::Cursor;
use std::sync::Arc;
use tera::{Context as TeraContext, Tera};
use tiny_skia::Pixmap;
use usvg::{Options, Tree, fontdb};

use super::{OverlayRun, WritingDirection};

/// Image and document metadata around a text layer.
pub struct FrameDocument<'a> {
    pub image_bytes: Option<&'a [u8]>,
    pub image_mime: &'a str,
    pub alt: &'a str,
    pub locale: Option<&'a str>,
    pub description: Option<&'a str>,
    pub display_width: f64,
    pub display_height: f64,
}

impl FrameDocument<'_> {
    fn data_uri(&self) -> Option<String> {
        self.image_bytes
            .map(|bytes| format!("data:{};base64,{}", self.image_mime, BASE64.encode(bytes)))
    }
}

pub struct SelectionStyle {
    pub background: String,
    pub color: String,
    pub font_family: Option<String>,
}

const FRAME_TEMPLATE: &str = include_str!("templates/frame.html.tera");

#[derive(Serialize)]
struct SpanView<'a> {
    text: &'a str,
    left: String,
    top: String,
    width: String,
    height: String,
    font_size: String,
    letter_spacing: String,
    writing_mode: &'static str,
}

impl<'a> From<&'a OverlayRun> for SpanView<'a> {
    fn from(run: &'a OverlayRun) -> Self {
        Self {
            text: &run.text,
            left: run.left.to_string(),
            top: run.top.to_string(),
            width: run.width.to_string(),
            height: run.height.to_string(),
            font_size: run.font_size.to_string(),
            letter_spacing: run.letter_spacing.to_string(),
            writing_mode: run.writing_direction.css_writing_mode(),
        }
    }
}

/// Standalone HTML frame: the image with a transparent, selectable text layer above it.
pub fn render_html(
    frame: &FrameDocument<'_>,
    runs: &[OverlayRun],
    style: &SelectionStyle,
) -> Result<String> {
    let spans: Vec<SpanView<'_>> = runs.iter().map(SpanView::from).collect();
    let mut context = TeraContext::new();
    context.insert("locale", &frame.locale);
    context.insert("description", &frame.description);
    context.insert("alt", frame.alt);
    context.insert("width", &frame.display_width.to_string());
    context.insert("height", &frame.display_height.to_string());
    context.insert("image_uri", &frame.data_uri());
    context.insert(
        "font_family",
        &style
            .font_family
            .as_deref()
            .map(|family| format!("\"{}\"", escape_css_string(family))),
    );
    context.insert("selection_background", &style.background);
    context.insert("selection_color", &style.color);
    context.insert("spans", &spans);
    Tera::one_off(FRAME_TEMPLATE, &context, true).with_context(|| "failed to render frame template")
}

/// SVG with the image and zero-opacity text runs.
pub fn render_svg(frame: &FrameDocument<'_>, runs: &[OverlayRun], font_family: Option<&str>) -> String {
    let mut svg = svg_header(frame);
    for run in runs {
        push_text(&mut svg, run, font_family, r##"fill="#000000" fill-opacity="0""##);
    }
    svg.push_str("</svg>");
    svg
}

/// Visible boxes and text for checking alignment against the baked-in pixels.
pub fn render_debug_svg(
    frame: &FrameDocument<'_>,
    runs: &[OverlayRun],
    font_family: Option<&str>,
    box_color: &str,
    text_color: &str,
) -> String {
    let mut svg = svg_header(frame);
    for run in runs {
        svg.push_str(&format!(
            r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="none" stroke="{stroke}" stroke-width="1"/>"#,
            x = run.left,
            y = run.top,
            w = run.width,
            h = run.height,
            stroke = escape_xml(box_color)
        ));
        let paint = format!(r#"fill="{}" fill-opacity="0.8""#, escape_xml(text_color));
        push_text(&mut svg, run, font_family, &paint);
    }
    svg.push_str("</svg>");
    svg
}

fn svg_header(frame: &FrameDocument<'_>) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = frame.display_width,
        h = frame.display_height
    );
    if let Some(uri) = frame.data_uri() {
        svg.push_str(&format!(
            r#"<image href="{uri}" xlink:href="{uri}" x="0" y="0" width="{w}" height="{h}" preserveAspectRatio="none"/>"#,
            uri = uri,
            w = frame.display_width,
            h = frame.display_height
        ));
    }
    svg
}

fn push_text(svg: &mut String, run: &OverlayRun, font_family: Option<&str>, paint: &str) {
    let family = font_family
        .map(|family| format!(r#" font-family="{}""#, escape_xml(family)))
        .unwrap_or_default();
    match run.writing_direction {
        WritingDirection::Horizontal => {
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" letter-spacing="{spacing}" dominant-baseline="text-before-edge" {paint}{family}>{text}</text>"#,
                x = run.left,
                y = run.top,
                size = run.font_size,
                spacing = run.letter_spacing,
                paint = paint,
                family = family,
                text = escape_xml(&run.text)
            ));
        }
        WritingDirection::Vertical => {
            svg.push_str(&format!(
                r#"<text x="{x}" y="{y}" font-size="{size}" letter-spacing="{spacing}" writing-mode="tb" {paint}{family}>{text}</text>"#,
                x = run.left + run.width - run.font_size * 0.5,
                y = run.top,
                size = run.font_size,
                spacing = run.letter_spacing,
                paint = paint,
                family = family,
                text = escape_xml(&run.text)
            ));
        }
    }
}

pub fn render_svg_bytes(svg: &str, output_mime: &str, font_data: Option<&[u8]>) -> Result<Vec<u8>> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    if let Some(data) = font_data {
        db.load_font_data(data.to_vec());
    }
    let options = Options {
        fontdb: Arc::new(db),
        ..Options::default()
    };
    let tree = Tree::from_str(svg, &options).with_context(|| "failed to parse SVG")?;
    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or_else(|| anyhow!("empty SVG size"))?;
    let mut pixmap_mut = pixmap.as_mut();
    render(&tree, tiny_skia::Transform::identity(), &mut pixmap_mut);
    let image = image::RgbaImage::from_raw(size.width(), size.height(), pixmap.data().to_vec())
        .ok_or_else(|| anyhow!("failed to build image buffer from SVG"))?;
    let format = image_format_from_mime(output_mime)
        .ok_or_else(|| anyhow!("unsupported output image mime '{}'", output_mime))?;
    let mut bytes = Vec::new();
    let mut cursor = Cursor::new(&mut bytes);
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut cursor, format)
        .with_context(|| "failed to encode image from SVG")?;
    Ok(bytes)
}

fn image_format_from_mime(mime: &str) -> Option<image::ImageFormat> {
    match mime {
        "image/png" => Some(image::ImageFormat::Png),
        "image/webp" => Some(image::ImageFormat::WebP),
        "image/bmp" => Some(image::ImageFormat::Bmp),
        "image/tiff" => Some(image::ImageFormat::Tiff),
        _ => None,
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn escape_css_string(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('<', "\\3c ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame<'a>() -> FrameDocument<'a> {
        FrameDocument {
            image_bytes: None,
            image_mime: "image/png",
            alt: "Sign <board>",
            locale: Some("ja"),
            description: Some("出口\nexit"),
            display_width: 320.0,
            display_height: 240.0,
        }
    }

    fn runs() -> Vec<OverlayRun> {
        vec![
            OverlayRun {
                text: "Fish & Chips".to_string(),
                left: 10.0,
                top: 20.0,
                width: 120.0,
                height: 16.0,
                writing_direction: WritingDirection::Horizontal,
                font_size: 16.0,
                letter_spacing: 1.5,
            },
            OverlayRun {
                text: "出口".to_string(),
                left: 200.0,
                top: 30.0,
                width: 20.0,
                height: 60.0,
                writing_direction: WritingDirection::Vertical,
                font_size: 20.0,
                letter_spacing: 10.0,
            },
        ]
    }

    fn style() -> SelectionStyle {
        SelectionStyle {
            background: "#bfdbfe".to_string(),
            color: "#000000".to_string(),
            font_family: None,
        }
    }

    #[test]
    fn html_carries_locale_and_description() {
        let html = render_html(&frame(), &runs(), &style()).expect("html");
        assert!(html.starts_with("<!doctype html>\n<html lang=\"ja\">"));
        assert!(html.contains("<meta name=\"description\" content=\"出口\nexit\">"));
        assert!(html.contains("<title>Sign &lt;board&gt;</title>"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn html_without_locale_or_description() {
        let mut frame = frame();
        frame.locale = None;
        frame.description = None;
        let html = render_html(&frame, &[], &style()).expect("html");
        assert!(html.contains("<html>"));
        assert!(!html.contains("name=\"description\""));
    }

    #[test]
    fn html_spans_use_run_geometry() {
        let html = render_html(&frame(), &runs(), &style()).expect("html");
        assert!(html.contains(
            "left:10px;top:20px;width:120px;height:16px;font-size:16px;letter-spacing:1.5px;writing-mode:horizontal-tb\">Fish &amp; Chips</span>"
        ));
        assert!(html.contains("writing-mode:vertical-rl\">出口</span>"));
        assert!(html.contains("color: transparent"));
        assert!(html.contains("::selection { background: #bfdbfe; color: #000000; }"));
        assert_eq!(html.matches("<span ").count(), 2);
    }

    #[test]
    fn html_quotes_font_family_for_css() {
        let mut style = style();
        style.font_family = Some("Noto \"Sans\" </style>".to_string());
        let html = render_html(&frame(), &runs(), &style).expect("html");
        assert!(html.contains(r#"font-family: "Noto \"Sans\" \3c /style>", sans-serif;"#));
        assert_eq!(html.matches("</style>").count(), 1);
    }

    #[test]
    fn html_embeds_image_as_data_uri() {
        let bytes = [0x89u8, b'P', b'N', b'G'];
        let mut frame = frame();
        frame.image_bytes = Some(&bytes);
        let html = render_html(&frame, &[], &style()).expect("html");
        assert!(html.contains(r#"<img src="data:image/png;base64,iVBORw==" alt="Sign &lt;board&gt;""#));
    }

    #[test]
    fn svg_text_is_invisible() {
        let svg = render_svg(&frame(), &runs(), Some("Noto Sans"));
        assert_eq!(svg.matches(r#"fill-opacity="0""#).count(), 2);
        assert!(svg.contains(r#"writing-mode="tb""#));
        assert!(svg.contains(r#"font-family="Noto Sans""#));
        assert!(svg.ends_with("</svg>"));
    }

    #[test]
    fn debug_svg_outlines_each_run() {
        let svg = render_debug_svg(&frame(), &runs(), None, "#00c853", "#c40000");
        assert_eq!(svg.matches("<rect ").count(), 2);
        assert!(svg.contains(r##"stroke="#00c853""##));
    }

    #[test]
    fn unsupported_raster_mime_is_rejected() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="4" height="4"></svg>"#;
        let err = render_svg_bytes(svg, "image/heic", None).expect_err("unsupported");
        assert!(err.to_string().contains("image/heic"));
    }
}
