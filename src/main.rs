use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use image_text_layer::{Config, OutputFormat, RunOutput};

#[derive(Parser, Debug)]
#[command(
    name = "image-text-layer",
    version,
    about = "Lay invisible, selectable text over the text baked into an image"
)]
struct Cli {
    /// Detector output JSON (reads stdin when omitted)
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Image the detector ran on (natural size, embedded in html/svg/png output)
    #[arg(short = 'I', long = "image")]
    image: Option<PathBuf>,

    /// Natural image width in pixels (overrides --image)
    #[arg(long = "natural-width")]
    natural_width: Option<f64>,

    /// Natural image height in pixels (overrides --image)
    #[arg(long = "natural-height")]
    natural_height: Option<f64>,

    /// Displayed width in pixels (default: natural width, or keeps aspect ratio)
    #[arg(short = 'W', long = "display-width")]
    display_width: Option<f64>,

    /// Displayed height in pixels (default: natural height, or keeps aspect ratio)
    #[arg(short = 'H', long = "display-height")]
    display_height: Option<f64>,

    /// Font file used to measure overlay text
    #[arg(short = 'f', long = "font")]
    font: Option<PathBuf>,

    /// Output format
    #[arg(short = 'F', long = "format", value_enum, default_value_t = Format::Runs)]
    format: Format,

    /// Write output to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    /// Overlay runs as JSON
    Runs,
    /// Merged annotations as JSON
    Annotations,
    /// Standalone HTML frame with a selectable text layer
    Html,
    /// SVG with invisible text runs
    Svg,
    /// PNG with visible boxes and text, for checking alignment
    Png,
}

impl From<Format> for OutputFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Runs => OutputFormat::Runs,
            Format::Annotations => OutputFormat::Annotations,
            Format::Html => OutputFormat::Html,
            Format::Svg => OutputFormat::Svg,
            Format::Png => OutputFormat::Png,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    image_text_layer::logging::init(cli.verbose)?;

    let input = match &cli.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read input: {}", path.display()))?,
        None => {
            if io::stdin().is_terminal() {
                return Err(anyhow!("no detector output; pass --input or pipe JSON to stdin"));
            }
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .with_context(|| "failed to read stdin")?;
            buffer
        }
    };
    if input.trim().is_empty() {
        return Err(anyhow!("detector output is empty"));
    }

    let output = image_text_layer::run(
        Config {
            image: cli.image,
            natural_width: cli.natural_width,
            natural_height: cli.natural_height,
            display_width: cli.display_width,
            display_height: cli.display_height,
            font: cli.font,
            format: cli.format.into(),
            output: cli.output,
            settings_path: cli.read_settings,
        },
        &input,
    )?;

    match output {
        RunOutput::Text(text) => println!("{}", text),
        RunOutput::Written(path) => eprintln!("wrote {}", path.display()),
    }
    Ok(())
}
