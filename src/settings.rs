use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");

#[derive(Debug, Clone)]
pub struct Settings {
    pub font_path: Option<String>,
    pub font_family: Option<String>,
    pub font_fallback: Vec<String>,
    pub selection_background: String,
    pub selection_color: String,
    pub debug_box_color: String,
    pub debug_text_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            font_path: None,
            font_family: None,
            font_fallback: vec!["sans-serif".to_string()],
            selection_background: "#bfdbfe".to_string(),
            selection_color: "#000000".to_string(),
            debug_box_color: "#00c853".to_string(),
            debug_text_color: "#c40000".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    font: Option<FontSettings>,
    selection: Option<SelectionSettings>,
    debug: Option<DebugSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct FontSettings {
    path: Option<String>,
    family: Option<String>,
    fallback: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SelectionSettings {
    background: Option<String>,
    color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DebugSettings {
    box_color: Option<String>,
    text_color: Option<String>,
}

/// Built-in defaults, then `./settings*.toml`, then the home directory, then `extra_path`.
pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    let mut settings = Settings::default();
    let defaults: SettingsFile = toml::from_str(DEFAULT_SETTINGS_TOML)
        .with_context(|| "failed to parse built-in settings")?;
    settings.merge(defaults);

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            let parsed: SettingsFile = toml::from_str(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
            settings.merge(parsed);
        }
    }

    Ok(settings)
}

impl Settings {
    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(font) = incoming.font {
            if let Some(path) = font.path {
                self.font_path = non_empty(path);
            }
            if let Some(family) = font.family {
                self.font_family = non_empty(family);
            }
            if let Some(fallback) = font.fallback {
                let fallback: Vec<String> = fallback.into_iter().filter_map(non_empty).collect();
                if !fallback.is_empty() {
                    self.font_fallback = fallback;
                }
            }
        }
        if let Some(selection) = incoming.selection {
            replace_color(&mut self.selection_background, selection.background);
            replace_color(&mut self.selection_color, selection.color);
        }
        if let Some(debug) = incoming.debug {
            replace_color(&mut self.debug_box_color, debug.box_color);
            replace_color(&mut self.debug_text_color, debug.text_color);
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn replace_color(slot: &mut String, incoming: Option<String>) {
    if let Some(color) = incoming.and_then(non_empty) {
        *slot = color;
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".image-text-layer"))
        }
    })
}
