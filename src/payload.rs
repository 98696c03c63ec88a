use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::overlay::RawTextBox;

/// Detector output in any of the shapes the image service hands around.
#[derive(Debug, Clone, Default)]
pub struct DetectorPayload {
    pub id: Option<String>,
    pub alt: Option<String>,
    pub text_annotations: Vec<RawTextBox>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PayloadShape {
    Bare(Vec<RawTextBox>),
    Document(DocumentShape),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentShape {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    alt: Option<String>,
    #[serde(default)]
    text_annotations: Option<Vec<RawTextBox>>,
    #[serde(default)]
    responses: Option<Vec<ResponseShape>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseShape {
    #[serde(default)]
    text_annotations: Vec<RawTextBox>,
}

impl DetectorPayload {
    /// The leading full-image entry, carrying the locale and the full recognised text.
    pub fn summary(&self) -> Option<&RawTextBox> {
        self.text_annotations.first()
    }

    pub fn locale(&self) -> Option<&str> {
        self.summary().and_then(|summary| summary.locale.as_deref())
    }

    pub fn full_text(&self) -> Option<&str> {
        self.summary().map(|summary| summary.description.as_str())
    }
}

pub fn parse_payload(json: &str) -> Result<DetectorPayload> {
    let shape: PayloadShape =
        serde_json::from_str(json).with_context(|| "failed to parse detector output JSON")?;
    match shape {
        PayloadShape::Bare(text_annotations) => Ok(DetectorPayload {
            id: None,
            alt: None,
            text_annotations,
        }),
        PayloadShape::Document(document) => {
            let text_annotations = match (document.text_annotations, document.responses) {
                (Some(annotations), _) => annotations,
                (None, Some(responses)) => responses
                    .into_iter()
                    .next()
                    .map(|response| response.text_annotations)
                    .unwrap_or_default(),
                (None, None) => {
                    return Err(anyhow!(
                        "detector output has neither textAnnotations nor responses"
                    ));
                }
            };
            Ok(DetectorPayload {
                id: document.id,
                alt: document.alt,
                text_annotations,
            })
        }
    }
}
