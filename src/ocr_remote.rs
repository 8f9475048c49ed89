// src/ocr_remote.rs

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::RemoteOcrConfig;
use crate::errors::ExtractionError;
use crate::extract::{FileKind, Progress, ReceiptImage};

#[derive(Debug, Deserialize)]
struct OcrResponse {
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Client for an HTTP OCR service.
///
/// The service takes the raw image bytes as the request body of
/// `POST {base_url}/ocr` and answers with `{"text": "...", "confidence": 0.93}`.
pub struct RemoteOcr {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl RemoteOcr {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }

    pub fn from_config(cfg: &RemoteOcrConfig) -> Self {
        let api_key = cfg.api_key_env.as_deref().and_then(|var| match std::env::var(var) {
            Ok(key) => Some(key),
            Err(_) => {
                warn!(var, "OCR api key env var not set, sending unauthenticated requests");
                None
            }
        });
        info!(url = %cfg.base_url, authenticated = api_key.is_some(), "Using remote OCR backend");
        Self::new(&cfg.base_url, api_key, Duration::from_secs(cfg.timeout_secs))
    }

    pub async fn recognize(&self, image: &ReceiptImage, progress: &Progress) -> Result<String, ExtractionError> {
        let mime = match image.kind {
            FileKind::Image { mime } => mime,
            FileKind::Pdf => "application/pdf",
            FileKind::Text => "text/plain",
        };

        let mut request = self
            .client
            .post(format!("{}/ocr", self.base_url))
            .header("Content-Type", mime)
            .timeout(self.timeout)
            .body(image.bytes.clone());
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        progress.report(10);
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Recognition(format!("OCR service error {status}: {body}")));
        }
        progress.report(90);

        let ocr: OcrResponse = response.json().await?;
        info!(
            file = %image.file_name,
            chars = ocr.text.len(),
            confidence = ?ocr.confidence,
            "OCR result"
        );
        Ok(ocr.text)
    }
}
