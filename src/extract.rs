// src/extract.rs

use std::path::Path;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{OcrBackend, OcrSection};
use crate::errors::ExtractionError;
use crate::ocr_remote::RemoteOcr;
use crate::pdf_extract::{PdfContent, extract_text_from_pdf};
use crate::receipt::ImageRef;

/// What kind of receipt file we were handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Text that was already recognised elsewhere.
    Text,
    Pdf,
    Image { mime: &'static str },
}

impl FileKind {
    pub fn from_file_name(name: &str) -> Result<Self, ExtractionError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let kind = match ext.as_str() {
            "txt" => Self::Text,
            "pdf" => Self::Pdf,
            "png" => Self::Image { mime: "image/png" },
            "jpg" | "jpeg" => Self::Image { mime: "image/jpeg" },
            "gif" => Self::Image { mime: "image/gif" },
            "bmp" => Self::Image { mime: "image/bmp" },
            "webp" => Self::Image { mime: "image/webp" },
            "tif" | "tiff" => Self::Image { mime: "image/tiff" },
            "heic" => Self::Image { mime: "image/heic" },
            _ => return Err(ExtractionError::UnsupportedFileType(name.to_string())),
        };
        Ok(kind)
    }
}

/// A submitted receipt file, held in memory.
#[derive(Debug, Clone)]
pub struct ReceiptImage {
    pub file_name: String,
    pub kind: FileKind,
    pub bytes: Vec<u8>,
}

impl ReceiptImage {
    pub fn from_bytes(file_name: &str, bytes: Vec<u8>) -> Result<Self, ExtractionError> {
        Ok(Self {
            file_name: file_name.to_string(),
            kind: FileKind::from_file_name(file_name)?,
            bytes,
        })
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        // Reject by extension before reading anything
        FileKind::from_file_name(&file_name)?;
        let bytes = tokio::fs::read(path).await?;
        let image = Self::from_bytes(&file_name, bytes)?;
        info!(file = %image.file_name, kind = ?image.kind, bytes = image.bytes.len(), "Loaded receipt file");
        Ok(image)
    }

    pub fn fingerprint(&self) -> ImageRef {
        ImageRef {
            file_name: self.file_name.clone(),
            sha256: format!("{:x}", Sha256::digest(&self.bytes)),
        }
    }
}

/// Progress sink for one extraction, in percent.
pub struct Progress(watch::Sender<u8>);

impl Progress {
    pub fn new(tx: watch::Sender<u8>) -> Self {
        Self(tx)
    }

    /// A sink nobody listens to.
    #[cfg(test)]
    pub fn detached() -> Self {
        Self(watch::channel(0).0)
    }

    pub fn report(&self, percent: u8) {
        self.0.send_replace(percent.min(100));
    }
}

/// Turns a receipt file into free-form text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, image: &ReceiptImage, progress: &Progress) -> Result<String, ExtractionError>;
}

/// Picks a backend by file kind: text is read as-is, PDFs use their embedded
/// text layer, images (and scanned PDFs) go to OCR when one is configured.
pub struct ReceiptExtractor {
    ocr: Option<RemoteOcr>,
}

impl ReceiptExtractor {
    pub fn new(ocr: Option<RemoteOcr>) -> Self {
        Self { ocr }
    }

    pub fn from_config(ocr: &OcrSection) -> Self {
        match ocr.backend {
            OcrBackend::Disabled => {
                info!("OCR backend disabled, only text and text PDFs can be read");
                Self::new(None)
            }
            OcrBackend::Remote => Self::new(Some(RemoteOcr::from_config(&ocr.remote))),
        }
    }

    async fn ocr(&self, image: &ReceiptImage, progress: &Progress) -> Result<String, ExtractionError> {
        let ocr = self.ocr.as_ref().ok_or(ExtractionError::NoOcrBackend)?;
        ocr.recognize(image, progress).await
    }
}

#[async_trait]
impl TextExtractor for ReceiptExtractor {
    async fn extract(&self, image: &ReceiptImage, progress: &Progress) -> Result<String, ExtractionError> {
        progress.report(0);
        let text = match image.kind {
            FileKind::Text => String::from_utf8_lossy(&image.bytes).into_owned(),
            FileKind::Pdf => match extract_text_from_pdf(&image.bytes) {
                PdfContent::Text(text) => text,
                PdfContent::ScannedImage if self.ocr.is_some() => {
                    info!("PDF is scanned, sending to OCR");
                    self.ocr(image, progress).await?
                }
                PdfContent::ScannedImage => return Err(ExtractionError::ScannedWithoutOcr),
                PdfContent::Error(e) => return Err(ExtractionError::Recognition(e)),
            },
            FileKind::Image { .. } => self.ocr(image, progress).await?,
        };
        if text.trim().is_empty() {
            warn!(file = %image.file_name, "Extraction produced no text");
        }
        progress.report(100);
        Ok(text)
    }
}
