use thiserror::Error;

use crate::session::Step;

/// Rejected user actions. None of these mutate state.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplitError {
    #[error("Name must not be empty")]
    EmptyName,
    #[error("A participant named {0:?} already exists")]
    DuplicateName(String),
    #[error("Tax is required")]
    MissingTax,
    #[error("Tip is required")]
    MissingTip,
    #[error("Add at least one row before continuing")]
    NoDraftRows,
    #[error("Unknown participant: {0}")]
    UnknownPerson(String),
    #[error("Unknown item: {0}")]
    UnknownItem(String),
    #[error("Rejected price {input:?} for {item}")]
    InvalidPrice { item: String, input: String },
    #[error("Invalid weight {weight} for {person}: weights must be positive")]
    InvalidWeight { person: String, weight: f64 },
    #[error("Add at least one participant before assigning items")]
    NoParticipants,
    #[error("Cannot continue from {0:?}: {1}")]
    StepBlocked(Step, &'static str),
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Recognition failed: {0}")]
    Recognition(String),
    #[error("PDF is scanned / image-only and no OCR backend is configured")]
    ScannedWithoutOcr,
    #[error("No OCR backend configured for image receipts")]
    NoOcrBackend,
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Extraction superseded by a newer image")]
    Superseded,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),
}
