// src/receipt/mod.rs

mod parser;

use serde::{Deserialize, Serialize};

pub use parser::parse_leading_float;

/// A line item recognised on a receipt, before it enters the item store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedItem {
    pub name: String,
    pub price: f64,
    pub count: u32,
}

/// Fingerprint of the image a summary was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub file_name: String,
    pub sha256: String,
}

/// Receipt-level amounts and metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSummary {
    pub subtotal: f64,
    pub tax: f64,
    pub tip: f64,
    pub total: f64,
    pub merchant: String,
    pub date: String,
    pub original_image: Option<ImageRef>,
}

/// Everything the parser could pull out of one block of recognised text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedReceipt {
    pub items: Vec<ParsedItem>,
    pub summary: ReceiptSummary,
}

impl ParsedReceipt {
    /// How many summary fields were detected (out of the scalar ones).
    pub fn coverage(&self) -> (usize, usize) {
        let total = 6;
        let s = &self.summary;
        let filled = [
            s.subtotal > 0.0,
            s.tax > 0.0,
            s.tip > 0.0,
            s.total > 0.0,
            !s.merchant.is_empty(),
            !s.date.is_empty(),
        ]
        .iter()
        .filter(|&&v| v)
        .count();
        (filled, total)
    }
}

/// Parse raw OCR text into line items and summary fields. Never fails.
pub fn parse_receipt(text: &str) -> ParsedReceipt {
    parser::parse(text)
}
