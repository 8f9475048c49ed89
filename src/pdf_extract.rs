// src/pdf_extract.rs

use lopdf::{Dictionary, Document};
use tracing::{info, warn};

/// Result of attempting to read the text layer of a receipt PDF.
#[derive(Debug)]
pub enum PdfContent {
    /// The PDF carries a text layer.
    Text(String),
    /// Image-only pages (a scan or a photo wrapped in a PDF). Needs OCR.
    ScannedImage,
    /// Not a PDF we can open.
    Error(String),
}

/// Receipts are short, but a real text layer still has more than a
/// handful of non-whitespace characters.
const MIN_TEXT_CHARS: usize = 20;

/// Share of image-only pages above which the whole document counts as scanned.
const SCANNED_PAGE_RATIO: f64 = 0.8;

pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return PdfContent::Error(format!("Failed to parse PDF: {e}")),
    };

    if looks_like_scanned(&doc) {
        info!("Receipt PDF looks image-only");
        return PdfContent::ScannedImage;
    }

    match pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "Text layer too thin, treating as scanned");
                PdfContent::ScannedImage
            } else {
                info!(chars = meaningful, "Read receipt text layer");
                PdfContent::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed, treating as scanned");
            PdfContent::ScannedImage
        }
    }
}

/// Does the page's `Resources` entry hold a non-empty `key` dictionary?
fn page_resource_nonempty(doc: &Document, page: &Dictionary, key: &[u8]) -> bool {
    page.get(b"Resources")
        .ok()
        .and_then(|r| doc.dereference(r).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .and_then(|res| res.get(key).ok())
        .and_then(|entry| doc.dereference(entry).ok())
        .and_then(|(_, resolved)| resolved.as_dict().ok())
        .is_some_and(|dict| !dict.is_empty())
}

/// A page with XObject images but no fonts is almost certainly a scan.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let image_only = pages
        .values()
        .filter_map(|id| doc.get_object(*id).ok())
        .filter_map(|obj| obj.as_dict().ok())
        .filter(|page| {
            page_resource_nonempty(doc, page, b"XObject") && !page_resource_nonempty(doc, page, b"Font")
        })
        .count();

    let ratio = image_only as f64 / pages.len() as f64;
    info!(
        pages = pages.len(),
        image_only,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );
    ratio >= SCANNED_PAGE_RATIO
}
