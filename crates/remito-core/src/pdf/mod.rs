//! PDF input: embedded text for text PDFs, the page image for scans.

mod extractor;

pub use extractor::PdfExtractor;

use crate::error::PdfError;
use crate::models::config::PdfConfig;

/// Type of PDF content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfType {
    /// Contains extractable text.
    Text,
    /// Contains only images (scanned document).
    Image,
    /// Contains both text and images.
    Hybrid,
    /// Empty or unreadable.
    Empty,
}

/// What the extraction pipeline should read from a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfSource {
    /// Embedded text, ready for parsing.
    Text(String),
    /// Encoded image of the first page, to be OCR'd.
    Scanned(Vec<u8>),
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Decide how to read a PDF.
///
/// Embedded text is used when it is long enough; otherwise the first page
/// image is returned for OCR.
pub fn prepare(data: &[u8], config: &PdfConfig) -> Result<PdfSource> {
    let extractor = PdfExtractor::load(data)?;

    if config.prefer_embedded_text {
        match extractor.extract_text() {
            Ok(text) if text.trim().len() >= config.min_text_length => {
                return Ok(PdfSource::Text(text));
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Embedded text unavailable: {}", e),
        }
    }

    extractor.first_page_image().map(PdfSource::Scanned)
}
