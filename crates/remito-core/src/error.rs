//! Error types for the remito-core library.

use thiserror::Error;

/// Main error type for the remito library.
#[derive(Error, Debug)]
pub enum RemitoError {
    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// AI backend error.
    ///
    /// The extraction orchestrator recovers from these by falling back to the
    /// deterministic parser; they only surface when the AI client is called
    /// directly.
    #[error("AI backend error: {0}")]
    Ai(#[from] AiError),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// Note store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Picking workflow rule violation.
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// No OCR backend was configured for an image input.
    #[error("no OCR backend configured")]
    Unavailable,
}

/// Errors related to the AI parsing backend.
#[derive(Error, Debug)]
pub enum AiError {
    /// The HTTP request failed (connection, timeout, TLS).
    #[cfg(feature = "ai")]
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response envelope did not have the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The embedded product payload was not valid JSON.
    #[error("failed to parse product payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Missing API key or endpoint.
    #[error("AI backend not configured: {0}")]
    NotConfigured(String),
}

/// Errors related to PDF processing.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// No page image could be found for OCR.
    #[error("no page image found")]
    NoImage,

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors raised by note stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No note with the given identifier.
    #[error("delivery note not found: {0}")]
    NoteNotFound(String),

    /// The note has no item with the given SKU.
    #[error("item {sku} not found in delivery note {note_id}")]
    ItemNotFound { note_id: String, sku: String },

    /// A stored document could not be (de)serialized.
    #[error("corrupt note document: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend I/O failure.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Picking workflow rule violations.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkflowError {
    /// Scanned quantity would exceed the requested quantity.
    #[error("cannot exceed requested quantity ({asked}) for {sku}")]
    AboveRequested { sku: String, asked: u32 },

    /// Scanned quantity would drop below one once scanning started.
    #[error("cannot go below 1 for {sku} once scanning started")]
    BelowMinimum { sku: String },

    /// The note is not in a status that accepts scans.
    #[error("delivery note {0} does not accept scans in its current status")]
    ScanNotAllowed(String),

    /// Some items are neither fully scanned nor reported.
    #[error("delivery note {0} has items that are neither complete nor reported")]
    NotReady(String),
}

/// Result type for the remito library.
pub type Result<T> = std::result::Result<T, RemitoError>;
