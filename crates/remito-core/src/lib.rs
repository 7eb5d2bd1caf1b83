//! Core library for delivery-note (remito) digitisation and picking.
//!
//! This crate provides:
//! - Item extraction from OCR text: a deterministic five-stage parser and an
//!   AI-first orchestrator that falls back to it
//! - OCR and AI backend boundaries (`pure-onnx-ocr`, Gemini)
//! - PDF input (embedded text or scanned page image)
//! - Delivery-note model, picking workflow and note stores

pub mod ai;
pub mod error;
pub mod extraction;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod store;
pub mod workflow;

pub use ai::{AiParser, DocumentInput};
#[cfg(feature = "ai")]
pub use ai::GeminiClient;
pub use error::{RemitoError, Result};
pub use extraction::{
    DeterministicParser, ExtractionOutcome, ExtractionReport, Extractor, LineMatcher, LineParser,
    ParseStats,
};
pub use models::config::RemitoConfig;
pub use models::item::{ExtractedItem, ExtractionSource, ItemState, ParsedTriple};
pub use models::note::{
    DeliveryNote, NoteStatus, ProductReport, ReportType, ScanOutcome, StatusCount,
};
pub use ocr::{OcrBackend, OcrResult, ProgressFn, TextBox};
#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;
pub use pdf::{PdfExtractor, PdfSource, PdfType};
pub use store::{MemoryNoteStore, NoteStore};
#[cfg(feature = "native")]
pub use store::JsonFileStore;
pub use workflow::PickingService;
