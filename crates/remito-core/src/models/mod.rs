//! Data models: extracted items, delivery notes, configuration.

pub mod config;
pub mod item;
pub mod note;

pub use config::RemitoConfig;
pub use item::{CandidateLine, ExtractedItem, ExtractionSource, ItemState, ParsedTriple};
pub use note::{DeliveryNote, NoteStatus, ProductReport, ReportType, ScanOutcome, StatusCount};
