//! Delivery-note item extraction.
//!
//! The deterministic path runs five stages over OCR text:
//! [`normalize`] → [`extract_product_section`] → [`normalize_lines`] →
//! [`LineParser::parse_line`] → [`ItemCleaner::finalize`].
//! [`Extractor`] puts an optional AI parser in front of it.

pub mod cleaner;
pub mod lines;
pub mod matchers;
pub mod normalizer;
pub mod orchestrator;
pub mod patterns;
pub mod pipeline;
pub mod section;

pub use cleaner::{finalize, ItemCleaner};
pub use lines::normalize_lines;
pub use matchers::{LineMatcher, LineParser, RegexMatcher, RowLayout};
pub use normalizer::normalize;
pub use orchestrator::{ExtractionOutcome, ExtractionReport, Extractor};
pub use pipeline::{DeterministicParser, ParseStats};
pub use section::{extract_product_section, ProductSection, SectionKind};

/// Parse a single line with the built-in matchers.
pub fn parse_line(line: &str) -> Option<crate::models::item::ParsedTriple> {
    LineParser::new().parse_line(line)
}
