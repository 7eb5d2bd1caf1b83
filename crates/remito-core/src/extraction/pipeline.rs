//! Deterministic text-to-items parser.

use serde::Serialize;
use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::item::ExtractedItem;

use super::cleaner::ItemCleaner;
use super::lines::normalize_lines;
use super::matchers::LineParser;
use super::normalizer::normalize;
use super::section::{extract_product_section, SectionKind};

/// Counters collected during one deterministic parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub total_lines: usize,
    pub section: SectionKind,
    pub candidate_lines: usize,
    pub normalized_lines: usize,
    pub matched_lines: usize,
    pub emitted_items: usize,
}

/// Rule-based parser: normalize, isolate the product table, match rows,
/// validate and clean.
///
/// Holds no mutable state; the same text always yields the same items.
#[derive(Default)]
pub struct DeterministicParser {
    line_parser: LineParser,
    cleaner: ItemCleaner,
}

impl DeterministicParser {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            line_parser: LineParser::new(),
            cleaner: ItemCleaner::new(config),
        }
    }

    /// Replace the line parser (e.g. to add matchers).
    pub fn with_line_parser(mut self, line_parser: LineParser) -> Self {
        self.line_parser = line_parser;
        self
    }

    pub fn line_parser(&self) -> &LineParser {
        &self.line_parser
    }

    /// Parse raw OCR text into items.
    pub fn parse(&self, raw_text: &str) -> Vec<ExtractedItem> {
        self.parse_with_stats(raw_text).0
    }

    /// Parse raw OCR text, also returning per-stage counters.
    pub fn parse_with_stats(&self, raw_text: &str) -> (Vec<ExtractedItem>, ParseStats) {
        let text = normalize(raw_text);
        let section = extract_product_section(&text);
        let candidate_lines = section.lines.len();

        let lines = normalize_lines(section.lines);
        let normalized_lines = lines.len();

        let triples: Vec<_> = lines
            .iter()
            .filter_map(|line| self.line_parser.parse_line(&line.content))
            .collect();
        let matched_lines = triples.len();

        let items = self.cleaner.finalize(triples);

        let stats = ParseStats {
            total_lines: text.lines().count(),
            section: section.kind,
            candidate_lines,
            normalized_lines,
            matched_lines,
            emitted_items: items.len(),
        };
        debug!(
            "Deterministic parse: {:?} section, {} candidates, {} matched, {} items",
            stats.section, stats.candidate_lines, stats.matched_lines, stats.emitted_items
        );

        (items, stats)
    }
}
