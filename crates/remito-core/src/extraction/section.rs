//! Isolation of the product table from headers, footers and signatures.

use serde::Serialize;
use tracing::debug;

use crate::models::item::CandidateLine;

use super::patterns::{HEURISTIC_ROWS, PRODUCT_HEADER, QUANTITY_HEADER, SECTION_END};

/// How the product section was located.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Bounded by a table header (and optionally a footer).
    Marked,
    /// No header found; product-like rows were picked individually.
    Heuristic,
}

/// Candidate product lines of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSection {
    pub kind: SectionKind,
    pub lines: Vec<CandidateLine>,
}

/// Whether a line is a table header (`Cantidad ... Producto`).
pub fn is_table_header(line: &str) -> bool {
    QUANTITY_HEADER.is_match(line) && PRODUCT_HEADER.is_match(line)
}

/// Whether a line closes the product table (unit totals, signature block).
pub fn is_section_end(line: &str) -> bool {
    SECTION_END.is_match(line)
}

/// Whether a line has the shape of a product row.
pub fn looks_like_product_row(line: &str) -> bool {
    let line = line.trim();
    HEURISTIC_ROWS.iter().any(|re| re.is_match(line))
}

/// Extract the product-table region of normalized text.
///
/// Each candidate's `line_index` is its line number in `text`.
///
/// The first header line opens the section and the first footer line after
/// it closes it (end of text otherwise). Without a header, every line that
/// looks like a product row is returned instead, since OCR often drops or
/// garbles header rows.
pub fn extract_product_section(text: &str) -> ProductSection {
    let lines: Vec<&str> = text.lines().collect();

    let mut start = None;
    let mut end = lines.len();

    for (idx, line) in lines.iter().enumerate() {
        match start {
            None if is_table_header(line) => start = Some(idx + 1),
            Some(_) if is_section_end(line) => {
                end = idx;
                break;
            }
            _ => {}
        }
    }

    match start {
        Some(start) => {
            debug!("Product section: lines {}..{} of {}", start, end, lines.len());
            ProductSection {
                kind: SectionKind::Marked,
                lines: lines[start..end]
                    .iter()
                    .enumerate()
                    .map(|(offset, line)| CandidateLine::new(*line, start + offset))
                    .collect(),
            }
        }
        None => {
            let rows: Vec<CandidateLine> = lines
                .iter()
                .enumerate()
                .filter(|(_, line)| looks_like_product_row(line))
                .map(|(idx, line)| CandidateLine::new(*line, idx))
                .collect();
            debug!(
                "No table header found, {} product-like rows selected",
                rows.len()
            );
            ProductSection {
                kind: SectionKind::Heuristic,
                lines: rows,
            }
        }
    }
}
