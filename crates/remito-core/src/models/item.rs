//! Line-item types produced by the extraction pipeline.

use serde::{Deserialize, Serialize};

/// Lowest accepted requested quantity.
pub const MIN_QUANTITY: u32 = 1;

/// Highest accepted requested quantity.
pub const MAX_QUANTITY: u32 = 999;

/// Accepted SKU length range (characters).
pub const SKU_LEN: std::ops::RangeInclusive<usize> = 8..=15;

/// A single line of text during extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateLine {
    /// Line text.
    pub content: String,
    /// Zero-based line number in the normalized text the section was taken
    /// from. Noise lines trimmed from the start of raw OCR text are not
    /// counted.
    pub line_index: usize,
}

impl CandidateLine {
    pub fn new(content: impl Into<String>, line_index: usize) -> Self {
        Self {
            content: content.into(),
            line_index,
        }
    }
}

/// Intermediate result of a successful line match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedTriple {
    /// Requested quantity.
    pub quantity: u32,
    /// Product code as read from the line.
    pub sku: String,
    /// Raw, uncleaned description.
    pub description: String,
}

impl ParsedTriple {
    pub fn new(quantity: u32, sku: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            quantity,
            sku: sku.into(),
            description: description.into(),
        }
    }

    /// Check the quantity, SKU length and description bounds of a triple.
    pub fn is_within_bounds(&self) -> bool {
        (MIN_QUANTITY..=MAX_QUANTITY).contains(&self.quantity)
            && SKU_LEN.contains(&self.sku.trim().chars().count())
            && self.description.trim().chars().count() > 2
    }
}

/// A product line on a delivery note.
///
/// Field names follow the document-store layout shared with the front-end
/// (`quantity_asked`, `reporte`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedItem {
    /// Requested count.
    pub quantity_asked: u32,

    /// Count confirmed by scanning.
    #[serde(default)]
    pub quantity_scanned: u32,

    /// Product code.
    pub sku: String,

    /// Numeric interpretation of the SKU.
    pub barcode: Option<u64>,

    /// Product description.
    pub description: String,

    /// Product image reference.
    #[serde(default)]
    pub image: String,

    /// Problem report annotation.
    #[serde(default)]
    pub reporte: String,
}

impl ExtractedItem {
    /// Build an unscanned item.
    pub fn new(quantity_asked: u32, sku: impl Into<String>, description: impl Into<String>) -> Self {
        let sku = sku.into();
        Self {
            quantity_asked,
            quantity_scanned: 0,
            barcode: sku.trim().parse().ok(),
            sku,
            description: description.into(),
            image: String::new(),
            reporte: String::new(),
        }
    }

    /// Whether the item satisfies the emitted-item invariant.
    pub fn is_valid(&self) -> bool {
        (MIN_QUANTITY..=MAX_QUANTITY).contains(&self.quantity_asked)
            && SKU_LEN.contains(&self.sku.chars().count())
            && !self.description.trim().is_empty()
    }

    /// Whether a scanned or typed code refers to this item.
    pub fn matches_code(&self, code: &str) -> bool {
        let code = code.trim();
        if code.is_empty() {
            return false;
        }
        self.sku == code || self.barcode.is_some_and(|b| b.to_string() == code)
    }

    /// Whether a problem report is attached.
    pub fn is_reported(&self) -> bool {
        !self.reporte.trim().is_empty()
    }

    /// Whether every requested unit has been scanned.
    pub fn is_complete(&self) -> bool {
        self.quantity_scanned >= self.quantity_asked
    }

    /// Picking state of the item.
    pub fn state(&self) -> ItemState {
        if self.is_reported() {
            ItemState::Reported
        } else if self.is_complete() {
            ItemState::Complete
        } else if self.quantity_scanned > 0 {
            ItemState::Partial
        } else {
            ItemState::Pending
        }
    }
}

/// Picking state of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Nothing scanned yet.
    Pending,
    /// Some, but not all, units scanned.
    Partial,
    /// All requested units scanned.
    Complete,
    /// A problem report is attached.
    Reported,
}

impl ItemState {
    /// Display label used by the picking screens.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pendiente",
            Self::Partial => "Parcial",
            Self::Complete => "Completo",
            Self::Reported => "Reportado",
        }
    }
}

/// Which extraction path produced an item list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionSource {
    /// External AI text-parsing backend.
    Ai,
    /// Deterministic pattern-matching pipeline.
    Fallback,
}

impl ExtractionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
