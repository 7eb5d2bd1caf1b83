//! WASM bindings for delivery-note digitisation.
//!
//! Exposes the deterministic parser and the picking counters to browsers
//! and Node.js. OCR and the AI backend run on the JavaScript side; their
//! text output is fed back in here.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use remito_core::extraction::{self, DeterministicParser, ParseStats};
use remito_core::models::config::ExtractionConfig;
use remito_core::models::item::ExtractedItem;
use remito_core::models::note::DeliveryNote;
use remito_core::ocr::{boxes_to_text, TextBox};

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Version information.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Extract product lines from OCR text with the deterministic parser.
///
/// Returns `{ source: "fallback", items: [...] }`, the same shape the
/// native extractor reports.
#[wasm_bindgen]
pub fn extract_items_from_text(text: &str) -> Result<JsValue, JsValue> {
    RemitoExtractor::new().extract(text)
}

/// Repair OCR glyph confusions in table delimiters.
#[wasm_bindgen]
pub fn normalize_text(text: &str) -> String {
    extraction::normalize(text)
}

/// Parse a single line into `{ quantity, sku, description }`, or `null`.
#[wasm_bindgen]
pub fn parse_line(line: &str) -> Result<JsValue, JsValue> {
    match extraction::parse_line(line) {
        Some(triple) => to_js(&triple),
        None => Ok(JsValue::NULL),
    }
}

/// Picking progress (whole percent) of an item list.
#[wasm_bindgen]
pub fn note_progress(items: JsValue) -> Result<u32, JsValue> {
    let items: Vec<ExtractedItem> =
        serde_wasm_bindgen::from_value(items).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(DeliveryNote::new("", items).progress_percentage())
}

/// Configurable extractor for browser use.
#[wasm_bindgen]
pub struct RemitoExtractor {
    config: ExtractionConfig,
    parser: DeterministicParser,
}

#[wasm_bindgen]
impl RemitoExtractor {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::with_config(ExtractionConfig::default())
    }

    fn with_config(config: ExtractionConfig) -> Self {
        Self {
            parser: DeterministicParser::new(config.clone()),
            config,
        }
    }

    /// Toggle splitting of words fused by OCR.
    #[wasm_bindgen]
    pub fn set_split_fused_words(&mut self, enabled: bool) {
        let config = ExtractionConfig {
            split_fused_words: enabled,
            ..self.config.clone()
        };
        *self = Self::with_config(config);
    }

    /// Toggle the known-phrase corrections.
    #[wasm_bindgen]
    pub fn set_apply_phrase_fixes(&mut self, enabled: bool) {
        let config = ExtractionConfig {
            apply_phrase_fixes: enabled,
            ..self.config.clone()
        };
        *self = Self::with_config(config);
    }

    /// Extract items from text.
    #[wasm_bindgen]
    pub fn extract(&self, text: &str) -> Result<JsValue, JsValue> {
        #[derive(Serialize)]
        struct Output {
            source: &'static str,
            items: Vec<ExtractedItem>,
        }

        to_js(&Output {
            source: "fallback",
            items: self.parser.parse(text),
        })
    }

    /// Extract items with per-stage counters and timing.
    #[wasm_bindgen]
    pub fn extract_with_stats(&self, text: &str) -> Result<JsValue, JsValue> {
        #[derive(Serialize)]
        struct Output {
            items: Vec<ExtractedItem>,
            stats: ParseStats,
            processing_time_ms: f64,
        }

        let start = js_sys::Date::now();
        let (items, stats) = self.parser.parse_with_stats(text);
        to_js(&Output {
            items,
            stats,
            processing_time_ms: js_sys::Date::now() - start,
        })
    }
}

impl Default for RemitoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// OCR result assembled from browser-side text detection.
#[wasm_bindgen]
pub struct OcrResultJs {
    boxes: Vec<TextBox>,
    row_tolerance: f32,
}

#[wasm_bindgen]
impl OcrResultJs {
    #[wasm_bindgen(constructor)]
    pub fn new(row_tolerance: f32) -> Self {
        Self {
            boxes: Vec::new(),
            row_tolerance,
        }
    }

    /// Add a recognized text box by its four corners.
    #[wasm_bindgen]
    #[allow(clippy::too_many_arguments)]
    pub fn add_box(
        &mut self,
        text: &str,
        x1: f32, y1: f32,
        x2: f32, y2: f32,
        x3: f32, y3: f32,
        x4: f32, y4: f32,
        confidence: f32,
    ) {
        self.boxes.push(TextBox {
            bbox: [x1, y1, x2, y2, x3, y3, x4, y4],
            text: text.to_string(),
            confidence,
        });
    }

    /// Text with one line per table row, cells joined with `" | "`.
    #[wasm_bindgen]
    pub fn get_text(&self) -> String {
        boxes_to_text(&self.boxes, self.row_tolerance)
    }

    /// Extract items from the assembled text.
    #[wasm_bindgen]
    pub fn extract_items(&self) -> Result<JsValue, JsValue> {
        extract_items_from_text(&self.get_text())
    }
}
