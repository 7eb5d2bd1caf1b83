//! OCR boundary: turns a document image into newline-separated text.
//!
//! Recognized text boxes are grouped into table rows by vertical position and
//! the cells of a row are joined with `" | "`, so the extraction pipeline sees
//! the same delimited shape a printed delivery-note table has.

#[cfg(feature = "native")]
mod pure_engine;

#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Progress callback: `(status, percent)` with `percent` in `0.0..=100.0`.
pub type ProgressFn = dyn Fn(&str, f32) + Send + Sync;

/// Text recognition backend.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Recognize the text of an encoded image (PNG, JPEG, ...).
    async fn recognize(
        &self,
        image: &[u8],
        progress: Option<&ProgressFn>,
    ) -> Result<String, OcrError>;
}

/// A recognized text region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBox {
    /// Quadrilateral corners `(x1, y1, ..., x4, y4)`.
    pub bbox: [f32; 8],

    /// Recognized text.
    pub text: String,

    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
}

impl TextBox {
    /// Axis-aligned bounding rectangle `(min_x, min_y, max_x, max_y)`.
    pub fn rect(&self) -> (f32, f32, f32, f32) {
        let xs = [self.bbox[0], self.bbox[2], self.bbox[4], self.bbox[6]];
        let ys = [self.bbox[1], self.bbox[3], self.bbox[5], self.bbox[7]];

        let min_x = xs.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_x = xs.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        let min_y = ys.iter().cloned().fold(f32::INFINITY, f32::min);
        let max_y = ys.iter().cloned().fold(f32::NEG_INFINITY, f32::max);

        (min_x, min_y, max_x, max_y)
    }

    /// Vertical center.
    pub fn center_y(&self) -> f32 {
        let (_, min_y, _, max_y) = self.rect();
        (min_y + max_y) / 2.0
    }
}

/// Result of OCR on one image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResult {
    /// Recognized boxes in reading order.
    pub boxes: Vec<TextBox>,

    /// Text with one line per table row.
    pub text: String,

    /// Processing time in milliseconds.
    pub processing_time_ms: u64,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

/// Group boxes into rows: boxes whose vertical centers are within
/// `tolerance` of the row's first box share a row. Rows are ordered top to
/// bottom and cells left to right.
pub fn group_rows(boxes: &[TextBox], tolerance: f32) -> Vec<Vec<&TextBox>> {
    let mut sorted: Vec<&TextBox> = boxes.iter().filter(|b| !b.text.trim().is_empty()).collect();
    sorted.sort_by(|a, b| a.center_y().total_cmp(&b.center_y()));

    let mut rows: Vec<Vec<&TextBox>> = Vec::new();
    for text_box in sorted {
        let same_row = rows
            .last()
            .is_some_and(|row| (text_box.center_y() - row[0].center_y()).abs() <= tolerance);
        if same_row {
            if let Some(row) = rows.last_mut() {
                row.push(text_box);
            }
        } else {
            rows.push(vec![text_box]);
        }
    }

    for row in &mut rows {
        row.sort_by(|a, b| a.rect().0.total_cmp(&b.rect().0));
    }
    rows
}

/// Render boxes as text: one line per row, cells joined with `" | "`.
pub fn boxes_to_text(boxes: &[TextBox], tolerance: f32) -> String {
    group_rows(boxes, tolerance)
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| b.text.trim())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
