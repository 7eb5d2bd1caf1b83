//! AI parsing backends.
//!
//! An [`AiParser`] turns raw OCR text, or the document itself, into items.
//! The Gemini client lives behind the `ai` feature; the payload mapping below
//! is shared so it can be tested without network access.

#[cfg(feature = "ai")]
pub mod gemini;

#[cfg(feature = "ai")]
pub use gemini::GeminiClient;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::AiError;
use crate::models::item::ExtractedItem;

/// A document sent to the AI backend as inline data.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl DocumentInput {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Guess the MIME type from the leading bytes.
    pub fn sniff(bytes: Vec<u8>) -> Self {
        let mime_type = if bytes.starts_with(b"%PDF") {
            "application/pdf"
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            "image/png"
        } else if bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(b"WEBP".as_slice()) {
            "image/webp"
        } else {
            "image/jpeg"
        };
        Self::new(bytes, mime_type)
    }
}

/// Backend that extracts delivery-note items with a language model.
#[async_trait]
pub trait AiParser: Send + Sync {
    /// Backend name, for logs.
    fn name(&self) -> &str;

    /// Extract items from OCR text.
    async fn parse_text(&self, text: &str) -> Result<Vec<ExtractedItem>, AiError>;

    /// Extract items from a document (image or PDF).
    async fn parse_document(&self, document: &DocumentInput) -> Result<Vec<ExtractedItem>, AiError>;
}

/// Product payload expected from the model.
#[derive(Debug, Deserialize)]
struct ProductsPayload {
    products: Vec<AiProduct>,
}

#[derive(Debug, Deserialize)]
struct AiProduct {
    #[serde(default)]
    quantity: Value,
    #[serde(default)]
    sku: Value,
    #[serde(default)]
    description: Option<String>,
}

/// Parse the model's answer text into items.
///
/// Markdown fences and prose around the JSON object are tolerated. The
/// answer must contain a `products` array.
pub fn parse_products_response(text: &str) -> Result<Vec<ExtractedItem>, AiError> {
    let json = extract_json_object(strip_fences(text))?;
    let payload: ProductsPayload = serde_json::from_str(json)?;
    Ok(payload.products.into_iter().map(map_product).collect())
}

fn map_product(product: AiProduct) -> ExtractedItem {
    let sku = match product.sku {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    let quantity = match product.quantity {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let quantity_asked = match u32::try_from(quantity) {
        Ok(0) | Err(_) => 1,
        Ok(q) => q,
    };

    ExtractedItem {
        quantity_asked,
        quantity_scanned: 0,
        barcode: numeric_barcode(&sku),
        sku,
        description: product.description.unwrap_or_default().trim().to_string(),
        image: String::new(),
        reporte: String::new(),
    }
}

/// Digits of a code read as an integer, ignoring every other character.
pub fn numeric_barcode(code: &str) -> Option<u64> {
    let digits: String = code.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

fn strip_fences(text: &str) -> &str {
    text.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Outermost JSON object of a string that may carry surrounding text.
pub fn extract_json_object(s: &str) -> Result<&str, AiError> {
    let start = s
        .find('{')
        .ok_or_else(|| AiError::InvalidResponse("no '{' in model answer".to_string()))?;
    let end = s
        .rfind('}')
        .ok_or_else(|| AiError::InvalidResponse("no '}' in model answer".to_string()))?;
    if end <= start {
        return Err(AiError::InvalidResponse(
            "malformed JSON in model answer".to_string(),
        ));
    }
    Ok(&s[start..=end])
}
