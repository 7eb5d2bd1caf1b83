//! Gemini `generateContent` client.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::AiError;
use crate::models::config::AiConfig;
use crate::models::item::ExtractedItem;

use super::{parse_products_response, AiParser, DocumentInput};

const RESPONSE_FORMAT: &str = r#"Please extract all products and return them in the following JSON format:
{
  "products": [
    {
      "quantity": number,
      "sku": "string (product code/barcode, usually 8-15 digits)",
      "description": "string (clean product name without codes or expiration dates)"
    }
  ]
}"#;

const TEXT_INSTRUCTIONS: &str = "Instructions:
1. Look for lines that contain product information (usually with quantity, product code, and description)
2. Extract the quantity (number at the beginning of product lines)
3. Extract the SKU/barcode (long numeric codes, typically 8-15 digits)
4. Extract and clean the product description (remove expiration dates, batch codes, and extra symbols)
5. If quantity is missing, assume it's 1
6. Only include actual products, skip headers, totals, and non-product lines
7. Clean up OCR artifacts (like | symbols, extra spaces, etc.)

Return only the JSON object, no additional text.";

const DOCUMENT_INSTRUCTIONS: &str = "Instructions:
1. Look for product tables or lists in the document
2. Extract the quantity (number of units for each product)
3. Extract the SKU/barcode (long numeric codes, typically 8-15 digits)
4. Extract and clean the product description (remove expiration dates, batch codes, and extra symbols)
5. If quantity is missing, assume it's 1
6. Only include actual products, skip headers, totals, and non-product lines
7. Clean up any formatting artifacts from the document

Return only the JSON object, no additional text.";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateResponse {
    fn into_text(self) -> Result<String, AiError> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| AiError::InvalidResponse("no candidate text in response".to_string()))
    }
}

/// Client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: Client,
    config: AiConfig,
    api_key: String,
}

impl GeminiClient {
    /// Create a client from configuration.
    ///
    /// Fails with [`AiError::NotConfigured`] when no API key is set in the
    /// config or the environment.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config
            .resolve_api_key()
            .ok_or_else(|| AiError::NotConfigured("missing API key".to_string()))?;
        Self::new(config.clone(), api_key)
    }

    /// Create a client with an explicit API key.
    pub fn new(config: AiConfig, api_key: impl Into<String>) -> Result<Self, AiError> {
        if config.api_url.trim().is_empty() {
            return Err(AiError::NotConfigured("empty API URL".to_string()));
        }
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config,
            api_key: api_key.into(),
        })
    }

    pub(crate) fn text_request(&self, ocr_text: &str) -> GenerateRequest {
        let text = truncate_chars(ocr_text, self.config.max_prompt_chars);
        let prompt = format!(
            "Analyze the following OCR-extracted text from a delivery note (remito) and extract product information.\n\nOCR Text:\n{}\n\n{}\n\n{}",
            text, RESPONSE_FORMAT, TEXT_INSTRUCTIONS
        );
        self.request(vec![Part::Text { text: prompt }])
    }

    pub(crate) fn document_request(&self, document: &DocumentInput) -> GenerateRequest {
        let prompt = format!(
            "Analyze the provided document which contains a delivery note (remito) and extract product information.\n\n{}\n\n{}",
            RESPONSE_FORMAT, DOCUMENT_INSTRUCTIONS
        );
        self.request(vec![
            Part::Text { text: prompt },
            Part::Inline {
                inline_data: InlineData {
                    mime_type: document.mime_type.clone(),
                    data: STANDARD.encode(&document.bytes),
                },
            },
        ])
    }

    fn request(&self, parts: Vec<Part>) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_k: 1,
                top_p: 1.0,
                max_output_tokens: self.config.max_output_tokens,
                response_mime_type: "application/json",
            },
        }
    }

    async fn send(&self, request: &GenerateRequest) -> Result<Vec<ExtractedItem>, AiError> {
        let response = self
            .http
            .post(&self.config.api_url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status { status, body });
        }

        let envelope: GenerateResponse = response.json().await?;
        let text = envelope.into_text()?;
        debug!("Gemini answer: {} chars", text.len());

        let items = parse_products_response(&text)?;
        info!("Gemini returned {} products", items.len());
        Ok(items)
    }
}

#[async_trait]
impl AiParser for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn parse_text(&self, text: &str) -> Result<Vec<ExtractedItem>, AiError> {
        let request = self.text_request(text);
        self.send(&request).await
    }

    async fn parse_document(&self, document: &DocumentInput) -> Result<Vec<ExtractedItem>, AiError> {
        debug!(
            "Sending {} document ({} bytes) to Gemini",
            document.mime_type,
            document.bytes.len()
        );
        let request = self.document_request(document);
        self.send(&request).await
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client() -> GeminiClient {
        GeminiClient::new(AiConfig::default(), "test-key").unwrap()
    }

    #[test]
    fn test_text_request_shape() {
        let body = serde_json::to_value(client().text_request("2 | 114800436 | Amoxicilina")).unwrap();

        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("OCR Text:\n2 | 114800436 | Amoxicilina"));
        assert!(prompt.contains("\"products\""));
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);

        assert_eq!(body["generationConfig"]["topK"], json!(1));
        assert_eq!(body["generationConfig"]["topP"], json!(1.0));
        assert_eq!(body["generationConfig"]["maxOutputTokens"], json!(2048));
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            json!("application/json")
        );
    }

    #[test]
    fn test_document_request_inlines_base64() {
        let document = DocumentInput::new(b"%PDF".to_vec(), "application/pdf");
        let body = serde_json::to_value(client().document_request(&document)).unwrap();

        let inline = &body["contents"][0]["parts"][1]["inlineData"];
        assert_eq!(inline["mimeType"], json!("application/pdf"));
        assert_eq!(inline["data"], json!("JVBERg=="));
    }

    #[test]
    fn test_prompt_truncated() {
        let config = AiConfig {
            max_prompt_chars: 5,
            ..AiConfig::default()
        };
        let client = GeminiClient::new(config, "k").unwrap();
        let body = serde_json::to_value(client.text_request("áéíóúXYZ")).unwrap();
        let prompt = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains("OCR Text:\náéíóú\n"));
        assert!(!prompt.contains("XYZ"));
    }

    #[test]
    fn test_response_text() {
        let envelope: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "{\"products\": []}"}]}}]
        }))
        .unwrap();
        assert_eq!(envelope.into_text().unwrap(), "{\"products\": []}");

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(empty.into_text(), Err(AiError::InvalidResponse(_))));
    }

    /// Answer one HTTP request on a local port, returning the URL to call and
    /// a handle yielding the raw request that was received.
    async fn serve_once(
        status: &'static str,
        body: String,
    ) -> (String, tokio::task::JoinHandle<String>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/v1/models/test:generateContent", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= head_end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });

        (url, handle)
    }

    fn client_for(url: String) -> GeminiClient {
        let config = AiConfig {
            api_url: url,
            timeout_secs: 5,
            ..AiConfig::default()
        };
        GeminiClient::new(config, "test-key").unwrap()
    }

    #[tokio::test]
    async fn test_send_maps_error_status() {
        let (url, server) =
            serve_once("503 Service Unavailable", "model overloaded".to_string()).await;

        let result = client_for(url).parse_text("2 | 114800436 | Amoxicilina").await;

        match result {
            Err(AiError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "model overloaded");
            }
            other => panic!("expected status error, got {:?}", other),
        }

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/models/test:generateContent?key=test-key "));
    }

    #[tokio::test]
    async fn test_send_parses_fenced_answer() {
        let answer = "```json\n{\"products\": [{\"quantity\": 2, \"sku\": \"114800436\", \"description\": \"Amoxicilina 500mg\"}]}\n```";
        let envelope = json!({
            "candidates": [{"content": {"parts": [{"text": answer}]}}]
        });
        let (url, server) = serve_once("200 OK", envelope.to_string()).await;

        let items = client_for(url)
            .parse_text("2 | 114800436 | Amoxicilina 500mg")
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity_asked, 2);
        assert_eq!(items[0].sku, "114800436");
        assert_eq!(items[0].barcode, Some(114800436));
        assert_eq!(items[0].description, "Amoxicilina 500mg");

        let request = server.await.unwrap();
        assert!(request.contains("\"responseMimeType\":\"application/json\""));
    }

    #[test]
    fn test_missing_key() {
        let config = AiConfig {
            api_key: Some("  ".to_string()),
            ..AiConfig::default()
        };
        if std::env::var(crate::models::config::API_KEY_ENV).is_err() {
            assert!(matches!(
                GeminiClient::from_config(&config),
                Err(AiError::NotConfigured(_))
            ));
        }
    }
}
