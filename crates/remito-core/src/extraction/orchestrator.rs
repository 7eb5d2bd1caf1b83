//! AI-first extraction with deterministic fallback.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ai::{AiParser, DocumentInput};
use crate::error::{OcrError, RemitoError, Result};
use crate::models::config::{PdfConfig, RemitoConfig};
use crate::models::item::{ExtractedItem, ExtractionSource};
use crate::ocr::{OcrBackend, ProgressFn};
use crate::pdf::{self, PdfSource};

use super::pipeline::DeterministicParser;

/// Items extracted from a document, tagged with the path that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "items")]
pub enum ExtractionOutcome {
    #[serde(rename = "ai")]
    AiParsed(Vec<ExtractedItem>),
    #[serde(rename = "fallback")]
    FallbackParsed(Vec<ExtractedItem>),
}

impl ExtractionOutcome {
    pub fn source(&self) -> ExtractionSource {
        match self {
            Self::AiParsed(_) => ExtractionSource::Ai,
            Self::FallbackParsed(_) => ExtractionSource::Fallback,
        }
    }

    pub fn items(&self) -> &[ExtractedItem] {
        match self {
            Self::AiParsed(items) | Self::FallbackParsed(items) => items,
        }
    }

    pub fn into_items(self) -> Vec<ExtractedItem> {
        match self {
            Self::AiParsed(items) | Self::FallbackParsed(items) => items,
        }
    }
}

/// Extraction result with the recognized text, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    /// Text the items were parsed from (OCR output or embedded PDF text).
    pub raw_text: String,
    /// Extracted items and their source.
    pub outcome: ExtractionOutcome,
    /// Wall-clock time of the whole call.
    pub processing_time_ms: u64,
}

/// Runs OCR, then the AI parser when one is configured, falling back to the
/// deterministic parser when the AI call fails.
pub struct Extractor {
    parser: DeterministicParser,
    ai: Option<Arc<dyn AiParser>>,
    ocr: Option<Arc<dyn OcrBackend>>,
    pdf: PdfConfig,
    validate_ai_items: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(&RemitoConfig::default())
    }
}

impl Extractor {
    /// Extractor with no AI and no OCR backend.
    pub fn new(config: &RemitoConfig) -> Self {
        Self {
            parser: DeterministicParser::new(config.extraction.clone()),
            ai: None,
            ocr: None,
            pdf: config.pdf.clone(),
            validate_ai_items: config.extraction.validate_ai_items,
        }
    }

    /// Use an AI parser as the primary path.
    pub fn with_ai(mut self, ai: Arc<dyn AiParser>) -> Self {
        self.ai = Some(ai);
        self
    }

    /// Use an OCR backend for image inputs.
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrBackend>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    pub fn parser(&self) -> &DeterministicParser {
        &self.parser
    }

    /// Extract items from recognized text.
    ///
    /// With an AI parser, the document (when given) or the text is sent to
    /// it. Any AI failure is logged and answered by one deterministic parse
    /// of `raw_text`; this never fails.
    pub async fn extract(
        &self,
        raw_text: &str,
        document: Option<&DocumentInput>,
    ) -> ExtractionOutcome {
        let Some(ai) = &self.ai else {
            return ExtractionOutcome::FallbackParsed(self.parser.parse(raw_text));
        };

        let result = match document {
            Some(document) => ai.parse_document(document).await,
            None => ai.parse_text(raw_text).await,
        };

        match result {
            Ok(items) => {
                let items = if self.validate_ai_items {
                    let total = items.len();
                    let valid: Vec<_> = items.into_iter().filter(ExtractedItem::is_valid).collect();
                    if valid.len() < total {
                        debug!("Dropped {} out-of-bounds AI items", total - valid.len());
                    }
                    valid
                } else {
                    items
                };
                debug!("{} parsed {} items", ai.name(), items.len());
                ExtractionOutcome::AiParsed(items)
            }
            Err(e) => {
                warn!("{} parsing failed, using deterministic parser: {}", ai.name(), e);
                ExtractionOutcome::FallbackParsed(self.parser.parse(raw_text))
            }
        }
    }

    /// Extract items from text that needs no OCR.
    pub async fn extract_from_text(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        let start = Instant::now();
        let outcome = cancellable(cancel, async { Ok(self.extract(text, None).await) }).await?;
        Ok(self.report(text.to_string(), outcome, start))
    }

    /// OCR an image, then extract its items.
    ///
    /// OCR failure is an error; AI failure is not.
    pub async fn extract_from_image(
        &self,
        image: Vec<u8>,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        let start = Instant::now();
        let raw_text = cancellable(cancel, self.recognize(&image, progress)).await?;

        let document = DocumentInput::sniff(image);
        let outcome =
            cancellable(cancel, async { Ok(self.extract(&raw_text, Some(&document)).await) })
                .await?;

        Ok(self.report(raw_text, outcome, start))
    }

    /// Read a PDF (embedded text, or OCR of the first page image), then
    /// extract its items. The PDF itself is what the AI parser sees.
    pub async fn extract_from_pdf(
        &self,
        data: Vec<u8>,
        progress: Option<&ProgressFn>,
        cancel: &CancellationToken,
    ) -> Result<ExtractionReport> {
        let start = Instant::now();

        let raw_text = match pdf::prepare(&data, &self.pdf)? {
            PdfSource::Text(text) => {
                debug!("Using embedded PDF text ({} chars)", text.len());
                text
            }
            PdfSource::Scanned(image) => {
                debug!("Image-only PDF, running OCR on the first page");
                cancellable(cancel, self.recognize(&image, progress)).await?
            }
        };

        let document = DocumentInput::new(data, "application/pdf");
        let outcome =
            cancellable(cancel, async { Ok(self.extract(&raw_text, Some(&document)).await) })
                .await?;

        Ok(self.report(raw_text, outcome, start))
    }

    async fn recognize(&self, image: &[u8], progress: Option<&ProgressFn>) -> Result<String> {
        let ocr = self.ocr.as_ref().ok_or(OcrError::Unavailable)?;
        Ok(ocr.recognize(image, progress).await?)
    }

    fn report(&self, raw_text: String, outcome: ExtractionOutcome, start: Instant) -> ExtractionReport {
        let processing_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Extracted {} items via {} in {}ms",
            outcome.items().len(),
            outcome.source(),
            processing_time_ms
        );
        ExtractionReport {
            raw_text,
            outcome,
            processing_time_ms,
        }
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RemitoError::Cancelled),
        result = fut => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::parse_products_response;
    use crate::error::AiError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const TABLE: &str = "Cantidad | Producto\n| 2 | 114800436 | Amoxicilina 600mg |\n1 115770494 Diclofenaco 50mg\nFirma";

    /// AI parser answering with a fixed model text.
    struct ScriptedAi {
        answer: std::result::Result<String, u16>,
        documents: Mutex<Vec<String>>,
    }

    impl ScriptedAi {
        fn answering(text: &str) -> Arc<Self> {
            Arc::new(Self {
                answer: Ok(text.to_string()),
                documents: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                answer: Err(status),
                documents: Mutex::new(Vec::new()),
            })
        }

        fn respond(&self) -> std::result::Result<Vec<ExtractedItem>, AiError> {
            match &self.answer {
                Ok(text) => parse_products_response(text),
                Err(status) => Err(AiError::Status {
                    status: *status,
                    body: "unavailable".to_string(),
                }),
            }
        }
    }

    #[async_trait]
    impl AiParser for ScriptedAi {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn parse_text(&self, _text: &str) -> std::result::Result<Vec<ExtractedItem>, AiError> {
            self.respond()
        }

        async fn parse_document(
            &self,
            document: &DocumentInput,
        ) -> std::result::Result<Vec<ExtractedItem>, AiError> {
            self.documents.lock().unwrap().push(document.mime_type.clone());
            self.respond()
        }
    }

    struct FixedOcr(std::result::Result<&'static str, ()>);

    #[async_trait]
    impl OcrBackend for FixedOcr {
        async fn recognize(
            &self,
            _image: &[u8],
            progress: Option<&ProgressFn>,
        ) -> std::result::Result<String, OcrError> {
            if let Some(progress) = progress {
                progress("done", 100.0);
            }
            self.0
                .map(str::to_string)
                .map_err(|_| OcrError::Recognition("blurred".to_string()))
        }
    }

    fn deterministic(text: &str) -> Vec<ExtractedItem> {
        DeterministicParser::default().parse(text)
    }

    #[tokio::test]
    async fn test_no_ai_uses_deterministic_parser() {
        let outcome = Extractor::default().extract(TABLE, None).await;
        assert_eq!(outcome.source(), ExtractionSource::Fallback);
        assert_eq!(outcome.items(), deterministic(TABLE).as_slice());
        assert_eq!(outcome.items().len(), 2);
    }

    #[tokio::test]
    async fn test_ai_success() {
        let ai = ScriptedAi::answering(
            r#"{"products": [{"quantity": 4, "sku": "114800436", "description": "Amoxicilina"}]}"#,
        );
        let extractor = Extractor::default().with_ai(ai);
        let outcome = extractor.extract(TABLE, None).await;

        assert_eq!(
            outcome,
            ExtractionOutcome::AiParsed(vec![ExtractedItem::new(4, "114800436", "Amoxicilina")])
        );
    }

    #[tokio::test]
    async fn test_ai_transport_failure_falls_back() {
        let extractor = Extractor::default().with_ai(ScriptedAi::failing(503));
        let outcome = extractor.extract(TABLE, None).await;

        assert_eq!(outcome.source(), ExtractionSource::Fallback);
        assert_eq!(outcome.into_items(), deterministic(TABLE));
    }

    #[tokio::test]
    async fn test_ai_malformed_json_falls_back() {
        for answer in ["not json", r#"{"products": 3}"#, r#"{"other": []}"#] {
            let extractor = Extractor::default().with_ai(ScriptedAi::answering(answer));
            let outcome = extractor.extract(TABLE, None).await;
            assert_eq!(outcome.source(), ExtractionSource::Fallback, "answer {:?}", answer);
            assert_eq!(outcome.items(), deterministic(TABLE).as_slice());
        }
    }

    #[tokio::test]
    async fn test_ai_items_optionally_validated() {
        let answer = r#"{"products": [
            {"quantity": 1, "sku": "12", "description": "Corto"},
            {"quantity": 2, "sku": "114800436", "description": "Amoxicilina"}
        ]}"#;

        let outcome = Extractor::default()
            .with_ai(ScriptedAi::answering(answer))
            .extract("", None)
            .await;
        assert_eq!(outcome.items().len(), 2);

        let mut config = RemitoConfig::default();
        config.extraction.validate_ai_items = true;
        let outcome = Extractor::new(&config)
            .with_ai(ScriptedAi::answering(answer))
            .extract("", None)
            .await;
        assert_eq!(outcome.items().len(), 1);
        assert_eq!(outcome.items()[0].sku, "114800436");
    }

    #[tokio::test]
    async fn test_image_extraction_sends_document() {
        let ai = ScriptedAi::failing(500);
        let extractor = Extractor::default()
            .with_ai(ai.clone())
            .with_ocr(Arc::new(FixedOcr(Ok(TABLE))));

        let calls = Arc::new(Mutex::new(0));
        let progress_calls = Arc::clone(&calls);
        let progress = move |_: &str, _: f32| *progress_calls.lock().unwrap() += 1;
        let report = extractor
            .extract_from_image(vec![0x89, b'P', b'N', b'G'], Some(&progress), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.raw_text, TABLE);
        assert_eq!(report.outcome.source(), ExtractionSource::Fallback);
        assert_eq!(report.outcome.items().len(), 2);
        assert_eq!(*ai.documents.lock().unwrap(), vec!["image/png".to_string()]);
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ocr_failure_is_an_error() {
        let extractor = Extractor::default().with_ocr(Arc::new(FixedOcr(Err(()))));
        let result = extractor
            .extract_from_image(vec![1, 2, 3], None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RemitoError::Ocr(OcrError::Recognition(_)))));

        let result = Extractor::default()
            .extract_from_image(vec![1, 2, 3], None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RemitoError::Ocr(OcrError::Unavailable))));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let extractor = Extractor::default().with_ocr(Arc::new(FixedOcr(Ok(TABLE))));

        let result = extractor.extract_from_image(vec![1], None, &cancel).await;
        assert!(matches!(result, Err(RemitoError::Cancelled)));

        let result = extractor.extract_from_text(TABLE, &cancel).await;
        assert!(matches!(result, Err(RemitoError::Cancelled)));
    }

    #[tokio::test]
    async fn test_invalid_pdf_is_an_error() {
        let result = Extractor::default()
            .extract_from_pdf(b"garbage".to_vec(), None, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(RemitoError::Pdf(_))));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ExtractionOutcome::FallbackParsed(vec![]);
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({"source": "fallback", "items": []})
        );
    }
}
