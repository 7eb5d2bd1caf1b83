//! Pure Rust OCR engine wrapper using `pure-onnx-ocr`.
//!
//! The `pure-onnx-ocr` engine keeps per-thread plan caches and cannot leave
//! the thread that built it, so it lives on a dedicated worker thread and
//! callers talk to it over a channel.

use std::path::Path;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Instant;

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView};
use pure_onnx_ocr::engine::{OcrEngine, OcrEngineBuilder};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::config::OcrConfig;

use super::{boxes_to_text, OcrBackend, OcrResult, ProgressFn, TextBox};

struct Job {
    image: DynamicImage,
    reply: oneshot::Sender<Result<OcrResult, OcrError>>,
}

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// Cheap to share: it only holds the sending side of the worker's job queue.
/// The worker exits once the engine is dropped.
pub struct PureOcrEngine {
    jobs: mpsc::UnboundedSender<Job>,
}

impl PureOcrEngine {
    /// Create an engine from the model directory named in the config.
    pub fn from_config(config: OcrConfig) -> Result<Self, OcrError> {
        let model_dir = config.model_dir.clone();
        Self::from_dir(&model_dir, config)
    }

    /// Create an engine from model files in a directory.
    ///
    /// Blocks until the worker has loaded the models.
    pub fn from_dir(model_dir: &Path, config: OcrConfig) -> Result<Self, OcrError> {
        let det_path = model_dir.join("det.onnx");
        let rec_path = model_dir.join("latin_rec.onnx");
        let dict_path = model_dir.join("latin_dict.txt");

        for path in [&det_path, &rec_path, &dict_path] {
            if !path.exists() {
                return Err(OcrError::ModelLoad(format!(
                    "missing model file {}",
                    path.display()
                )));
            }
        }

        let (jobs, queue) = mpsc::unbounded_channel::<Job>();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), OcrError>>(1);

        let model_dir_display = model_dir.display().to_string();
        thread::Builder::new()
            .name("remito-ocr".to_string())
            .spawn(move || {
                let engine = OcrEngineBuilder::new()
                    .det_model_path(&det_path)
                    .rec_model_path(&rec_path)
                    .dictionary_path(&dict_path)
                    .build()
                    .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)));

                match engine {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        serve(engine, queue, &config);
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                    }
                }
            })
            .map_err(|e| OcrError::ModelLoad(format!("failed to start OCR worker: {}", e)))?;

        ready_rx
            .recv()
            .map_err(|_| OcrError::ModelLoad("OCR worker exited during startup".to_string()))??;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir_display);
        Ok(Self { jobs })
    }

    /// Run OCR on a decoded image.
    pub async fn process(&self, image: DynamicImage) -> Result<OcrResult, OcrError> {
        let (reply, result) = oneshot::channel();
        self.jobs
            .send(Job { image, reply })
            .map_err(|_| OcrError::Recognition("OCR worker stopped".to_string()))?;
        result
            .await
            .map_err(|_| OcrError::Recognition("OCR worker dropped the job".to_string()))?
    }
}

/// Worker loop: owns the engine until the job queue closes.
fn serve(engine: OcrEngine, mut queue: mpsc::UnboundedReceiver<Job>, config: &OcrConfig) {
    while let Some(job) = queue.blocking_recv() {
        let result = recognize_image(&engine, &job.image, config);
        // The caller may have been cancelled.
        let _ = job.reply.send(result);
    }
    debug!("OCR worker stopped");
}

fn recognize_image(
    engine: &OcrEngine,
    image: &DynamicImage,
    config: &OcrConfig,
) -> Result<OcrResult, OcrError> {
    let start = Instant::now();
    let (width, height) = image.dimensions();

    info!("Processing image: {}x{}", width, height);

    let results = engine
        .run_from_image(image)
        .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

    debug!("pure-onnx-ocr returned {} text regions", results.len());

    let boxes: Vec<TextBox> = results
        .iter()
        .map(|r| TextBox {
            bbox: polygon_to_bbox(&r.bounding_box),
            text: if config.keep_unk {
                r.text.clone()
            } else {
                r.text.replace("[UNK]", " ")
            },
            confidence: r.confidence,
        })
        .collect();

    let text = boxes_to_text(&boxes, config.row_tolerance);
    let processing_time_ms = start.elapsed().as_millis() as u64;

    info!(
        "OCR complete: {} text boxes, {} lines in {}ms",
        boxes.len(),
        text.lines().count(),
        processing_time_ms
    );

    Ok(OcrResult {
        boxes,
        text,
        processing_time_ms,
        image_size: (width, height),
    })
}

#[async_trait]
impl OcrBackend for PureOcrEngine {
    async fn recognize(
        &self,
        image: &[u8],
        progress: Option<&ProgressFn>,
    ) -> Result<String, OcrError> {
        let report = |status: &str, percent: f32| {
            if let Some(progress) = progress {
                progress(status, percent);
            }
        };

        report("loading image", 0.0);
        let decoded =
            image::load_from_memory(image).map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        report("recognizing text", 10.0);
        let result = self.process(decoded).await?;

        report("done", 100.0);
        Ok(result.text)
    }
}

/// Convert a `Polygon<f64>` to the `[f32; 8]` quadrilateral layout.
fn polygon_to_bbox(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 8] {
    let mut bbox = [0.0f32; 8];
    for (i, coord) in polygon.exterior().coords().take(4).enumerate() {
        bbox[i * 2] = coord.x as f32;
        bbox[i * 2 + 1] = coord.y as f32;
    }
    bbox
}
