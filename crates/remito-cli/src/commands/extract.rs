//! Extract command - digitise the product lines of a delivery note.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use remito_core::models::config::RemitoConfig;
use remito_core::models::item::ExtractedItem;
use remito_core::{
    ExtractionReport, Extractor, GeminiClient, JsonFileStore, PickingService, ProgressFn,
    PureOcrEngine,
};

use super::load_config;

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (image, PDF or OCR text)
    #[arg(required = true)]
    input: PathBuf,

    /// Treat the input as already-recognized text
    #[arg(long)]
    text: bool,

    /// Skip the AI backend and use only the deterministic parser
    #[arg(long)]
    no_ai: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Save the extracted items as a new delivery note
    #[arg(long)]
    save: bool,

    /// Include the recognized text in JSON output
    #[arg(long)]
    show_text: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per item
    Csv,
    /// Plain text table
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputKind {
    Text,
    Pdf,
    Image,
}

impl InputKind {
    fn detect(path: &Path, force_text: bool) -> anyhow::Result<Self> {
        if force_text {
            return Ok(Self::Text);
        }
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "txt" => Ok(Self::Text),
            "pdf" => Ok(Self::Pdf),
            "png" | "jpg" | "jpeg" | "webp" | "tiff" | "bmp" => Ok(Self::Image),
            _ => anyhow::bail!("Unsupported file format: {}", extension),
        }
    }
}

/// JSON shape of an extraction.
#[derive(Serialize)]
struct ExtractOutput<'a> {
    source: &'a str,
    items: &'a [ExtractedItem],
    processing_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    note_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_text: Option<&'a str>,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    let kind = InputKind::detect(&args.input, args.text)?;
    info!("Processing {:?} input: {}", kind, args.input.display());

    let extractor = build_extractor(&config, kind, args.no_ai)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")?
            .progress_chars("##-"),
    );
    let bar = pb.clone();
    let on_progress = move |status: &str, percent: f32| {
        bar.set_message(status.to_string());
        bar.set_position(percent.clamp(0.0, 100.0) as u64);
    };
    let progress: &ProgressFn = &on_progress;

    pb.set_message("Reading input...");
    let report = match kind {
        InputKind::Text => {
            let text = fs::read_to_string(&args.input)?;
            extractor.extract_from_text(&text, &cancel).await
        }
        InputKind::Pdf => {
            let data = fs::read(&args.input)?;
            extractor.extract_from_pdf(data, Some(progress), &cancel).await
        }
        InputKind::Image => {
            let data = fs::read(&args.input)?;
            extractor.extract_from_image(data, Some(progress), &cancel).await
        }
    };
    let report = match report {
        Ok(report) => report,
        Err(e) => {
            pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };
    pb.finish_and_clear();

    let note_id = if args.save {
        Some(save_note(&config, &args.input, &report).await?)
    } else {
        None
    };

    let output = format_report(&report, note_id.as_deref(), args.format, args.show_text)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if report.outcome.items().is_empty() {
        eprintln!("{} No product lines found", style("!").yellow());
    }
    if let Some(id) = &note_id {
        eprintln!("{} Saved delivery note {}", style("✓").green(), style(id).bold());
    }

    Ok(())
}

fn build_extractor(config: &RemitoConfig, kind: InputKind, no_ai: bool) -> anyhow::Result<Extractor> {
    let mut extractor = Extractor::new(config);

    if config.ai.enabled && !no_ai {
        match GeminiClient::from_config(&config.ai) {
            Ok(client) => extractor = extractor.with_ai(Arc::new(client)),
            Err(e) => warn!("AI backend unavailable, using deterministic parser only: {}", e),
        }
    }

    match kind {
        InputKind::Text => {}
        InputKind::Image => {
            let engine = PureOcrEngine::from_config(config.ocr.clone()).map_err(|e| {
                anyhow::anyhow!(
                    "{}\n\nPlace det.onnx, latin_rec.onnx and latin_dict.txt in {} \
                     or set ocr.model_dir with 'remito config set'.",
                    e,
                    config.ocr.model_dir.display()
                )
            })?;
            extractor = extractor.with_ocr(Arc::new(engine));
        }
        // Text PDFs need no OCR; scanned ones fail later if the models are missing.
        InputKind::Pdf => match PureOcrEngine::from_config(config.ocr.clone()) {
            Ok(engine) => extractor = extractor.with_ocr(Arc::new(engine)),
            Err(e) => debug!("OCR unavailable for PDF input: {}", e),
        },
    }

    Ok(extractor)
}

async fn save_note(
    config: &RemitoConfig,
    input: &Path,
    report: &ExtractionReport,
) -> anyhow::Result<String> {
    let store = JsonFileStore::open(&config.store.notes_dir).await?;
    let service = PickingService::new(store);
    let image_ref = input
        .canonicalize()
        .unwrap_or_else(|_| input.to_path_buf())
        .display()
        .to_string();
    Ok(service
        .create_note(report.outcome.items().to_vec(), Some(image_ref))
        .await?)
}

fn format_report(
    report: &ExtractionReport,
    note_id: Option<&str>,
    format: OutputFormat,
    show_text: bool,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let output = ExtractOutput {
                source: report.outcome.source().as_str(),
                items: report.outcome.items(),
                processing_time_ms: report.processing_time_ms,
                note_id,
                raw_text: show_text.then_some(report.raw_text.as_str()),
            };
            Ok(serde_json::to_string_pretty(&output)?)
        }
        OutputFormat::Csv => format_csv(report.outcome.items()),
        OutputFormat::Text => Ok(format_text(report)),
    }
}

fn format_csv(items: &[ExtractedItem]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["quantity_asked", "sku", "barcode", "description"])?;
    for item in items {
        wtr.write_record([
            item.quantity_asked.to_string(),
            item.sku.clone(),
            item.barcode.map(|b| b.to_string()).unwrap_or_default(),
            item.description.clone(),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}

fn format_text(report: &ExtractionReport) -> String {
    let items = report.outcome.items();
    let mut output = String::new();

    output.push_str(&format!(
        "{} items ({}), {}ms\n\n",
        items.len(),
        report.outcome.source(),
        report.processing_time_ms
    ));
    output.push_str(&format!("{:>5}  {:<16}  {}\n", "Cant.", "Código", "Descripción"));
    for item in items {
        output.push_str(&format!(
            "{:>5}  {:<16}  {}\n",
            item.quantity_asked, item.sku, item.description
        ));
    }

    output
}
