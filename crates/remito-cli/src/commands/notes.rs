//! Notes command - inspect and pick saved delivery notes.

use clap::{Args, Subcommand};
use console::style;

use remito_core::models::item::ItemState;
use remito_core::models::note::item_state_counts;
use remito_core::{
    DeliveryNote, JsonFileStore, NoteStatus, PickingService, ProductReport, ReportType,
    ScanOutcome,
};

use super::load_config;

/// Arguments for the notes command.
#[derive(Args)]
pub struct NotesArgs {
    #[command(subcommand)]
    command: NotesCommand,
}

#[derive(Subcommand)]
enum NotesCommand {
    /// List saved notes, newest first
    List,

    /// Show the items of a note in picking order
    Show {
        /// Note identifier
        id: String,

        /// SKU scanned last, listed first
        #[arg(long)]
        last: Option<String>,

        /// Print the note as JSON
        #[arg(long)]
        json: bool,
    },

    /// Register one scanned unit
    Scan {
        /// Note identifier
        id: String,
        /// Scanned barcode or SKU
        code: String,
    },

    /// Add one unit by hand
    Inc {
        /// Note identifier
        id: String,
        /// Item SKU
        sku: String,
    },

    /// Remove one unit by hand
    Dec {
        /// Note identifier
        id: String,
        /// Item SKU
        sku: String,
    },

    /// Set the scanned quantity of an item
    Set {
        /// Note identifier
        id: String,
        /// Item SKU
        sku: String,
        /// Scanned quantity
        quantity: u32,
    },

    /// Report a problem with an item
    Report {
        /// Note identifier
        id: String,
        /// Item SKU
        sku: String,
        /// missing, damaged, expired or other
        #[arg(value_parser = parse_report_type)]
        report_type: ReportType,
        /// Free-text description
        #[arg(default_value = "")]
        description: String,
    },

    /// Change the status of a note
    Status {
        /// Note identifier
        id: String,
        /// Status name or number (0-3)
        #[arg(value_parser = parse_status)]
        status: NoteStatus,
    },

    /// Count notes per status
    Summary,
}

fn parse_report_type(s: &str) -> Result<ReportType, String> {
    ReportType::parse(s).ok_or_else(|| format!("unknown report type: {}", s))
}

fn parse_status(s: &str) -> Result<NoteStatus, String> {
    NoteStatus::parse(s).ok_or_else(|| format!("unknown status: {}", s))
}

pub async fn run(args: NotesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = JsonFileStore::open(&config.store.notes_dir).await?;
    let service = PickingService::new(store);

    match args.command {
        NotesCommand::List => {
            let notes = service.list_notes().await?;
            if notes.is_empty() {
                println!("No delivery notes in {}", config.store.notes_dir.display());
            }
            for note in &notes {
                println!(
                    "{:<20} {:<18} {:>3}%  {:>3} items  {}",
                    note.id,
                    status_style(note.status),
                    note.progress_percentage(),
                    note.items.len(),
                    note.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        NotesCommand::Show { id, last, json } => {
            let note = service.note(&id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&note)?);
            } else {
                print_note(&note, last.as_deref());
            }
        }
        NotesCommand::Scan { id, code } => {
            let outcome = service.scan_barcode(&id, &code).await?;
            match &outcome {
                ScanOutcome::Scanned { item, .. } => println!(
                    "{} {} ({}/{})",
                    style("✓").green(),
                    outcome.message(),
                    item.quantity_scanned,
                    item.quantity_asked
                ),
                _ => println!("{} {}", style("!").yellow(), outcome.message()),
            }
        }
        NotesCommand::Inc { id, sku } => {
            let item = service.increase_quantity(&id, &sku).await?;
            print_quantity(&item.sku, item.quantity_scanned, item.quantity_asked);
        }
        NotesCommand::Dec { id, sku } => {
            let item = service.decrease_quantity(&id, &sku).await?;
            print_quantity(&item.sku, item.quantity_scanned, item.quantity_asked);
        }
        NotesCommand::Set { id, sku, quantity } => {
            let item = service.set_quantity(&id, &sku, quantity).await?;
            print_quantity(&item.sku, item.quantity_scanned, item.quantity_asked);
        }
        NotesCommand::Report {
            id,
            sku,
            report_type,
            description,
        } => {
            let report = ProductReport {
                note_id: id,
                sku,
                report_type,
                description,
            };
            service.report_item(&report).await?;
            println!(
                "{} Reported {}: {}",
                style("✓").green(),
                report.sku,
                report.annotation()
            );
        }
        NotesCommand::Status { id, status } => {
            service.update_status(&id, status).await?;
            println!("{} {} is now {}", style("✓").green(), id, status_style(status));
        }
        NotesCommand::Summary => {
            for entry in service.summary().await? {
                println!("{:<18} {}", status_style(entry.status), entry.count);
            }
        }
    }

    Ok(())
}

fn print_note(note: &DeliveryNote, last_scanned: Option<&str>) {
    println!(
        "{} {}  {}  {}%  ({}/{} units)",
        style("Remito").bold(),
        style(&note.order_number).bold(),
        status_style(note.status),
        note.progress_percentage(),
        note.total_scanned(),
        note.total_asked()
    );

    let counts: Vec<String> = item_state_counts(note)
        .iter()
        .filter(|(_, n)| *n > 0)
        .map(|(state, n)| format!("{} {}", n, state.label()))
        .collect();
    if !counts.is_empty() {
        println!("{}", counts.join(", "));
    }
    println!();

    for item in note.sorted_items(last_scanned) {
        let state = match item.state() {
            ItemState::Complete => style(item.state().label()).green(),
            ItemState::Partial => style(item.state().label()).yellow(),
            ItemState::Reported => style(item.state().label()).red(),
            ItemState::Pending => style(item.state().label()).dim(),
        };
        println!(
            "{:>3}/{:<3} {:<16} {:<11} {}",
            item.quantity_scanned, item.quantity_asked, item.sku, state, item.description
        );
        if item.is_reported() {
            println!("{:>8} {}", "", style(&item.reporte).italic());
        }
    }
}

fn print_quantity(sku: &str, scanned: u32, asked: u32) {
    println!("{} {}: {}/{}", style("✓").green(), sku, scanned, asked);
}

fn status_style(status: NoteStatus) -> console::StyledObject<&'static str> {
    let label = status.label();
    match status {
        NoteStatus::ToPrepare => style(label).cyan(),
        NoteStatus::Preparing => style(label).yellow(),
        NoteStatus::Ready => style(label).green(),
        NoteStatus::MissingProducts => style(label).red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_status("2"), Ok(NoteStatus::Ready));
        assert_eq!(parse_status("preparando"), Ok(NoteStatus::Preparing));
        assert!(parse_status("done").is_err());
        assert_eq!(parse_report_type("Vencido"), Ok(ReportType::Expired));
        assert!(parse_report_type("lost").is_err());
    }
}
