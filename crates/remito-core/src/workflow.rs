//! Picking workflow over a note store: barcode scans, manual quantity
//! adjustments, problem reports and status changes.

use tracing::{debug, info};

use crate::error::{Result, StoreError, WorkflowError};
use crate::models::item::ExtractedItem;
use crate::models::note::{status_summary, DeliveryNote, NoteStatus, ProductReport, ScanOutcome, StatusCount};
use crate::store::NoteStore;

/// Picking operations on delivery notes held by a [`NoteStore`].
pub struct PickingService<S> {
    store: S,
}

impl<S: NoteStore> PickingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persist a digitised note. New notes start in `Preparing`.
    pub async fn create_note(&self, items: Vec<ExtractedItem>, image_ref: Option<String>) -> Result<String> {
        let id = self.store.save_note(items, image_ref).await?;
        info!("Created delivery note {}", id);
        Ok(id)
    }

    /// Load a note, failing when it does not exist.
    pub async fn note(&self, id: &str) -> Result<DeliveryNote> {
        Ok(self
            .store
            .get_note(id)
            .await?
            .ok_or_else(|| StoreError::NoteNotFound(id.to_string()))?)
    }

    pub async fn list_notes(&self) -> Result<Vec<DeliveryNote>> {
        Ok(self.store.list_notes().await?)
    }

    /// Register one scanned unit of the item matching `code`.
    ///
    /// The first scan of a `ToPrepare` note moves it to `Preparing`.
    pub async fn scan_barcode(&self, note_id: &str, code: &str) -> Result<ScanOutcome> {
        let note = self.note(note_id).await?;
        if !note.can_scan() {
            return Err(WorkflowError::ScanNotAllowed(note_id.to_string()).into());
        }

        let Some(idx) = note.position_by_code(code) else {
            debug!("Code {} not in note {}", code, note_id);
            return Ok(ScanOutcome::NotInNote {
                code: code.to_string(),
            });
        };

        let mut item = note.items[idx].clone();
        if item.is_complete() {
            return Ok(ScanOutcome::AlreadyComplete { item });
        }

        item.quantity_scanned = (item.quantity_scanned + 1).min(item.quantity_asked);
        self.store
            .update_item_scanned_quantity(note_id, &item.sku, item.quantity_scanned)
            .await?;

        let status_changed = note.status == NoteStatus::ToPrepare;
        if status_changed {
            self.store.update_status(note_id, NoteStatus::Preparing).await?;
            info!("Delivery note {} is now {}", note_id, NoteStatus::Preparing);
        }

        debug!(
            "Scanned {} in {}: {}/{}",
            item.sku, note_id, item.quantity_scanned, item.quantity_asked
        );
        Ok(ScanOutcome::Scanned {
            item,
            status_changed,
        })
    }

    /// Add one unit by hand; refused once the requested quantity is reached.
    pub async fn increase_quantity(&self, note_id: &str, sku: &str) -> Result<ExtractedItem> {
        let item = self.item(note_id, sku).await?;
        if item.quantity_scanned >= item.quantity_asked {
            return Err(WorkflowError::AboveRequested {
                sku: item.sku,
                asked: item.quantity_asked,
            }
            .into());
        }
        self.write_quantity(note_id, item, |q| q + 1).await
    }

    /// Remove one unit by hand; refused when it would drop below one.
    pub async fn decrease_quantity(&self, note_id: &str, sku: &str) -> Result<ExtractedItem> {
        let item = self.item(note_id, sku).await?;
        if item.quantity_scanned <= 1 {
            return Err(WorkflowError::BelowMinimum { sku: item.sku }.into());
        }
        self.write_quantity(note_id, item, |q| q - 1).await
    }

    /// Set the scanned quantity directly, up to the requested quantity.
    pub async fn set_quantity(&self, note_id: &str, sku: &str, quantity: u32) -> Result<ExtractedItem> {
        let item = self.item(note_id, sku).await?;
        if quantity > item.quantity_asked {
            return Err(WorkflowError::AboveRequested {
                sku: item.sku,
                asked: item.quantity_asked,
            }
            .into());
        }
        self.write_quantity(note_id, item, |_| quantity).await
    }

    /// Attach a problem report to an item.
    pub async fn report_item(&self, report: &ProductReport) -> Result<()> {
        let annotation = report.annotation();
        self.store
            .update_item_report(&report.note_id, &report.sku, &annotation)
            .await?;
        info!(
            "Reported {} in {}: {}",
            report.sku, report.note_id, annotation
        );
        Ok(())
    }

    /// Change the status of a note. Moving to `Ready` requires every item
    /// to be complete or reported.
    pub async fn update_status(&self, note_id: &str, status: NoteStatus) -> Result<()> {
        let note = self.note(note_id).await?;
        if status == NoteStatus::Ready && !note.can_mark_ready() {
            return Err(WorkflowError::NotReady(note_id.to_string()).into());
        }
        self.store.update_status(note_id, status).await?;
        info!("Delivery note {} is now {}", note_id, status);
        Ok(())
    }

    /// Number of notes per status.
    pub async fn summary(&self) -> Result<Vec<StatusCount>> {
        Ok(status_summary(&self.store.list_notes().await?))
    }

    async fn item(&self, note_id: &str, sku: &str) -> Result<ExtractedItem> {
        let note = self.note(note_id).await?;
        let idx = note
            .position_by_code(sku)
            .ok_or_else(|| StoreError::ItemNotFound {
                note_id: note_id.to_string(),
                sku: sku.to_string(),
            })?;
        Ok(note.items[idx].clone())
    }

    async fn write_quantity(
        &self,
        note_id: &str,
        mut item: ExtractedItem,
        f: impl FnOnce(u32) -> u32,
    ) -> Result<ExtractedItem> {
        item.quantity_scanned = f(item.quantity_scanned);
        self.store
            .update_item_scanned_quantity(note_id, &item.sku, item.quantity_scanned)
            .await?;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemitoError;
    use crate::models::note::ReportType;
    use crate::store::MemoryNoteStore;
    use pretty_assertions::assert_eq;

    async fn service_with(status: NoteStatus) -> (PickingService<MemoryNoteStore>, String) {
        let store = MemoryNoteStore::new();
        let mut note = DeliveryNote::new(
            "ID_1",
            vec![
                ExtractedItem::new(2, "114800436", "Amoxicilina"),
                ExtractedItem::new(1, "115770494", "Diclofenaco"),
            ],
        );
        note.status = status;
        store.put_note(note).await.unwrap();
        (PickingService::new(store), "ID_1".to_string())
    }

    #[tokio::test]
    async fn test_first_scan_starts_preparation() {
        let (service, id) = service_with(NoteStatus::ToPrepare).await;

        let outcome = service.scan_barcode(&id, "114800436").await.unwrap();
        let ScanOutcome::Scanned { item, status_changed } = outcome else {
            panic!("expected a scan");
        };
        assert_eq!(item.quantity_scanned, 1);
        assert!(status_changed);
        assert_eq!(service.note(&id).await.unwrap().status, NoteStatus::Preparing);

        let outcome = service.scan_barcode(&id, "114800436").await.unwrap();
        assert!(matches!(
            outcome,
            ScanOutcome::Scanned { status_changed: false, .. }
        ));
    }

    #[tokio::test]
    async fn test_scan_complete_and_unknown() {
        let (service, id) = service_with(NoteStatus::Preparing).await;

        assert!(service.scan_barcode(&id, "115770494").await.unwrap().is_success());
        assert!(matches!(
            service.scan_barcode(&id, "115770494").await.unwrap(),
            ScanOutcome::AlreadyComplete { .. }
        ));
        assert_eq!(
            service.scan_barcode(&id, "7790000000").await.unwrap(),
            ScanOutcome::NotInNote {
                code: "7790000000".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_scan_refused_when_ready() {
        let (service, id) = service_with(NoteStatus::Ready).await;
        let err = service.scan_barcode(&id, "114800436").await.unwrap_err();
        assert!(matches!(
            err,
            RemitoError::Workflow(WorkflowError::ScanNotAllowed(_))
        ));
    }

    #[tokio::test]
    async fn test_manual_quantity_bounds() {
        let (service, id) = service_with(NoteStatus::Preparing).await;

        let err = service.decrease_quantity(&id, "114800436").await.unwrap_err();
        assert!(matches!(err, RemitoError::Workflow(WorkflowError::BelowMinimum { .. })));

        assert_eq!(service.increase_quantity(&id, "114800436").await.unwrap().quantity_scanned, 1);
        assert_eq!(service.increase_quantity(&id, "114800436").await.unwrap().quantity_scanned, 2);
        let err = service.increase_quantity(&id, "114800436").await.unwrap_err();
        assert!(matches!(
            err,
            RemitoError::Workflow(WorkflowError::AboveRequested { asked: 2, .. })
        ));

        assert_eq!(service.decrease_quantity(&id, "114800436").await.unwrap().quantity_scanned, 1);
        assert!(service.set_quantity(&id, "114800436", 3).await.is_err());
        assert_eq!(service.set_quantity(&id, "114800436", 0).await.unwrap().quantity_scanned, 0);
    }

    #[tokio::test]
    async fn test_report_then_mark_ready() {
        let (service, id) = service_with(NoteStatus::Preparing).await;

        let err = service.update_status(&id, NoteStatus::Ready).await.unwrap_err();
        assert!(matches!(err, RemitoError::Workflow(WorkflowError::NotReady(_))));

        service.set_quantity(&id, "114800436", 2).await.unwrap();
        service
            .report_item(&ProductReport {
                note_id: id.clone(),
                sku: "115770494".to_string(),
                report_type: ReportType::Missing,
                description: " sin stock ".to_string(),
            })
            .await
            .unwrap();

        let note = service.note(&id).await.unwrap();
        assert_eq!(note.items[1].reporte, "missing: sin stock");
        assert!(note.has_reported_items());
        assert!(note.can_mark_ready());

        service.update_status(&id, NoteStatus::Ready).await.unwrap();
        assert_eq!(service.note(&id).await.unwrap().status, NoteStatus::Ready);
    }

    #[tokio::test]
    async fn test_create_and_summarize() {
        let service = PickingService::new(MemoryNoteStore::new());
        service
            .create_note(vec![ExtractedItem::new(1, "114800436", "Amoxicilina")], None)
            .await
            .unwrap();

        let summary = service.summary().await.unwrap();
        let preparing = summary
            .iter()
            .find(|c| c.status == NoteStatus::Preparing)
            .unwrap();
        assert_eq!(preparing.count, 1);
        assert_eq!(preparing.label, "Preparando");
        assert_eq!(summary.len(), 4);
    }

    #[tokio::test]
    async fn test_missing_note() {
        let service = PickingService::new(MemoryNoteStore::new());
        let err = service.scan_barcode("nope", "114800436").await.unwrap_err();
        assert!(matches!(err, RemitoError::Store(StoreError::NoteNotFound(_))));
    }
}
