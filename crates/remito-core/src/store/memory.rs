use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;
use crate::models::item::ExtractedItem;
use crate::models::note::{DeliveryNote, NoteStatus};

use super::{new_note, new_note_id, sort_newest_first, update_item, NoteStore, Result};

/// In-memory note store.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: RwLock<HashMap<String, DeliveryNote>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn modify(
        &self,
        id: &str,
        f: impl FnOnce(&mut DeliveryNote) -> Result<()> + Send,
    ) -> Result<()> {
        let mut notes = self.notes.write().await;
        let note = notes
            .get_mut(id)
            .ok_or_else(|| StoreError::NoteNotFound(id.to_string()))?;
        f(note)
    }
}

#[async_trait]
impl NoteStore for MemoryNoteStore {
    async fn save_note(&self, items: Vec<ExtractedItem>, image_ref: Option<String>) -> Result<String> {
        let mut notes = self.notes.write().await;
        let id = new_note_id(|id| notes.contains_key(id));
        debug!("Saving note {} with {} items", id, items.len());
        notes.insert(id.clone(), new_note(id.clone(), items, image_ref));
        Ok(id)
    }

    async fn put_note(&self, note: DeliveryNote) -> Result<()> {
        self.notes.write().await.insert(note.id.clone(), note);
        Ok(())
    }

    async fn get_note(&self, id: &str) -> Result<Option<DeliveryNote>> {
        Ok(self.notes.read().await.get(id).cloned())
    }

    async fn list_notes(&self) -> Result<Vec<DeliveryNote>> {
        let mut notes: Vec<_> = self.notes.read().await.values().cloned().collect();
        sort_newest_first(&mut notes);
        Ok(notes)
    }

    async fn update_item_scanned_quantity(&self, id: &str, sku: &str, quantity: u32) -> Result<()> {
        self.modify(id, |note| {
            update_item(note, sku, |item| item.quantity_scanned = quantity)
        })
        .await
    }

    async fn update_item_report(&self, id: &str, sku: &str, report: &str) -> Result<()> {
        self.modify(id, |note| {
            update_item(note, sku, |item| item.reporte = report.to_string())
        })
        .await
    }

    async fn update_status(&self, id: &str, status: NoteStatus) -> Result<()> {
        self.modify(id, |note| {
            note.status = status;
            note.updated_at = Utc::now();
            Ok(())
        })
        .await
    }
}
