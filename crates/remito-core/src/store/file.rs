use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::models::item::ExtractedItem;
use crate::models::note::{DeliveryNote, NoteStatus};

use super::{new_note, new_note_id, sort_newest_first, update_item, NoteStore, Result};

/// Note store keeping one pretty-printed JSON document per note.
pub struct JsonFileStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store in `dir`, creating the directory when needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!("Opened note store at {}", dir.display());
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn note_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read(&self, id: &str) -> Result<Option<DeliveryNote>> {
        match tokio::fs::read_to_string(self.note_path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, note: &DeliveryNote) -> Result<()> {
        let content = serde_json::to_string_pretty(note)?;
        tokio::fs::write(self.note_path(&note.id), content).await?;
        Ok(())
    }

    async fn modify(&self, id: &str, f: impl FnOnce(&mut DeliveryNote) -> Result<()> + Send) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut note = self
            .read(id)
            .await?
            .ok_or_else(|| StoreError::NoteNotFound(id.to_string()))?;
        f(&mut note)?;
        self.write(&note).await
    }
}

#[async_trait]
impl NoteStore for JsonFileStore {
    async fn save_note(&self, items: Vec<ExtractedItem>, image_ref: Option<String>) -> Result<String> {
        let _guard = self.write_lock.lock().await;
        let id = new_note_id(|id| self.note_path(id).exists());
        debug!("Saving note {} with {} items", id, items.len());
        self.write(&new_note(id.clone(), items, image_ref)).await?;
        Ok(id)
    }

    async fn put_note(&self, note: DeliveryNote) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(&note).await
    }

    async fn get_note(&self, id: &str) -> Result<Option<DeliveryNote>> {
        self.read(id).await
    }

    async fn list_notes(&self) -> Result<Vec<DeliveryNote>> {
        let mut notes = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<DeliveryNote>(&content) {
                Ok(note) => notes.push(note),
                Err(e) => warn!("Skipping unreadable note {}: {}", path.display(), e),
            }
        }

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
