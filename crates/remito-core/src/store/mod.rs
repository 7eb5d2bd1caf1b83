//! Delivery-note persistence.

mod memory;
#[cfg(feature = "native")]
mod file;

pub use memory::MemoryNoteStore;
#[cfg(feature = "native")]
pub use file::JsonFileStore;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StoreError;
use crate::models::item::ExtractedItem;
use crate::models::note::{DeliveryNote, NoteStatus};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Storage of delivery notes.
///
/// Item-level updates address the item by code; with duplicate codes the
/// first line still missing units is updated.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Persist a digitised note and return its new identifier.
    async fn save_note(&self, items: Vec<ExtractedItem>, image_ref: Option<String>) -> Result<String>;

    /// Insert or replace a complete note.
    async fn put_note(&self, note: DeliveryNote) -> Result<()>;

    async fn get_note(&self, id: &str) -> Result<Option<DeliveryNote>>;

    /// All notes, newest first.
    async fn list_notes(&self) -> Result<Vec<DeliveryNote>>;

    async fn update_item_scanned_quantity(&self, id: &str, sku: &str, quantity: u32) -> Result<()>;

    async fn update_item_report(&self, id: &str, sku: &str, report: &str) -> Result<()>;

    async fn update_status(&self, id: &str, status: NoteStatus) -> Result<()>;
}

/// Note identifier for the given creation time, `ID_<unix millis>`.
///
/// `taken` is consulted to add a `_<n>` suffix on collision.
pub(crate) fn new_note_id(taken: impl Fn(&str) -> bool) -> String {
    let base = format!("ID_{}", Utc::now().timestamp_millis());
    if !taken(&base) {
        return base;
    }
    (1..)
        .map(|n| format!("{}_{}", base, n))
        .find(|id| !taken(id))
        .unwrap_or(base)
}

/// A new note for freshly extracted items.
pub(crate) fn new_note(id: String, items: Vec<ExtractedItem>, image_ref: Option<String>) -> DeliveryNote {
    let mut note = DeliveryNote::new(id, items);
    note.image_ref = image_ref;
    note
}

/// Apply `update` to the item addressed by `sku` and bump `updated_at`.
pub(crate) fn update_item(
    note: &mut DeliveryNote,
    sku: &str,
    update: impl FnOnce(&mut ExtractedItem),
) -> Result<()> {
    let idx = note
        .position_by_code(sku)
        .ok_or_else(|| StoreError::ItemNotFound {
            note_id: note.id.clone(),
            sku: sku.to_string(),
        })?;
    update(&mut note.items[idx]);
    note.updated_at = Utc::now();
    Ok(())
}

pub(crate) fn sort_newest_first(notes: &mut [DeliveryNote]) {
    notes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}
