//! Delivery note ("remito") models and picking counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::item::{ExtractedItem, ItemState};

/// Workflow status of a delivery note.
///
/// Stored as its number (`0..=3`) to stay compatible with existing documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum NoteStatus {
    /// Waiting to be picked.
    ToPrepare,
    /// Picking in progress.
    Preparing,
    /// All items picked.
    Ready,
    /// Picking finished with missing products.
    MissingProducts,
}

impl NoteStatus {
    /// All statuses in workflow order.
    pub const ALL: [NoteStatus; 4] = [
        NoteStatus::ToPrepare,
        NoteStatus::Preparing,
        NoteStatus::Ready,
        NoteStatus::MissingProducts,
    ];

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ToPrepare => "Por Preparar",
            Self::Preparing => "Preparando",
            Self::Ready => "Listo",
            Self::MissingProducts => "Faltan Productos",
        }
    }

    /// Parse a status from its number or a case-insensitive name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        if let Ok(n) = s.parse::<u8>() {
            return Self::try_from(n).ok();
        }
        match s.replace(['-', '_', ' '], "").as_str() {
            "toprepare" | "porpreparar" | "pending" => Some(Self::ToPrepare),
            "preparing" | "preparando" => Some(Self::Preparing),
            "ready" | "listo" => Some(Self::Ready),
            "missingproducts" | "faltanproductos" | "missing" => Some(Self::MissingProducts),
            _ => None,
        }
    }
}

impl From<NoteStatus> for u8 {
    fn from(status: NoteStatus) -> Self {
        match status {
            NoteStatus::ToPrepare => 0,
            NoteStatus::Preparing => 1,
            NoteStatus::Ready => 2,
            NoteStatus::MissingProducts => 3,
        }
    }
}

impl TryFrom<u8> for NoteStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::ToPrepare),
            1 => Ok(Self::Preparing),
            2 => Ok(Self::Ready),
            3 => Ok(Self::MissingProducts),
            other => Err(format!("unknown note status: {}", other)),
        }
    }
}

impl std::fmt::Display for NoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A delivery note with its product lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryNote {
    /// Document identifier.
    pub id: String,

    /// Order number shown to the picker.
    pub order_number: String,

    /// Workflow status.
    pub status: NoteStatus,

    /// Product lines.
    pub items: Vec<ExtractedItem>,

    /// Reference to the source image of a digitised note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl DeliveryNote {
    /// Create a note from extracted items.
    pub fn new(id: impl Into<String>, items: Vec<ExtractedItem>) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            order_number: id.clone(),
            id,
            status: NoteStatus::Preparing,
            items,
            image_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether barcode scans are accepted.
    pub fn can_scan(&self) -> bool {
        matches!(self.status, NoteStatus::ToPrepare | NoteStatus::Preparing)
    }

    /// Sum of requested quantities.
    pub fn total_asked(&self) -> u32 {
        self.items.iter().map(|i| i.quantity_asked).sum()
    }

    /// Sum of scanned quantities.
    pub fn total_scanned(&self) -> u32 {
        self.items.iter().map(|i| i.quantity_scanned).sum()
    }

    /// Picking progress, rounded to a whole percent.
    pub fn progress_percentage(&self) -> u32 {
        let asked = self.total_asked();
        if asked == 0 {
            return 0;
        }
        ((self.total_scanned() as f64 / asked as f64) * 100.0).round() as u32
    }

    /// Whether any item carries a problem report.
    pub fn has_reported_items(&self) -> bool {
        self.items.iter().any(|i| i.is_reported())
    }

    /// Whether the note can move to [`NoteStatus::Ready`].
    pub fn can_mark_ready(&self) -> bool {
        self.status != NoteStatus::Ready
            && self
                .items
                .iter()
                .all(|i| i.is_complete() || i.is_reported())
    }

    /// Find the item a scanned code refers to.
    ///
    /// With duplicate SKUs the first unfinished line wins, then the first line.
    pub fn find_item_by_code(&self, code: &str) -> Option<&ExtractedItem> {
        self.position_by_code(code).map(|idx| &self.items[idx])
    }

    pub(crate) fn position_by_code(&self, code: &str) -> Option<usize> {
        let mut first = None;
        for (idx, item) in self.items.iter().enumerate() {
            if item.matches_code(code) {
                if !item.is_complete() {
                    return Some(idx);
                }
                first.get_or_insert(idx);
            }
        }
        first
    }

    /// Items ordered for the picking screen.
    ///
    /// The last scanned SKU comes first, then partial, pending and complete
    /// items, ties broken by SKU.
    pub fn sorted_items(&self, last_scanned_sku: Option<&str>) -> Vec<&ExtractedItem> {
        let mut items: Vec<&ExtractedItem> = self.items.iter().collect();
        items.sort_by(|a, b| {
            let recent_a = last_scanned_sku.is_some_and(|s| a.sku == s);
            let recent_b = last_scanned_sku.is_some_and(|s| b.sku == s);
            recent_b
                .cmp(&recent_a)
                .then_with(|| scan_rank(a).cmp(&scan_rank(b)))
                .then_with(|| a.sku.cmp(&b.sku))
        });
        items
    }
}

fn scan_rank(item: &ExtractedItem) -> u8 {
    if item.quantity_scanned == 0 {
        1
    } else if item.quantity_scanned < item.quantity_asked {
        0
    } else {
        2
    }
}

/// Kind of problem reported for an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Missing,
    Damaged,
    Expired,
    Other,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Damaged => "damaged",
            Self::Expired => "expired",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "missing" | "faltante" => Some(Self::Missing),
            "damaged" | "dañado" | "danado" => Some(Self::Damaged),
            "expired" | "vencido" => Some(Self::Expired),
            "other" | "otro" => Some(Self::Other),
            _ => None,
        }
    }
}

/// A problem report for one item of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductReport {
    pub note_id: String,
    pub sku: String,
    pub report_type: ReportType,
    pub description: String,
}

impl ProductReport {
    /// Text stored in the item's `reporte` field.
    pub fn annotation(&self) -> String {
        format!("{}: {}", self.report_type.as_str(), self.description.trim())
    }
}

/// Result of scanning a code against a note.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    /// One more unit was confirmed.
    Scanned {
        /// The item after the update.
        item: ExtractedItem,
        /// Whether the note moved from `ToPrepare` to `Preparing`.
        status_changed: bool,
    },
    /// The code does not belong to this note.
    NotInNote { code: String },
    /// The item already has every requested unit scanned.
    AlreadyComplete { item: ExtractedItem },
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Scanned { .. })
    }

    /// Message shown to the picker.
    pub fn message(&self) -> String {
        match self {
            Self::Scanned {
                item,
                status_changed: true,
            } => format!(
                "Producto escaneado: {}. Estado cambiado a \"{}\".",
                item.description,
                NoteStatus::Preparing.label()
            ),
            Self::Scanned { item, .. } => format!("Producto escaneado: {}", item.description),
            Self::NotInNote { .. } => "Producto no encontrado en esta nota de entrega".to_string(),
            Self::AlreadyComplete { .. } => {
                "Ya se escaneó la cantidad requerida de este producto".to_string()
            }
        }
    }
}

/// Number of notes in one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusCount {
    pub status: NoteStatus,
    pub label: &'static str,
    pub count: usize,
}

/// Count notes per status, one entry per status in workflow order.
pub fn status_summary(notes: &[DeliveryNote]) -> Vec<StatusCount> {
    NoteStatus::ALL
        .iter()
        .map(|&status| StatusCount {
            status,
            label: status.label(),
            count: notes.iter().filter(|n| n.status == status).count(),
        })
        .collect()
}

/// Count items per picking state.
pub fn item_state_counts(note: &DeliveryNote) -> [(ItemState, usize); 4] {
    let count = |state| note.items.iter().filter(|i| i.state() == state).count();
    [
        (ItemState::Pending, count(ItemState::Pending)),
        (ItemState::Partial, count(ItemState::Partial)),
        (ItemState::Complete, count(ItemState::Complete)),
        (ItemState::Reported, count(ItemState::Reported)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note() -> DeliveryNote {
        let mut a = ExtractedItem::new(2, "114800436", "Amoxicilina");
        a.quantity_scanned = 1;
        let b = ExtractedItem::new(1, "115770494", "Diclofenaco");
        let mut c = ExtractedItem::new(1, "114800001", "Ibuprofeno");
        c.quantity_scanned = 1;
        DeliveryNote::new("ID_1", vec![b, c, a])
    }

    #[test]
    fn test_status_serializes_as_number() {
        assert_eq!(serde_json::to_string(&NoteStatus::Ready).unwrap(), "2");
        let status: NoteStatus = serde_json::from_str("3").unwrap();
        assert_eq!(status, NoteStatus::MissingProducts);
        assert!(serde_json::from_str::<NoteStatus>("7").is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(NoteStatus::parse("0"), Some(NoteStatus::ToPrepare));
        assert_eq!(NoteStatus::parse("Listo"), Some(NoteStatus::Ready));
        assert_eq!(NoteStatus::parse("missing-products"), Some(NoteStatus::MissingProducts));
        assert_eq!(NoteStatus::parse("bogus"), None);
    }

    #[test]
    fn test_progress() {
        let note = note();
        assert_eq!(note.total_asked(), 4);
        assert_eq!(note.total_scanned(), 2);
        assert_eq!(note.progress_percentage(), 50);
        assert_eq!(DeliveryNote::new("x", vec![]).progress_percentage(), 0);
    }

    #[test]
    fn test_can_mark_ready() {
        let mut note = note();
        assert!(!note.can_mark_ready());
        note.items[0].reporte = "missing: sin stock".to_string();
        note.items[2].quantity_scanned = 2;
        assert!(note.can_mark_ready());
        note.status = NoteStatus::Ready;
        assert!(!note.can_mark_ready());
    }

    #[test]
    fn test_sorted_items() {
        let note = note();
        let skus: Vec<&str> = note.sorted_items(None).iter().map(|i| i.sku.as_str()).collect();
        assert_eq!(skus, vec!["114800436", "115770494", "114800001"]);

        let skus: Vec<&str> = note
            .sorted_items(Some("114800001"))
            .iter()
            .map(|i| i.sku.as_str())
            .collect();
        assert_eq!(skus, vec!["114800001", "114800436", "115770494"]);
    }

    #[test]
    fn test_find_item_prefers_unfinished_duplicate() {
        let mut done = ExtractedItem::new(1, "114800436", "Amoxicilina");
        done.quantity_scanned = 1;
        let open = ExtractedItem::new(3, "114800436", "Amoxicilina");
        let note = DeliveryNote::new("ID_2", vec![done, open]);
        assert_eq!(note.find_item_by_code("114800436").unwrap().quantity_asked, 3);
    }

    #[test]
    fn test_status_summary() {
        let mut ready = note();
        ready.status = NoteStatus::Ready;
        let summary = status_summary(&[note(), note(), ready]);
        assert_eq!(summary.len(), 4);
        assert_eq!(summary[1].count, 2);
        assert_eq!(summary[2].count, 1);
        assert_eq!(summary[0].label, "Por Preparar");
    }

    #[test]
    fn test_report_annotation() {
        let report = ProductReport {
            note_id: "ID_1".to_string(),
            sku: "114800436".to_string(),
            report_type: ReportType::Damaged,
            description: " caja rota ".to_string(),
        };
        assert_eq!(report.annotation(), "damaged: caja rota");
    }
}
