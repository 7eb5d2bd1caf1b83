//! Final validation and description cleanup of parsed triples.

use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::item::{ExtractedItem, ParsedTriple};

use super::patterns::{FUSED_WORDS, PHRASE_FIXES, SUFFIX_RULES, WHITESPACE_RUN};

const MAX_SUFFIX_PASSES: usize = 8;

/// Turns parsed triples into emitted items.
#[derive(Debug, Clone, Default)]
pub struct ItemCleaner {
    config: ExtractionConfig,
}

impl ItemCleaner {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Validate and clean triples, in input order.
    ///
    /// Triples outside the quantity/SKU/description bounds are dropped, as
    /// are items whose description is empty once cleaned.
    pub fn finalize(&self, triples: Vec<ParsedTriple>) -> Vec<ExtractedItem> {
        let total = triples.len();
        let items: Vec<ExtractedItem> = triples
            .into_iter()
            .filter(ParsedTriple::is_within_bounds)
            .filter_map(|triple| {
                let description = self.clean_description(&triple.description);
                if description.is_empty() {
                    return None;
                }
                Some(ExtractedItem::new(
                    triple.quantity,
                    triple.sku.trim(),
                    description,
                ))
            })
            .collect();

        if items.len() < total {
            debug!("Dropped {} of {} parsed lines", total - items.len(), total);
        }
        items
    }

    /// Strip trailing noise and repair OCR word breaks in a description.
    pub fn clean_description(&self, description: &str) -> String {
        let mut text = strip_suffixes(description.trim());

        if self.config.split_fused_words {
            text = FUSED_WORDS.replace_all(&text, "$1 $2").into_owned();
        }
        if self.config.apply_phrase_fixes {
            for fix in PHRASE_FIXES.iter() {
                text = fix.apply(&text);
            }
        }

        WHITESPACE_RUN.replace_all(&text, " ").trim().to_string()
    }
}

/// Validate and clean triples with the default settings.
pub fn finalize(triples: Vec<ParsedTriple>) -> Vec<ExtractedItem> {
    ItemCleaner::default().finalize(triples)
}

fn strip_suffixes(description: &str) -> String {
    let mut text = description.to_string();
    for _ in 0..MAX_SUFFIX_PASSES {
        let mut next = text.clone();
        for rule in SUFFIX_RULES.iter() {
            next = rule.apply(&next);
        }
        let next = next.trim().to_string();
        if next == text {
            break;
        }
        text = next;
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn clean(description: &str) -> String {
        ItemCleaner::default().clean_description(description)
    }

    #[test]
    fn test_batch_and_expiry_stripped() {
        assert_eq!(
            clean("Amoxicilina 600mg L. LOTE123 Vto.:05/2026"),
            "Amoxicilina 600mg"
        );
        assert_eq!(clean("Diclofenaco 50mg Venc. 05/26"), "Diclofenaco 50mg");
        assert_eq!(clean("Gasas estériles Lote 7781A"), "Gasas estériles");
    }

    #[test]
    fn test_trailing_noise_to_fixed_point() {
        assert_eq!(clean("Amoxicilina 600mg | 12,50 |"), "Amoxicilina 600mg");
        assert_eq!(clean("Ibuprofeno 400 ;. d"), "Ibuprofeno 400");
        assert_eq!(clean("Paracetamol 500 aÂ»"), "Paracetamol 500");
    }

    #[test]
    fn test_meaningful_endings_kept() {
        assert_eq!(clean("Vitamina C"), "Vitamina C");
        assert_eq!(clean("Jarabe 60mL"), "Jarabe 60mL");
        assert_eq!(clean("Crema Lotion"), "Crema Lotion");
    }

    #[test]
    fn test_fused_words_split() {
        assert_eq!(clean("ClavutanZoriak 875"), "Clavutan Zoriak 875");

        let cleaner = ItemCleaner::new(ExtractionConfig {
            split_fused_words: false,
            ..ExtractionConfig::default()
        });
        assert_eq!(cleaner.clean_description("ClavutanZoriak"), "ClavutanZoriak");
    }

    #[test]
    fn test_phrase_fixes() {
        assert_eq!(
            clean("Amoxi cilina + acido clavulanico susp. oral"),
            "Amoxicilina + Ácido Clavulánico Suspensión oral"
        );
    }

    #[test]
    fn test_finalize_maps_fields() {
        let items = finalize(vec![ParsedTriple::new(2, " 114800436 ", "Amoxicilina 600mg")]);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.quantity_asked, 2);
        assert_eq!(item.quantity_scanned, 0);
        assert_eq!(item.sku, "114800436");
        assert_eq!(item.barcode, Some(114800436));
        assert_eq!(item.description, "Amoxicilina 600mg");
        assert!(item.image.is_empty());
        assert!(item.reporte.is_empty());
    }

    #[test]
    fn test_finalize_drops_each_bound_violation() {
        let triples = vec![
            ParsedTriple::new(0, "114800436", "Amoxicilina"),
            ParsedTriple::new(1000, "114800436", "Amoxicilina"),
            ParsedTriple::new(2, "1148004", "Amoxicilina"),
            ParsedTriple::new(2, "1148004361148004", "Amoxicilina"),
            ParsedTriple::new(2, "114800436", "Ax"),
            ParsedTriple::new(2, "114800436", " | ;; "),
        ];
        assert!(finalize(triples).is_empty());
    }

    #[test]
    fn test_finalize_keeps_duplicates_and_order() {
        let items = finalize(vec![
            ParsedTriple::new(1, "114800436", "Amoxicilina"),
            ParsedTriple::new(2, "115770494", "Diclofenaco"),
            ParsedTriple::new(3, "114800436", "Amoxicilina"),
        ]);
        let skus: Vec<_> = items.iter().map(|i| (i.sku.as_str(), i.quantity_asked)).collect();
        assert_eq!(
            skus,
            vec![("114800436", 1), ("115770494", 2), ("114800436", 3)]
        );
    }
}
