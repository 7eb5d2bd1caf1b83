//! Whole-text cleanup of systematic OCR character confusions.

use tracing::trace;

use super::patterns::TEXT_RULES;

/// Upper bound on rule passes; real documents settle in two.
const MAX_PASSES: usize = 8;

/// Normalize raw OCR text before structural parsing.
///
/// Rules from [`TEXT_RULES`] run in order: lone pipe-like glyphs become `|`,
/// delimiter runs collapse to `"| "`, horizontal whitespace collapses, and the
/// whole text is trimmed of delimiter and whitespace noise. Passes repeat
/// until the text stops changing, so the result is a fixed point:
/// `normalize(&normalize(x)) == normalize(x)`.
///
/// The glyph rule is lossy. A standalone `I` or `l` is always read as a
/// delimiter, and a standalone `1` is read as one where a delimiter is
/// expected next to a long product code.
pub fn normalize(raw: &str) -> String {
    let mut text = normalize_pass(raw);
    for pass in 1..MAX_PASSES {
        let next = normalize_pass(&text);
        if next == text {
            trace!("Text normalization settled after {} passes", pass);
            break;
        }
        text = next;
    }
    text
}

fn normalize_pass(text: &str) -> String {
    let mut out = text.to_string();
    for rule in TEXT_RULES.iter() {
        out = rule.apply(&out);
    }
    out.trim_matches(|c: char| c == '|' || c.is_whitespace())
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("  | |  \n "), "");
    }

    #[test]
    fn test_lone_glyphs_become_delimiters() {
        assert_eq!(
            normalize("I 2 I 114800436 I Amoxicilina"),
            "2 | 114800436 | Amoxicilina"
        );
        assert_eq!(
            normalize("¡ 2 ! 114800436 l Amoxicilina"),
            "2 | 114800436 | Amoxicilina"
        );
    }

    #[test]
    fn test_glyphs_inside_words_are_kept() {
        assert_eq!(normalize("Amoxicilina 600mg"), "Amoxicilina 600mg");
        assert_eq!(normalize("Ibuprofeno Infantil"), "Ibuprofeno Infantil");
    }

    #[test]
    fn test_one_as_delimiter_next_to_code() {
        assert_eq!(
            normalize("2 1 114800436 1 Amoxicilina"),
            "2 | 114800436 | Amoxicilina"
        );
        // A leading 1 is a quantity.
        assert_eq!(
            normalize("1 114800436 Amoxicilina"),
            "1 114800436 Amoxicilina"
        );
    }

    #[test]
    fn test_delimiter_runs_collapse() {
        assert_eq!(
            normalize("|| 2 || 114800436 |  | Amoxicilina ||"),
            "2 | 114800436 | Amoxicilina"
        );
    }

    #[test]
    fn test_whitespace_collapses_but_lines_survive() {
        let text = "Cantidad\t\t| Producto  \r\n| 2 |   114800436 | Amoxicilina   |\nFirma";
        assert_eq!(
            normalize(text),
            "Cantidad | Producto\n| 2 | 114800436 | Amoxicilina |\nFirma"
        );
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "",
            "| 2 | 114800436 | Amoxicilina 600mg |",
            "a ! ! b",
            "I I I",
            "|| 1 1 1 114800436 1 1 Gasas ||",
            "Cantidad   Producto\n\n 2  114800436   Amoxicilina\n | |\nFirma ¡",
            "l\nI\n1\n!",
        ];
        for sample in samples {
            let once = normalize(sample);
            assert_eq!(normalize(&once), once, "sample {:?}", sample);
        }
    }
}
