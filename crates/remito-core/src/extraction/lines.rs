//! Per-line cleanup of candidate product lines.

use tracing::trace;

use crate::models::item::CandidateLine;

use super::patterns::{DELIMITER_RUN, SEPARATOR_ROW, SUMMARY_ROW, WHITESPACE_RUN};

/// Lines shorter than this cannot hold a product row.
pub const MIN_LINE_LEN: usize = 5;

/// Normalize candidate lines, dropping the ones that cannot be product rows.
///
/// Order and line indices are preserved.
pub fn normalize_lines(lines: Vec<CandidateLine>) -> Vec<CandidateLine> {
    lines
        .into_iter()
        .filter_map(|line| {
            let content = normalize_line(&line.content)?;
            Some(CandidateLine {
                content,
                line_index: line.line_index,
            })
        })
        .collect()
}

/// Normalize one line, or `None` when it should be discarded.
pub fn normalize_line(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.chars().count() < MIN_LINE_LEN {
        return None;
    }
    if SUMMARY_ROW.is_match(trimmed) {
        trace!("Dropping summary row: {}", trimmed);
        return None;
    }
    if SEPARATOR_ROW.is_match(trimmed) {
        trace!("Dropping separator row: {}", trimmed);
        return None;
    }

    let stripped = trimmed.trim_matches(|c: char| c == '|' || c.is_whitespace());
    let collapsed = DELIMITER_RUN.replace_all(stripped, "| ");
    let collapsed = WHITESPACE_RUN.replace_all(&collapsed, " ");
    let result = collapsed.trim();

    if result.is_empty() {
        None
    } else {
        Some(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_short_and_empty_lines_dropped() {
        assert_eq!(normalize_line(""), None);
        assert_eq!(normalize_line("   "), None);
        assert_eq!(normalize_line(" 2 | "), None);
    }

    #[test]
    fn test_summary_rows_dropped() {
        assert_eq!(normalize_line("Subtotal | 1200,00"), None);
        assert_eq!(normalize_line("TOTAL 4500"), None);
        assert_eq!(normalize_line("IVA 21% 945,00"), None);
        assert_eq!(normalize_line("Descuento 10%"), None);
    }

    #[test]
    fn test_separator_rows_dropped() {
        assert_eq!(normalize_line("+------+-------+"), None);
        assert_eq!(normalize_line("| ===== | ===== |"), None);
        assert_eq!(normalize_line("__________"), None);
    }

    #[test]
    fn test_delimiters_and_whitespace_collapse() {
        assert_eq!(
            normalize_line("|| 2 |  | 114800436 |   Amoxicilina   600mg ||").as_deref(),
            Some("2 | 114800436 | Amoxicilina 600mg")
        );
    }

    #[test]
    fn test_order_and_indices_preserved() {
        let lines = vec![
            CandidateLine::new("2 | 114800436 | Amoxicilina", 3),
            CandidateLine::new("Total 12", 4),
            CandidateLine::new(" 1  115770494  Diclofenaco ", 5),
        ];
        let result = normalize_lines(lines);
        assert_eq!(
            result,
            vec![
                CandidateLine::new("2 | 114800436 | Amoxicilina", 3),
                CandidateLine::new("1 115770494 Diclofenaco", 5),
            ]
        );
    }
}
