//! Regex patterns and correction tables for delivery-note line extraction.
//!
//! Tables are ordered data: earlier entries run first. Extend them here
//! without touching the matching code.

use lazy_static::lazy_static;
use regex::Regex;

/// An ordered `(pattern, replacement)` rewrite rule.
pub struct Rewrite {
    /// Rule name, used in logs and tests.
    pub name: &'static str,
    /// Pattern to search for.
    pub pattern: Regex,
    /// Replacement (supports `${n}` group references).
    pub replacement: &'static str,
}

impl Rewrite {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            pattern: Regex::new(pattern).unwrap(),
            replacement,
        }
    }

    /// Apply the rule to every match in `text`.
    pub fn apply(&self, text: &str) -> String {
        self.pattern.replace_all(text, self.replacement).into_owned()
    }
}

lazy_static! {
    // Text normalizer rules, in application order.
    pub static ref TEXT_RULES: Vec<Rewrite> = vec![
        // Pipe-like glyphs standing alone between whitespace.
        Rewrite::new(
            "lone_pipe_glyph",
            r"(?m)(^|[ \t])[¡!Il]([ \t]|$)",
            "${1}|${2}",
        ),
        // A lone "1" between a quantity and a long code.
        Rewrite::new(
            "one_between_quantity_and_code",
            r"(?m)(^|[ \t|])(\d{1,3})[ \t]+1[ \t]+(\d{8,})",
            "${1}${2} | ${3}",
        ),
        // A lone "1" right after a long code, before the description.
        Rewrite::new(
            "one_after_code",
            r"(\d{8,})[ \t]+1[ \t]+([^\d\s|])",
            "${1} | ${2}",
        ),
        Rewrite::new("delimiter_run", r"\|(?:[ \t]*\|)+[ \t]*", "| "),
        Rewrite::new("horizontal_space", r"[ \t\r\f\v\u{00a0}\u{2007}\u{202f}\u{3000}]+", " "),
        Rewrite::new("line_edge_space", r"(?m)^ +| +$", ""),
    ];

    // Section markers.
    pub static ref QUANTITY_HEADER: Regex = Regex::new(
        r"(?i)c[a4@]n[t+](?:[i1l!|]d[a4@]d|\.)"
    ).unwrap();

    pub static ref PRODUCT_HEADER: Regex = Regex::new(
        r"(?i)pr[o0]d[uv]c[t+][o0]"
    ).unwrap();

    pub static ref SECTION_END: Regex = Regex::new(
        r"(?i)(?:c[a4@]n[t+][i1l!|]d[a4@]d|t[o0]t[a4@]l)\s+de\s+un[i1l!|]d[a4@]des|\bf[i1l!|]rm[a4@]s?\b|[a4@]c[l1i|][a4@]r[a4@]c[i1l!|][oó0]n"
    ).unwrap();

    // Product-row shapes used when the table header is missing.
    pub static ref HEURISTIC_ROWS: Vec<Regex> = vec![
        Regex::new(r"^\|?\s*\d{1,3}\s*\|\s*\d{8,}\s*\|").unwrap(),
        Regex::new(r"^\d{1,3}\s+\d{8,}\s+\S").unwrap(),
        Regex::new(r"^\|?\s*\d{8,}\s*\|\s*\S").unwrap(),
    ];

    // Line filters.
    pub static ref SUMMARY_ROW: Regex = Regex::new(
        r"(?i)\b(?:sub\s*-?\s*total(?:es)?|total(?:es)?|descuentos?|discount|bonificaci[oó]n|iva|impuestos?|tax(?:es)?)\b"
    ).unwrap();

    pub static ref SEPARATOR_ROW: Regex = Regex::new(
        r"^[\s|+\-=_.*~:]+$|[-=_~]{3,}"
    ).unwrap();

    pub static ref DELIMITER_RUN: Regex = Regex::new(r"\|(?:\s*\|)+\s*").unwrap();

    pub static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();

    // Line matchers, most structured first.
    pub static ref ROW_DELIMITED_LEADING: Regex = Regex::new(
        r"^\|\s*(\d+)\s*\|\s*(\d{8,})\s*\|\s*(.+?)\s*$"
    ).unwrap();

    pub static ref ROW_DELIMITED: Regex = Regex::new(
        r"^(\d+)\s*\|\s*(\d{8,})\s*\|\s*(.+?)\s*$"
    ).unwrap();

    pub static ref ROW_DOUBLE_DELIMITED: Regex = Regex::new(
        r"^\|\s*\|\s*(\d+)\s*\|\s*(\d{8,})\s*\|\s*(.+?)\s*$"
    ).unwrap();

    pub static ref ROW_SPACED: Regex = Regex::new(
        r"^(\d+)\s+(\d{8,})\s+([^|\s][^|]*?)\s*$"
    ).unwrap();

    pub static ref ROW_MIXED: Regex = Regex::new(
        r"^\|?\s*(\d+)\s+(\d{8,})\s*\|\s*(.+?)\s*$"
    ).unwrap();

    pub static ref ROW_CODE_DESCRIPTION: Regex = Regex::new(
        r"^\|?\s*(\d{8,})\s*\|\s*(.+?)\s*$"
    ).unwrap();

    pub static ref ROW_PREFIXED_CODE: Regex = Regex::new(
        r"^\|?\s*([47]\d{7,})(?:\s*\|\s*|\s+)([^\d\s|].*?)\s*$"
    ).unwrap();

    // Description suffix noise, most specific first.
    pub static ref SUFFIX_RULES: Vec<Rewrite> = vec![
        Rewrite::new("batch_code", r"\s+L[.:]\s*\S.*$|\s+L\s+[A-Z0-9]*\d[A-Z0-9]*.*$", ""),
        Rewrite::new("lot_code", r"(?i)\s+(?:lote|lot)\s*[.:#]?\s*[a-z]*\d[\w\-/]*.*$", ""),
        Rewrite::new(
            "expiry_date",
            r"(?i)\s+(?:vto|vtos|venc|vence|vencimiento|exp)\s*\.?\s*:?\s*\d{1,2}\s*[/\-.]\s*\d{2,4}.*$",
            "",
        ),
        Rewrite::new("numeric_column", r"\s*\|[\d\s./:,\-]*$", ""),
        Rewrite::new("mojibake_arrow", r"\s*a?Â»\s*$", ""),
        Rewrite::new("trailing_symbols", r"[\s|»«©®°*#~^`'´,;:._\\/\-]+$", ""),
        Rewrite::new("lone_letter", r"\s+[a-z]$", ""),
    ];

    // Words fused by OCR: "ClavutanZoriak" -> "Clavutan Zoriak".
    pub static ref FUSED_WORDS: Regex = Regex::new(
        r"([a-záéíóúñü]{2,})([A-ZÁÉÍÓÚÑÜ])"
    ).unwrap();

    // Known product phrases OCR tends to break.
    pub static ref PHRASE_FIXES: Vec<Rewrite> = vec![
        Rewrite::new("acido_clavulanico", r"(?i)\b[aá]cido\s+clavul[aá]nico\b", "Ácido Clavulánico"),
        Rewrite::new("suspension_pediatrica", r"(?i)\bsusp(?:ensi[oó]n)?\.?\s+pedi[aá]trica\b", "Suspensión Pediátrica"),
        Rewrite::new("suspension_oral", r"(?i)\bsusp(?:ensi[oó]n)?\.?\s+oral\b", "Suspensión oral"),
        Rewrite::new("comprimidos_recubiertos", r"(?i)\bcomp(?:rimidos)?\.?\s+rec(?:ubiertos)?\b\.?", "Comprimidos recubiertos"),
        Rewrite::new("amoxicilina", r"(?i)\bamoxi\s+cilina\b", "Amoxicilina"),
        Rewrite::new("diclofenaco", r"(?i)\bdiclo\s+fenaco\b", "Diclofenaco"),
        Rewrite::new("potasico", r"(?i)\bpot\s+[aá]sico\b", "Potásico"),
        Rewrite::new("ibuprofeno", r"(?i)\bibu\s+profeno\b", "Ibuprofeno"),
        Rewrite::new("paracetamol", r"(?i)\bparace\s+tamol\b", "Paracetamol"),
    ];
}
