//! Ordered line matchers turning a product row into a `(qty, sku, desc)` triple.

use regex::Regex;
use tracing::trace;

use crate::models::item::ParsedTriple;

use super::patterns::{
    ROW_CODE_DESCRIPTION, ROW_DELIMITED, ROW_DELIMITED_LEADING, ROW_DOUBLE_DELIMITED, ROW_MIXED,
    ROW_PREFIXED_CODE, ROW_SPACED,
};

/// A single product-row shape.
pub trait LineMatcher: Send + Sync {
    /// Matcher name, for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Try to read a triple from the line. Returns `None` when the line does
    /// not have this shape or the captured values are out of bounds.
    fn try_match(&self, line: &str) -> Option<ParsedTriple>;
}

/// Capture-group layout of a row regex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowLayout {
    /// Groups: quantity, code, description.
    Triple,
    /// Groups: code, description. Quantity is taken as 1.
    CodeOnly,
}

/// Regex-backed line matcher.
pub struct RegexMatcher {
    name: &'static str,
    pattern: &'static Regex,
    layout: RowLayout,
}

impl RegexMatcher {
    pub fn new(name: &'static str, pattern: &'static Regex, layout: RowLayout) -> Self {
        Self {
            name,
            pattern,
            layout,
        }
    }
}

impl LineMatcher for RegexMatcher {
    fn name(&self) -> &'static str {
        self.name
    }

    fn try_match(&self, line: &str) -> Option<ParsedTriple> {
        let caps = self.pattern.captures(line)?;

        let triple = match self.layout {
            RowLayout::Triple => ParsedTriple::new(
                caps.get(1)?.as_str().parse().ok()?,
                caps.get(2)?.as_str().trim(),
                caps.get(3)?.as_str().trim(),
            ),
            RowLayout::CodeOnly => ParsedTriple::new(
                1,
                caps.get(1)?.as_str().trim(),
                caps.get(2)?.as_str().trim(),
            ),
        };

        triple.is_within_bounds().then_some(triple)
    }
}

/// Parses candidate lines with an ordered list of matchers.
///
/// The first matcher that yields an in-bounds triple wins.
pub struct LineParser {
    matchers: Vec<Box<dyn LineMatcher>>,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Parser with the built-in row shapes, most structured first.
    pub fn new() -> Self {
        let matchers: Vec<Box<dyn LineMatcher>> = vec![
            Box::new(RegexMatcher::new(
                "delimited_leading",
                &ROW_DELIMITED_LEADING,
                RowLayout::Triple,
            )),
            Box::new(RegexMatcher::new("delimited", &ROW_DELIMITED, RowLayout::Triple)),
            Box::new(RegexMatcher::new(
                "double_delimited",
                &ROW_DOUBLE_DELIMITED,
                RowLayout::Triple,
            )),
            Box::new(RegexMatcher::new("spaced", &ROW_SPACED, RowLayout::Triple)),
            Box::new(RegexMatcher::new("mixed", &ROW_MIXED, RowLayout::Triple)),
            Box::new(RegexMatcher::new(
                "code_description",
                &ROW_CODE_DESCRIPTION,
                RowLayout::CodeOnly,
            )),
            Box::new(RegexMatcher::new(
                "prefixed_code",
                &ROW_PREFIXED_CODE,
                RowLayout::CodeOnly,
            )),
        ];
        Self { matchers }
    }

    /// Parser with a custom matcher list.
    pub fn with_matchers(matchers: Vec<Box<dyn LineMatcher>>) -> Self {
        Self { matchers }
    }

    /// Append a matcher after the existing ones.
    pub fn with_matcher(mut self, matcher: Box<dyn LineMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Names of the matchers in evaluation order.
    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|m| m.name()).collect()
    }

    /// Parse a line into a triple, or `None` when no shape fits.
    pub fn parse_line(&self, line: &str) -> Option<ParsedTriple> {
        self.parse_line_with_matcher(line).map(|(triple, _)| triple)
    }

    /// Like [`parse_line`](Self::parse_line), also naming the matcher that won.
    pub fn parse_line_with_matcher(&self, line: &str) -> Option<(ParsedTriple, &'static str)> {
        let result = self
            .matchers
            .iter()
            .find_map(|m| m.try_match(line).map(|t| (t, m.name())));

        match &result {
            Some((_, name)) => trace!("Line matched by {}: {}", name, line),
            None => trace!("No matcher for line: {}", line),
        }
        result
    }
}
