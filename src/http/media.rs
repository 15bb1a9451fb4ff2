//! Media type value object used for content negotiation.
//!
//! # Responsibilities
//! - Parse `type/subtype` strings, dropping parameters
//! - Wildcard-aware compatibility checks (`*/*`, `text/*`)
//!
//! # Design Decisions
//! - Parameters (`; charset=...`) are ignored for matching
//! - Comparison is case-insensitive (types normalized to lowercase)

use std::fmt;

/// A parsed media type, e.g. `application/json` or `text/*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaType {
    kind: String,
    subtype: String,
}

impl MediaType {
    /// Create a media type from its two components.
    pub fn new(kind: impl Into<String>, subtype: impl Into<String>) -> Self {
        Self {
            kind: kind.into().to_lowercase(),
            subtype: subtype.into().to_lowercase(),
        }
    }

    /// The full wildcard `*/*`.
    pub fn any() -> Self {
        Self::new("*", "*")
    }

    /// Parse a media type from a header-style string.
    ///
    /// Anything after the first `;` (quality values, charset) is dropped.
    /// Returns `None` for strings without exactly one `/` separator.
    pub fn parse(value: &str) -> Option<Self> {
        let essence = value.split(';').next().unwrap_or("").trim();
        let (kind, subtype) = essence.split_once('/')?;
        if kind.is_empty() || subtype.is_empty() || subtype.contains('/') {
            return None;
        }
        Some(Self::new(kind, subtype))
    }

    /// Primary type, e.g. `text` in `text/html`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Subtype, e.g. `html` in `text/html`.
    pub fn subtype(&self) -> &str {
        &self.subtype
    }

    /// True if this type accepts `other`, honoring `*` wildcards on
    /// either component of `self`.
    pub fn includes(&self, other: &MediaType) -> bool {
        (self.kind == "*" || self.kind == other.kind)
            && (self.subtype == "*" || self.subtype == other.subtype)
    }

    /// True if either type includes the other.
    ///
    /// Used for negotiation where wildcards can appear on both sides
    /// (route `produces` vs. client `Accept`).
    pub fn compatible(&self, other: &MediaType) -> bool {
        self.includes(other) || other.includes(self)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.subtype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_drops_parameters() {
        let mt = MediaType::parse("application/json; charset=utf-8").unwrap();
        assert_eq!(mt, MediaType::new("application", "json"));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(MediaType::parse("json").is_none());
        assert!(MediaType::parse("/json").is_none());
        assert!(MediaType::parse("text/").is_none());
        assert!(MediaType::parse("a/b/c").is_none());
    }

    #[test]
    fn wildcard_inclusion() {
        let any = MediaType::any();
        let text_any = MediaType::new("text", "*");
        let html = MediaType::new("text", "html");
        let json = MediaType::new("application", "json");

        assert!(any.includes(&html));
        assert!(text_any.includes(&html));
        assert!(!text_any.includes(&json));
        assert!(!html.includes(&text_any));
        assert!(html.compatible(&text_any));
    }

    #[test]
    fn comparison_is_case_insensitive() {
        assert_eq!(
            MediaType::parse("Text/HTML").unwrap(),
            MediaType::new("text", "html")
        );
    }
}
