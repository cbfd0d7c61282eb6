//! Manual citation extraction from retrieved passages.

use crate::error::{Result, TyrewiseError};
use crate::rag::SourceDocument;
use regex::Regex;

/// Prefix manual paths carry in the quick reference and manuals.
pub const DEFAULT_MANUALS_PREFIX: &str = "./manuals/";

/// Finds the first manual reference in a ranked list of passages.
///
/// Patterns are tried in priority order within each passage; passages are
/// visited in rank order and the first hit wins.
#[derive(Debug, Clone)]
pub struct CitationExtractor {
    patterns: Vec<Regex>,
}

impl CitationExtractor {
    /// Build the pattern list, matching bare manual paths under `manuals_prefix`.
    pub fn new(manuals_prefix: &str) -> Result<Self> {
        let sources = [
            r"(?mi)^URL:\s*(.+\.pdf)".to_string(),
            format!(r"(?mi)({}.+?\.pdf)", regex::escape(manuals_prefix)),
            r"(?mi)located at:\s*(.+\.pdf)".to_string(),
            r"(?mi)manual.*?:\s*(.+\.pdf)".to_string(),
        ];

        let patterns = sources
            .iter()
            .map(|source| Regex::new(source))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| TyrewiseError::Config(format!("Invalid citation pattern: {e}")))?;

        Ok(Self { patterns })
    }

    /// Prefix derived from the configured manuals directory.
    pub fn for_manuals_dir(manuals_dir: &str) -> Result<Self> {
        Self::new(&format!("{}/", manuals_dir.trim_end_matches('/')))
    }

    /// First citation over `documents` (rank order) and patterns (priority order).
    pub fn extract<S: AsRef<str>>(&self, documents: &[S]) -> Option<String> {
        documents.iter().find_map(|document| {
            self.patterns.iter().find_map(|pattern| {
                pattern
                    .captures(document.as_ref())
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().trim().to_string())
            })
        })
    }

    /// First citation over retrieved source documents.
    pub fn extract_from_sources(&self, sources: &[SourceDocument]) -> Option<String> {
        let texts: Vec<&str> = sources.iter().map(|s| s.content.as_str()).collect();
        self.extract(&texts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> CitationExtractor {
        CitationExtractor::new(DEFAULT_MANUALS_PREFIX).unwrap()
    }

    #[test]
    fn test_first_document_wins() {
        let docs = ["URL: ./manuals/x.pdf", "manual located at: ./manuals/y.pdf"];
        assert_eq!(extractor().extract(&docs).unwrap(), "./manuals/x.pdf");
    }

    #[test]
    fn test_falls_through_to_later_document() {
        let docs = ["no reference here", "Operator manual: ./manuals/z.pdf"];
        assert_eq!(extractor().extract(&docs).unwrap(), "./manuals/z.pdf");
    }

    #[test]
    fn test_pattern_priority_within_document() {
        let doc = "See ./manuals/inline.pdf\nURL: ./manuals/primary.pdf";
        assert_eq!(extractor().extract(&[doc]).unwrap(), "./manuals/primary.pdf");
    }

    #[test]
    fn test_case_insensitive_and_trimmed() {
        let docs = ["The procedure is LOCATED AT:   docs/rim-removal.PDF"];
        assert_eq!(extractor().extract(&docs).unwrap(), "docs/rim-removal.PDF");
    }

    #[test]
    fn test_url_must_start_a_line() {
        let docs = ["Reference URL: https://example.com/guide.pdf"];
        assert_eq!(extractor().extract(&docs), None);
    }

    #[test]
    fn test_no_citation() {
        let docs: [&str; 2] = ["Inflate with a cage.", "Use PPE."];
        assert_eq!(extractor().extract(&docs), None);
        assert_eq!(extractor().extract::<&str>(&[]), None);
    }

    #[test]
    fn test_prefix_from_manuals_dir() {
        let extractor = CitationExtractor::for_manuals_dir("/srv/docs/").unwrap();
        let docs = ["open /srv/docs/valve.pdf for torque values"];
        assert_eq!(extractor.extract(&docs).unwrap(), "/srv/docs/valve.pdf");
    }

    #[test]
    fn test_extract_from_sources() {
        let sources = vec![SourceDocument {
            content: "URL: ./manuals/lock-ring.pdf".to_string(),
            source: "./resources/quick_reference.txt".to_string(),
            title: "quick_reference.txt".to_string(),
            page: None,
            score: 0.9,
        }];
        assert_eq!(
            extractor().extract_from_sources(&sources).unwrap(),
            "./manuals/lock-ring.pdf"
        );
    }
}
