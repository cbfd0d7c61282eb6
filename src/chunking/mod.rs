//! Text chunking for indexing.
//!
//! Splits loaded pages into overlapping chunks by recursively trying coarser
//! to finer separators (paragraphs, lines, words, characters) until every
//! piece fits the target size.

use crate::loader::LoadedPage;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::warn;

/// Default separators, coarsest first. The empty separator splits characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A chunk of text ready to be embedded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentChunk {
    /// Path of the source file.
    pub source: String,
    /// Display title of the source.
    pub title: String,
    /// Page the chunk came from, if paginated.
    pub page: Option<u32>,
    /// Text content of this chunk.
    pub content: String,
    /// Order of this chunk within its source.
    pub order: i32,
}

/// Configuration for chunking.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Recursive character splitter.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    /// Create a splitter with the default separators.
    pub fn new(config: ChunkingConfig) -> Self {
        Self::with_separators(config, &DEFAULT_SEPARATORS)
    }

    /// Create a splitter with custom separators, coarsest first.
    pub fn with_separators(config: ChunkingConfig, separators: &[&str]) -> Self {
        Self {
            config,
            separators: separators.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Split a text into chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every page, numbering chunks per source in page order.
    pub fn split_pages(&self, pages: &[LoadedPage]) -> Vec<ContentChunk> {
        let mut chunks = Vec::new();
        let mut order_by_source: std::collections::HashMap<&str, i32> =
            std::collections::HashMap::new();

        for page in pages {
            for content in self.split_text(&page.text) {
                let order = order_by_source.entry(page.source.as_str()).or_insert(0);
                chunks.push(ContentChunk {
                    source: page.source.clone(),
                    title: page.title.clone(),
                    page: page.page,
                    content,
                    order: *order,
                });
                *order += 1;
            }
        }

        chunks
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, finer) = Self::choose_separator(text, separators);

        let splits: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for split in splits {
            if char_len(split) < self.config.chunk_size {
                fitting.push(split);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting, separator));
                fitting.clear();
            }

            if finer.is_empty() {
                chunks.push(split.to_string());
            } else {
                chunks.extend(self.split_recursive(split, finer));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, separator));
        }

        chunks
    }

    /// First separator present in `text`, plus the finer ones after it.
    fn choose_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
        for (i, separator) in separators.iter().enumerate() {
            if separator.is_empty() || text.contains(separator.as_str()) {
                return (separator.as_str(), &separators[i + 1..]);
            }
        }
        ("", &[])
    }

    /// Greedily pack small splits into chunks, carrying trailing splits
    /// forward as overlap.
    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for &split in splits {
            let len = char_len(split);
            let joined_len = |current: &VecDeque<&str>| {
                if current.is_empty() {
                    0
                } else {
                    separator_len
                }
            };

            if total + len + joined_len(&current) > self.config.chunk_size && !current.is_empty() {
                if total > self.config.chunk_size {
                    warn!(
                        "Created a chunk of {} characters, longer than the target {}",
                        total, self.config.chunk_size
                    );
                }

                if let Some(chunk) = join(&current, separator) {
                    chunks.push(chunk);
                }

                while total > self.config.chunk_overlap
                    || (total + len + joined_len(&current) > self.config.chunk_size && total > 0)
                {
                    let Some(first) = current.pop_front() else {
                        break;
                    };
                    let dropped = char_len(first) + joined_len(&current);
                    total = total.saturating_sub(dropped);
                }
            }

            total += len + joined_len(&current);
            current.push_back(split);
        }

        if let Some(chunk) = join(&current, separator) {
            chunks.push(chunk);
        }

        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join(parts: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = parts.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
