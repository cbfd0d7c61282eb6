//! PDF text extraction via poppler's `pdftotext`.

use super::{title_of, LoadedPage};
use crate::error::{Result, TyrewiseError};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Page separator emitted by `pdftotext`.
const FORM_FEED: char = '\u{c}';

/// Extract the text of every page of a PDF.
///
/// Blank pages are dropped; page numbers keep their position in the document.
#[instrument(skip_all, fields(path = %path.display()))]
pub async fn load_pdf(path: &Path) -> Result<Vec<LoadedPage>> {
    let result = Command::new("pdftotext")
        .arg("-layout")
        .arg("-enc")
        .arg("UTF-8")
        .arg(path)
        .arg("-")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await;

    let output = match result {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TyrewiseError::ToolNotFound("pdftotext".into()));
        }
        Err(e) => {
            return Err(TyrewiseError::ToolFailed(format!("pdftotext execution failed: {e}")));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TyrewiseError::Loader(format!(
            "pdftotext failed for {}: {}",
            path.display(),
            stderr.trim()
        )));
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let source = path.display().to_string();
    let title = title_of(path);

    let pages: Vec<LoadedPage> = split_pages(&text)
        .into_iter()
        .map(|(page, text)| LoadedPage {
            source: source.clone(),
            title: title.clone(),
            page: Some(page),
            text,
        })
        .collect();

    debug!("Extracted {} non-empty pages", pages.len());
    Ok(pages)
}

/// Split `pdftotext` output into `(page_number, text)` pairs, skipping blank pages.
pub fn split_pages(text: &str) -> Vec<(u32, String)> {
    text.split(FORM_FEED)
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| (i as u32 + 1, page.trim_end().to_string()))
        .collect()
}
