//! Fenced plotting-code extraction and answer sanitizing.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::Range;

static CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```python(.*?)```").expect("valid code block pattern"));

static ANY_CODE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```python.*?```").expect("valid code block pattern"));

/// Start of a save call, e.g. the `savefig(` in `fig.savefig(`.
static SAVE_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsavefig\s*\(").expect("valid savefig pattern"));

/// Interior of the first ```` ```python ```` block, trimmed.
pub fn extract_code(text: &str) -> Option<String> {
    CODE_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|body| body.as_str().trim().to_string())
}

/// The answer with every ```` ```python ```` block removed, trimmed.
pub fn remove_code_blocks(text: &str) -> String {
    ANY_CODE_BLOCK.replace_all(text, "").trim().to_string()
}

/// Replace every `savefig(...)` expression with `None`.
///
/// The whole expression is replaced, receiver included, so
/// `plt.figure(figsize=(8, 6)).savefig("x.png")` and
/// `axes[0].figure.savefig("x.png")` both become `None`. Arguments may span
/// lines and contain nested brackets or strings with parentheses. Mentions
/// inside strings and comments are left alone. A call whose parentheses
/// never close is stripped to the end of the code.
pub fn strip_save_directives(code: &str) -> String {
    let layout = SourceLayout::scan(code);
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for call in SAVE_CALL.find_iter(code) {
        if layout.in_literal(call.start()) {
            continue;
        }
        let start = layout.expression_start(call.start());
        let end = layout
            .closing(call.end() - 1)
            .map_or(code.len(), |close| close + 1);

        match spans.last_mut() {
            Some(last) if start < last.1 => {
                last.0 = last.0.min(start);
                last.1 = last.1.max(end);
            }
            _ => spans.push((start, end)),
        }
    }

    let mut out = String::with_capacity(code.len());
    let mut copied = 0;
    for (start, end) in spans {
        out.push_str(&code[copied..start]);
        out.push_str("None");
        copied = end;
    }
    out.push_str(&code[copied..]);
    out
}

/// Bracket pairs and literal spans of a Python source.
struct SourceLayout<'a> {
    bytes: &'a [u8],
    /// Opening bracket offset to its closing offset.
    close_of: HashMap<usize, usize>,
    /// Closing bracket offset to its opening offset.
    open_of: HashMap<usize, usize>,
    /// Byte ranges of string literals and comments.
    literals: Vec<Range<usize>>,
}

impl<'a> SourceLayout<'a> {
    fn scan(code: &'a str) -> Self {
        let bytes = code.as_bytes();
        let mut close_of = HashMap::new();
        let mut open_of = HashMap::new();
        let mut literals = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b'(' | b'[' | b'{' => stack.push(i),
                b')' | b']' | b'}' => {
                    if let Some(open) = stack.pop() {
                        close_of.insert(open, i);
                        open_of.insert(i, open);
                    }
                }
                b'#' => {
                    let start = i;
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    literals.push(start..i);
                    continue;
                }
                quote @ (b'\'' | b'"') => {
                    let end = skip_string(bytes, i, quote).unwrap_or(bytes.len());
                    literals.push(i..end);
                    i = end;
                    continue;
                }
                _ => {}
            }
            i += 1;
        }

        Self {
            bytes,
            close_of,
            open_of,
            literals,
        }
    }

    fn in_literal(&self, offset: usize) -> bool {
        self.literals.iter().any(|span| span.contains(&offset))
    }

    fn closing(&self, open: usize) -> Option<usize> {
        self.close_of.get(&open).copied()
    }

    /// Walk back from the name at `name_start` over `.attr`, subscripts and
    /// calls to the first byte of the primary expression.
    fn expression_start(&self, name_start: usize) -> usize {
        let bytes = self.bytes;
        let mut start = name_start;

        loop {
            let dot = skip_blanks_back(bytes, start);
            if dot == 0 || bytes[dot - 1] != b'.' {
                return start;
            }
            let mut i = skip_blanks_back(bytes, dot - 1);
            let mut consumed = false;

            while i > 0 && matches!(bytes[i - 1], b')' | b']') {
                match self.open_of.get(&(i - 1)) {
                    Some(&open) => {
                        i = open;
                        consumed = true;
                    }
                    None => return start,
                }
            }
            if i > 0 && is_name_byte(bytes[i - 1]) {
                while i > 0 && is_name_byte(bytes[i - 1]) {
                    i -= 1;
                }
                consumed = true;
            }

            if !consumed {
                return start;
            }
            start = i;
        }
    }
}

fn skip_blanks_back(bytes: &[u8], mut i: usize) -> usize {
    while i > 0 && matches!(bytes[i - 1], b' ' | b'\t') {
        i -= 1;
    }
    i
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte >= 0x80
}

/// Index just past the string literal opening at `start`.
fn skip_string(bytes: &[u8], start: usize, quote: u8) -> Option<usize> {
    let triple = bytes.get(start + 1) == Some(&quote) && bytes.get(start + 2) == Some(&quote);
    let mut i = start + if triple { 3 } else { 1 };

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b if b == quote => {
                if !triple {
                    return Some(i + 1);
                }
                if bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote) {
                    return Some(i + 3);
                }
                i += 1;
            }
            b'\n' if !triple => return None,
            _ => i += 1,
        }
    }

    None
}
