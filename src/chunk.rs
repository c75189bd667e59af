//! Structural-boundary text splitter.
//!
//! Splits normalized document text into spans that respect a `max_tokens`
//! limit. Every paragraph boundary (`\n\n`) is a span boundary — each
//! structural element of the document becomes its own addressable chunk —
//! and a hard character cutoff applies only when a single paragraph
//! overflows the limit, preferring newline/space boundaries over severing
//! mid-word.
//!
//! The splitter is a pure function of its input: identical text and limit
//! always produce identical spans in identical order, which is what makes
//! chunk identifiers stable across re-loads.

/// Approximate chars-per-token ratio used for all token budgets.
pub const CHARS_PER_TOKEN: usize = 4;

/// Split text into one span per paragraph, respecting `max_tokens`.
///
/// Empty or whitespace-only input yields no spans.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut spans = Vec::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut spans);
        } else {
            spans.push(trimmed.to_string());
        }
    }

    spans
}

/// Cut an oversized block at `max_chars` boundaries, backing up to the
/// nearest newline or space where one exists.
fn hard_split(block: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = block;
    while !remaining.is_empty() {
        let limit = floor_char_boundary(remaining, remaining.len().min(max_chars));
        let split_at = if limit < remaining.len() {
            remaining[..limit]
                .rfind('\n')
                .or_else(|| remaining[..limit].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            limit
        };
        let piece = remaining[..split_at].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[split_at..];
    }
}

/// Largest index `<= at` that lands on a UTF-8 character boundary.
fn floor_char_boundary(s: &str, at: usize) -> usize {
    let mut idx = at;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Truncate a string to at most `max_chars`, at a character boundary,
/// preferring the last space so the cut reads cleanly. Used by the query
/// aggregator when the final fragment overflows the response budget.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.len() <= max_chars {
        return text.to_string();
    }
    let limit = floor_char_boundary(text, max_chars);
    let cut = text[..limit].rfind(' ').filter(|&p| p > 0).unwrap_or(limit);
    text[..cut].trim_end().to_string()
}
