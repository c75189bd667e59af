//! Document normalization: raw content in, addressable chunks out.
//!
//! Dispatches on the raw document's content type — markdown and plain text
//! chunk directly, HTML is reduced to text first, PDF bytes go through text
//! extraction — then assigns each span its stable identifier and metadata.
//!
//! Normalization is all-or-nothing per document: a parse failure aborts the
//! whole document's chunking rather than silently dropping content. It is
//! also a pure function of its input, so re-normalizing identical content
//! yields identical chunk ids, order, and text.

use scraper::Html;
use sha2::{Digest, Sha256};

use crate::chunk::split_text;
use crate::error::PipelineError;
use crate::models::{Chunk, ChunkMetadata, RawBody, RawDocument};

pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_HTML: &str = "text/html";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_PLAIN: &str = "text/plain";

/// Convert a raw document into its full chunk sequence.
pub fn normalize(doc: &RawDocument, max_tokens: usize) -> Result<Vec<Chunk>, PipelineError> {
    let text = extract_text(doc)?;
    let spans = split_text(&text, max_tokens);

    Ok(spans
        .into_iter()
        .enumerate()
        .map(|(index, span)| make_chunk(doc, index, span))
        .collect())
}

/// Reduce the raw body to plain text according to its content type.
fn extract_text(doc: &RawDocument) -> Result<String, PipelineError> {
    match (&doc.body, doc.content_type.as_str()) {
        (RawBody::Bytes(bytes), MIME_PDF) => pdf_extract::extract_text_from_mem(bytes)
            .map_err(|e| parse_error(MIME_PDF, e.to_string())),
        (RawBody::Bytes(_), other) => Err(parse_error(
            other,
            "binary body with non-PDF content type".to_string(),
        )),
        (RawBody::Text(text), MIME_HTML) => html_to_text(text),
        (RawBody::Text(text), _) => Ok(text.clone()),
    }
}

/// Strip markup from an HTML document, keeping block structure as paragraph
/// breaks so the splitter can still find section boundaries. Also used by
/// the directory fetcher, which strips HTML files before concatenation.
pub(crate) fn html_to_text(html: &str) -> Result<String, PipelineError> {
    let document = Html::parse_document(html);
    let mut out = String::new();

    for node in document.root_element().text() {
        let piece = node.trim();
        if piece.is_empty() {
            // Whitespace-only nodes separate block elements in practice.
            if !out.is_empty() && !out.ends_with("\n\n") {
                out.push_str("\n\n");
            }
            continue;
        }
        if !out.is_empty() && !out.ends_with("\n\n") {
            out.push(' ');
        }
        out.push_str(piece);
    }

    if out.trim().is_empty() && !html.trim().is_empty() {
        return Err(parse_error(
            MIME_HTML,
            "no text content could be extracted".to_string(),
        ));
    }

    Ok(out)
}

fn make_chunk(doc: &RawDocument, index: usize, text: String) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: crate::models::chunk_id(&doc.framework, index),
        text,
        hash,
        metadata: ChunkMetadata {
            framework: doc.framework.clone(),
            source_type: doc.source_type,
            loaded_at: doc.fetched_at,
            sequence_index: index,
        },
    }
}

fn parse_error(content_type: &str, detail: String) -> PipelineError {
    PipelineError::ParseError {
        content_type: content_type.to_string(),
        detail,
    }
}

/// Guess the content type of a local file from its extension.
pub fn content_type_for_path(path: &std::path::Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("md") | Some("markdown") => MIME_MARKDOWN,
        Some("html") | Some("htm") => MIME_HTML,
        Some("pdf") => MIME_PDF,
        _ => MIME_PLAIN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use chrono::Utc;

    fn raw_doc(framework: &str, content_type: &str, body: RawBody) -> RawDocument {
        RawDocument {
            framework: framework.to_string(),
            source_type: SourceType::Local,
            content_type: content_type.to_string(),
            body,
            fetched_at: Utc::now(),
        }
    }

    #[test]
    fn three_paragraphs_yield_three_indexed_chunks() {
        let body = "Redis is an in-memory data store.\n\n\
                    Persistence is provided by RDB snapshots and the AOF.\n\n\
                    Replication copies data to read-only replicas.";
        let doc = raw_doc("Redis", MIME_MARKDOWN, RawBody::Text(body.to_string()));
        let chunks = normalize(&doc, 250).unwrap();
        assert_eq!(chunks.len(), 3);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.sequence_index, i);
            assert_eq!(chunk.id, format!("redis:{}", i));
            assert_eq!(chunk.metadata.framework, "Redis");
        }
    }

    #[test]
    fn repeated_normalization_is_identical() {
        let body = "# A\n\nfirst section text\n\n# B\n\nsecond section text";
        let doc = raw_doc("FastAPI", MIME_MARKDOWN, RawBody::Text(body.to_string()));
        let a = normalize(&doc, 10).unwrap();
        let b = normalize(&doc, 10).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn html_is_reduced_to_text() {
        let html = "<html><body><h1>Routing</h1><p>Routes map URLs to handlers.</p></body></html>";
        let doc = raw_doc("Express.js", MIME_HTML, RawBody::Text(html.to_string()));
        let chunks = normalize(&doc, 250).unwrap();
        assert!(!chunks.is_empty());
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(joined.contains("Routing"));
        assert!(joined.contains("Routes map URLs to handlers."));
        assert!(!joined.contains("<p>"));
    }

    #[test]
    fn invalid_pdf_is_a_parse_error() {
        let doc = raw_doc("Django", MIME_PDF, RawBody::Bytes(b"not a pdf".to_vec()));
        let err = normalize(&doc, 250).unwrap_err();
        assert!(matches!(err, PipelineError::ParseError { .. }));
    }

    #[test]
    fn parse_failure_yields_no_chunks_at_all() {
        // All-or-nothing: nothing is emitted for a document that fails parsing.
        let doc = raw_doc("Django", MIME_PDF, RawBody::Bytes(b"garbage".to_vec()));
        assert!(normalize(&doc, 250).is_err());
    }

    #[test]
    fn content_type_guessing() {
        use std::path::Path;
        assert_eq!(content_type_for_path(Path::new("a/b.md")), MIME_MARKDOWN);
        assert_eq!(content_type_for_path(Path::new("x.HTML")), MIME_HTML);
        assert_eq!(content_type_for_path(Path::new("doc.pdf")), MIME_PDF);
        assert_eq!(content_type_for_path(Path::new("notes.txt")), MIME_PLAIN);
        assert_eq!(content_type_for_path(Path::new("LICENSE")), MIME_PLAIN);
    }
}
