//! Attachment parsing.
//!
//! Each branch is isolated: a parse failure never aborts ingest, it just
//! yields an empty `parsed_text` and a flag the caller can surface. Vision
//! parsing for images/PDFs reuses the chat collaborator rather than adding a
//! dedicated OCR dependency, the same "one collaborator, several jobs"
//! pattern the enrichment pipeline uses for summarization and extraction.

use std::io::Read as _;
use std::sync::Arc;

use base64::Engine;
use memory_llm::{ChatMessage, ChatProvider};

/// Outcome of attempting to parse one attachment.
pub struct ParsedAttachment {
    pub text: String,
    /// Set when parsing fell back to an empty result — surfaced in the
    /// ingest response so the caller knows the attachment didn't contribute.
    pub parse_failed: bool,
}

impl ParsedAttachment {
    fn empty_failed() -> Self {
        Self { text: String::new(), parse_failed: true }
    }

    fn ok(text: String) -> Self {
        Self { text, parse_failed: false }
    }
}

const VISION_PROMPT: &str =
    "Transcribe all readable text from this document. Return only the transcribed text, no commentary.";

/// Parses `bytes` named `filename` with declared `mime_type`. Never returns
/// an `Err` — every failure mode degrades to an empty, flagged result.
pub async fn parse_attachment(
    filename: &str,
    mime_type: &str,
    bytes: &[u8],
    chat: &Arc<dyn ChatProvider>,
) -> ParsedAttachment {
    if mime_type.starts_with("text/") {
        return parse_text(bytes);
    }

    if mime_type.starts_with("image/") || mime_type == "application/pdf" {
        return parse_via_vision(bytes, mime_type, chat).await;
    }

    if is_word_processing(mime_type, filename) {
        return parse_word_processing(bytes);
    }

    ParsedAttachment::empty_failed()
}

fn parse_text(bytes: &[u8]) -> ParsedAttachment {
    match std::str::from_utf8(bytes) {
        Ok(s) => ParsedAttachment::ok(s.to_string()),
        Err(_) => ParsedAttachment::ok(String::from_utf8_lossy(bytes).into_owned()),
    }
}

async fn parse_via_vision(bytes: &[u8], mime_type: &str, chat: &Arc<dyn ChatProvider>) -> ParsedAttachment {
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    let prompt = format!("{VISION_PROMPT}\n\n[{mime_type} attachment, base64]: {encoded}");
    match chat.complete(vec![ChatMessage::user(prompt)], 2000, 0.0).await {
        Ok(text) if !text.trim().is_empty() => ParsedAttachment::ok(text),
        _ => ParsedAttachment::empty_failed(),
    }
}

fn is_word_processing(mime_type: &str, filename: &str) -> bool {
    mime_type == "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        || filename.to_lowercase().ends_with(".docx")
}

/// `.docx` is a zip of XML parts; the document body lives at
/// `word/document.xml`. Good enough text extraction: strip tags, keep runs.
fn parse_word_processing(bytes: &[u8]) -> ParsedAttachment {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = match zip::ZipArchive::new(cursor) {
        Ok(a) => a,
        Err(_) => return ParsedAttachment::empty_failed(),
    };

    let mut xml = String::new();
    let found = match archive.by_name("word/document.xml") {
        Ok(mut file) => file.read_to_string(&mut xml).is_ok(),
        Err(_) => false,
    };

    if !found {
        return ParsedAttachment::empty_failed();
    }

    ParsedAttachment::ok(strip_xml_tags(&xml))
}

fn strip_xml_tags(xml: &str) -> String {
    let mut out = String::with_capacity(xml.len() / 2);
    let mut in_tag = false;
    for c in xml.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_mime_decodes_utf8() {
        let chat: Arc<dyn ChatProvider> =
            Arc::new(memory_llm::mocks::MockChatProvider { response: String::new() });
        let result = parse_attachment("notes.txt", "text/plain", b"hello world", &chat).await;
        assert_eq!(result.text, "hello world");
        assert!(!result.parse_failed);
    }

    #[tokio::test]
    async fn image_mime_uses_vision_chat_path() {
        let chat: Arc<dyn ChatProvider> =
            Arc::new(memory_llm::mocks::MockChatProvider { response: "a scanned receipt".to_string() });
        let result = parse_attachment("scan.png", "image/png", b"\x89PNG", &chat).await;
        assert_eq!(result.text, "a scanned receipt");
        assert!(!result.parse_failed);
    }

    #[tokio::test]
    async fn unsupported_mime_fails_without_panicking() {
        let chat: Arc<dyn ChatProvider> =
            Arc::new(memory_llm::mocks::MockChatProvider { response: String::new() });
        let result = parse_attachment("archive.zip", "application/zip", b"PK\x03\x04", &chat).await;
        assert!(result.parse_failed);
        assert!(result.text.is_empty());
    }

    #[test]
    fn strip_xml_tags_keeps_text_nodes_only() {
        let xml = "<w:p><w:r><w:t>Hello</w:t></w:r><w:r><w:t>world</w:t></w:r></w:p>";
        assert_eq!(strip_xml_tags(xml), "Hello world");
    }

    #[test]
    fn malformed_docx_fails_without_panicking() {
        let result = parse_word_processing(b"not a zip file");
        assert!(result.parse_failed);
    }
}
