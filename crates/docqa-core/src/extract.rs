//! Plain-text extraction for uploaded documents.

use tracing::warn;

use crate::traits::TextExtractor;

/// Extensions of binary document formats that need a dedicated parser.
const UNSUPPORTED_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "odt", "rtf"];

/// Decodes UTF-8 text files. Anything else extracts to an empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self { Self }
}

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], filename: &str) -> String {
        let ext = filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
        if let Some(ext) = ext.as_deref() {
            if UNSUPPORTED_EXTENSIONS.contains(&ext) {
                warn!(filename, ext, "no extractor for document format");
                return String::new();
            }
        }
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!(filename, error = %e, "file is not valid UTF-8");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8() {
        let ex = PlainTextExtractor::new();
        assert_eq!(ex.extract("héllo".as_bytes(), "notes.txt"), "héllo");
        assert_eq!(ex.extract(b"# title", "README.MD"), "# title");
    }

    #[test]
    fn invalid_utf8_and_binary_formats_are_empty() {
        let ex = PlainTextExtractor::new();
        assert_eq!(ex.extract(&[0xff, 0xfe, 0x00], "blob.txt"), "");
        assert_eq!(ex.extract(b"%PDF-1.7", "paper.PDF"), "");
    }
}
