//! Content sniffing, grounded on the original's `python-magic`-based
//! detection in `text_extraction.py` — classification by content, never by
//! file extension.

/// The MIME types the extractor recognizes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectedMime {
    Pdf,
    Msword,
    Odt,
    Docx,
    PlainText,
    Zip,
    Other(String),
}

impl DetectedMime {
    pub fn as_content_type(&self) -> &str {
        match self {
            DetectedMime::Pdf => "application/pdf",
            DetectedMime::Msword => "application/msword",
            DetectedMime::Odt => "application/vnd.oasis.opendocument.text",
            DetectedMime::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DetectedMime::PlainText => "text/plain",
            DetectedMime::Zip => "application/zip",
            DetectedMime::Other(mime) => mime,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, DetectedMime::Zip | DetectedMime::Other(_))
    }
}

/// Sniff the MIME type from file content. Falls back to `text/plain` when
/// `infer` finds no signature match and the bytes are valid UTF-8 — matching
/// the original, which treats unrecognized-but-text content as plain text.
pub fn sniff(bytes: &[u8]) -> DetectedMime {
    match infer::get(bytes).map(|kind| kind.mime_type()) {
        Some("application/pdf") => DetectedMime::Pdf,
        Some("application/msword") => DetectedMime::Msword,
        Some("application/vnd.oasis.opendocument.text") => DetectedMime::Odt,
        Some(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ) => DetectedMime::Docx,
        Some("application/zip") => DetectedMime::Zip,
        Some(other) => DetectedMime::Other(other.to_string()),
        None => {
            if std::str::from_utf8(bytes).is_ok() {
                DetectedMime::PlainText
            } else {
                DetectedMime::Other("application/octet-stream".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_ascii_sniffs_as_text() {
        assert_eq!(sniff(b"hello world"), DetectedMime::PlainText);
    }

    #[test]
    fn pdf_signature_sniffs_as_pdf() {
        let mut bytes = b"%PDF-1.4\n".to_vec();
        bytes.extend(vec![0u8; 16]);
        assert_eq!(sniff(&bytes), DetectedMime::Pdf);
    }

    #[test]
    fn zip_is_supported_false() {
        assert!(!DetectedMime::Zip.is_supported());
    }

    #[test]
    fn unknown_binary_is_unsupported() {
        let bytes = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02, 0x03];
        let mime = sniff(&bytes);
        assert!(!mime.is_supported());
    }
}
