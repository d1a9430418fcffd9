use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;
use crate::models::DocumentFormat;

/// A text source that passed detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceText {
    pub text: String,
    pub size_bytes: u64,
}

/// Read a text source produced upstream (OCR output, exported message).
///
/// Sniffs magic bytes first: PDFs and images still need OCR and are refused,
/// as is anything that is not valid UTF-8 or carries NUL bytes.
pub fn detect_source(path: &Path, max_bytes: u64) -> Result<SourceText, ImportError> {
    let size = std::fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(ImportError::FileTooLarge {
            size,
            max: max_bytes,
        });
    }

    let bytes = std::fs::read(path)?;
    if bytes.is_empty() {
        return Err(ImportError::Empty);
    }

    match &bytes[..bytes.len().min(8)] {
        [0x25, 0x50, 0x44, 0x46, ..] => {
            return Err(ImportError::UnsupportedFormat("PDF needs OCR upstream".into()))
        }
        [0xFF, 0xD8, 0xFF, ..] | [0x89, 0x50, 0x4E, 0x47, ..] => {
            return Err(ImportError::UnsupportedFormat("image needs OCR upstream".into()))
        }
        _ => {}
    }

    if bytes.contains(&0) {
        return Err(ImportError::UnsupportedFormat("binary content".into()));
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| ImportError::UnsupportedFormat("not valid UTF-8".into()))?;

    Ok(SourceText {
        text,
        size_bytes: size,
    })
}

const MESSAGE_MARKERS: &[&str] = &[
    "confirmed.",
    "m-pesa",
    "mpesa",
    "airtel money",
    "has been credited",
    "has been debited",
    "new balance",
];
const TENDER_MARKERS: &[&str] = &["tender", "invitation to bid", "request for proposal", "bid bond"];
const CERTIFICATE_MARKERS: &[&str] = &["certificate", "certify that", "certified"];
const INVOICE_MARKERS: &[&str] = &["invoice", "amount due", "bill to", "receipt"];

/// Guess the document kind from keywords. Short texts with mobile-money or
/// bank-alert phrasing are messages; otherwise the first family with a hit
/// wins, checked in the order message, tender, certificate, invoice.
pub fn classify_text(text: &str) -> DocumentFormat {
    let lower = text.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));

    if text.len() <= 480 && has(MESSAGE_MARKERS) {
        DocumentFormat::FinancialMessage
    } else if has(TENDER_MARKERS) {
        DocumentFormat::Tender
    } else if has(CERTIFICATE_MARKERS) {
        DocumentFormat::Certificate
    } else if has(INVOICE_MARKERS) {
        DocumentFormat::Invoice
    } else {
        DocumentFormat::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt");
        std::fs::write(&path, "Certificate No. 2019-4567").unwrap();
        let source = detect_source(&path, 1024).unwrap();
        assert_eq!(source.text, "Certificate No. 2019-4567");
        assert_eq!(source.size_bytes, 25);
    }

    #[test]
    fn pdf_and_images_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("scan.pdf");
        std::fs::write(&pdf, b"%PDF-1.7 ...").unwrap();
        assert!(matches!(
            detect_source(&pdf, 1024),
            Err(ImportError::UnsupportedFormat(_))
        ));

        // JPEG content behind a .txt extension
        let jpeg = dir.path().join("misleading.txt");
        std::fs::write(&jpeg, [0xFF, 0xD8, 0xFF, 0xE0, 0x00]).unwrap();
        assert!(matches!(
            detect_source(&jpeg, 1024),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn binary_and_invalid_utf8_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("binary.exe");
        std::fs::write(&exe, [0x4D, 0x5A, 0x90, 0x00, 0x03, 0x00]).unwrap();
        assert!(matches!(detect_source(&exe, 1024), Err(ImportError::UnsupportedFormat(_))));

        let latin1 = dir.path().join("latin1.txt");
        std::fs::write(&latin1, [b'K', b'S', b'h', 0xA0, b'1']).unwrap();
        assert!(matches!(
            detect_source(&latin1, 1024),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn oversized_and_empty_sources() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.txt");
        let file = std::fs::File::create(&big).unwrap();
        file.set_len(2048).unwrap();
        assert!(matches!(
            detect_source(&big, 1024),
            Err(ImportError::FileTooLarge { size: 2048, max: 1024 })
        ));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "").unwrap();
        assert!(matches!(detect_source(&empty, 1024), Err(ImportError::Empty)));
    }

    #[test]
    fn classify_by_keywords() {
        assert_eq!(
            classify_text("QHX12ABC34 Confirmed. Ksh1,500.00 sent to JOHN DOE"),
            DocumentFormat::FinancialMessage
        );
        assert_eq!(
            classify_text("INVITATION TO TENDER\nKeNHA/R1-228-2021"),
            DocumentFormat::Tender
        );
        assert_eq!(
            classify_text("This is to certify that ACME LTD ..."),
            DocumentFormat::Certificate
        );
        assert_eq!(classify_text("TAX INVOICE\nAmount due KES 5.00"), DocumentFormat::Invoice);
        assert_eq!(classify_text("hello world"), DocumentFormat::Unknown);
    }

    #[test]
    fn long_text_with_message_phrasing_is_not_a_message() {
        let long = format!("INVOICE {} payment confirmed.", "x".repeat(600));
        assert_eq!(classify_text(&long), DocumentFormat::Invoice);
    }
}
