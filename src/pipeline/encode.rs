//! File encoding: local file → base64 payload + MIME type.
//!
//! Extraction services accept documents inline as base64 inside the JSON
//! request body. Only images and PDFs are accepted. The MIME type comes from
//! the file extension, falling back to magic-byte sniffing for extensionless
//! picker paths.
//!
//! Reads are capped at `max_file_bytes`. A file larger than the cap is
//! truncated rather than rejected; the model usually still reads the leading
//! pages of a syllabus, which is where the schedule tends to be. The
//! truncation is logged and recorded on [`EncodedFile::truncated`].

use crate::error::FileAccessError;
use crate::pipeline::input::access_error;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

/// A document ready to submit to the extraction service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFile {
    /// Base64 (standard alphabet, padded) content.
    pub data: String,
    pub mime_type: String,
    pub file_name: String,
    /// Size of the file on disk.
    pub original_len: u64,
    /// True when only the first `max_file_bytes` were encoded.
    pub truncated: bool,
}

/// MIME type from a file extension.
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        "heif" => "image/heif",
        _ => return None,
    };
    Some(mime)
}

/// MIME type from the leading bytes of a file.
pub fn sniff_mime(head: &[u8]) -> Option<&'static str> {
    if head.starts_with(b"%PDF") {
        Some("application/pdf")
    } else if head.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if head.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if head.starts_with(b"GIF8") {
        Some("image/gif")
    } else if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Read `path` (at most `max_bytes`) and encode it.
///
/// `source` is the path the user selected; it is used for MIME detection and
/// error messages when `path` is a scratch copy.
pub async fn encode_file(path: &Path, source: &Path, max_bytes: u64) -> Result<EncodedFile, FileAccessError> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| access_error(source, &e))?;
    let original_len = file
        .metadata()
        .await
        .map_err(|e| access_error(source, &e))?
        .len();

    let mut buf = Vec::with_capacity(original_len.min(max_bytes) as usize);
    file.take(max_bytes)
        .read_to_end(&mut buf)
        .await
        .map_err(|e| access_error(source, &e))?;

    encode_bytes(&buf, source, original_len.max(buf.len() as u64))
}

/// Encode bytes already in memory. `bytes` may be a truncated prefix of a
/// file of `original_len` bytes.
pub fn encode_bytes(bytes: &[u8], source: &Path, original_len: u64) -> Result<EncodedFile, FileAccessError> {
    if bytes.is_empty() {
        return Err(FileAccessError::Empty {
            path: source.to_path_buf(),
        });
    }

    let mime_type = mime_from_extension(source)
        .or_else(|| sniff_mime(bytes))
        .ok_or_else(|| FileAccessError::UnsupportedType {
            path: source.to_path_buf(),
        })?;

    let truncated = (bytes.len() as u64) < original_len;
    if truncated {
        warn!(
            "{}: {} bytes exceeds the upload cap, encoding the first {} bytes only",
            source.display(),
            original_len,
            bytes.len()
        );
    }

    let data = STANDARD.encode(bytes);
    debug!(
        "Encoded {} ({}) → {} bytes base64",
        source.display(),
        mime_type,
        data.len()
    );

    Ok(EncodedFile {
        data,
        mime_type: mime_type.to_string(),
        file_name: source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        original_len,
        truncated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_detection() {
        assert_eq!(mime_from_extension(Path::new("a.PDF")), Some("application/pdf"));
        assert_eq!(mime_from_extension(Path::new("scan.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_from_extension(Path::new("notes.docx")), None);
        assert_eq!(mime_from_extension(Path::new("noext")), None);
    }

    #[test]
    fn magic_byte_sniffing() {
        assert_eq!(sniff_mime(b"%PDF-1.7"), Some("application/pdf"));
        assert_eq!(sniff_mime(&[0x89, b'P', b'N', b'G', 0x0D]), Some("image/png"));
        assert_eq!(sniff_mime(b"RIFF\0\0\0\0WEBPVP8 "), Some("image/webp"));
        assert_eq!(sniff_mime(b"hello"), None);
    }

    #[test]
    fn encode_small_pdf() {
        let data = encode_bytes(b"%PDF-1.4 test", Path::new("/x/syllabus.pdf"), 13).unwrap();
        assert_eq!(data.mime_type, "application/pdf");
        assert_eq!(data.file_name, "syllabus.pdf");
        assert!(!data.truncated);
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"%PDF-1.4 test");
    }

    #[test]
    fn empty_input_is_hard_failure() {
        let err = encode_bytes(b"", Path::new("a.pdf"), 0).unwrap_err();
        assert!(matches!(err, FileAccessError::Empty { .. }));
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = encode_bytes(b"plain text", Path::new("a.txt"), 10).unwrap_err();
        assert!(matches!(err, FileAccessError::UnsupportedType { .. }));
    }

    #[tokio::test]
    async fn large_file_is_truncated_to_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        let mut content = b"%PDF-1.4\n".to_vec();
        content.resize(4096, b'x');
        std::fs::write(&path, &content).unwrap();

        let encoded = encode_file(&path, &path, 1024).await.unwrap();
        assert!(encoded.truncated);
        assert_eq!(encoded.original_len, 4096);
        assert_eq!(STANDARD.decode(&encoded.data).unwrap().len(), 1024);
    }

    #[tokio::test]
    async fn zero_length_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.png");
        std::fs::write(&path, b"").unwrap();

        let err = encode_file(&path, &path, 1024).await.unwrap_err();
        assert!(matches!(err, FileAccessError::Empty { .. }));
    }

    #[tokio::test]
    async fn extensionless_file_is_sniffed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("document");
        std::fs::write(&path, b"%PDF-1.5 body").unwrap();

        let encoded = encode_file(&path, &path, 1024).await.unwrap();
        assert_eq!(encoded.mime_type, "application/pdf");
    }
}
