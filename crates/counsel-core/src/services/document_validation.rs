//! Upload validation for the document-analysis pipeline.
//!
//! Checks extension and size against a fixed allow-list before any file
//! content is read.

use std::path::Path;

use thiserror::Error;

pub const MAX_DOCUMENT_SIZE: u64 = 10_485_760; // 10MB
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "txt"];
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentValidationError {
    #[error("file not found")]
    FileNotFound,

    #[error("file has no extension")]
    NoExtension,

    #[error("unsupported file type: .{0}")]
    UnsupportedExtension(String),

    #[error("file is too large: {size} bytes (limit {max})")]
    FileTooLarge { size: u64, max: u64 },
}

/// Validate a file for analysis.
/// Only metadata is touched here; the size ceiling is enforced before any
/// content I/O happens.
pub fn validate_document(path: &Path) -> Result<(), DocumentValidationError> {
    let metadata =
        std::fs::metadata(path).map_err(|_| DocumentValidationError::FileNotFound)?;

    let size = metadata.len();
    if size > MAX_DOCUMENT_SIZE {
        return Err(DocumentValidationError::FileTooLarge {
            size,
            max: MAX_DOCUMENT_SIZE,
        });
    }

    let ext = path
        .extension()
        .ok_or(DocumentValidationError::NoExtension)?
        .to_string_lossy()
        .to_lowercase();

    if !is_supported_extension(&ext) {
        return Err(DocumentValidationError::UnsupportedExtension(ext));
    }

    Ok(())
}

/// Check if an extension is on the allow-list
pub fn is_supported_extension(ext: &str) -> bool {
    let ext_lower = ext.to_lowercase();
    DOCUMENT_EXTENSIONS.contains(&ext_lower.as_str())
        || IMAGE_EXTENSIONS.contains(&ext_lower.as_str())
}

/// Check if a file is an image based on extension
pub fn is_image_extension(ext: &str) -> bool {
    IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;

    fn create_test_file(path: &Path, size: u64) -> std::io::Result<()> {
        let mut file = fs::File::create(path)?;
        let data = vec![0u8; size as usize];
        file.write_all(&data)?;
        Ok(())
    }

    #[test]
    fn test_validate_valid_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.pdf");
        create_test_file(&path, 2048).unwrap();

        assert!(validate_document(&path).is_ok());
    }

    #[test]
    fn test_validate_valid_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpeg");
        create_test_file(&path, 1024).unwrap();

        assert!(validate_document(&path).is_ok());
    }

    #[test]
    fn test_validate_file_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.pdf");
        create_test_file(&path, MAX_DOCUMENT_SIZE + 1).unwrap();

        assert!(matches!(
            validate_document(&path),
            Err(DocumentValidationError::FileTooLarge { .. })
        ));
    }

    #[test]
    fn test_validate_file_at_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exact.txt");
        create_test_file(&path, MAX_DOCUMENT_SIZE).unwrap();

        assert!(validate_document(&path).is_ok());
    }

    #[test]
    fn test_validate_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.zip");
        create_test_file(&path, 512).unwrap();

        assert_eq!(
            validate_document(&path),
            Err(DocumentValidationError::UnsupportedExtension(
                "zip".to_string()
            ))
        );
    }

    #[test]
    fn test_validate_no_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README");
        create_test_file(&path, 512).unwrap();

        assert_eq!(
            validate_document(&path),
            Err(DocumentValidationError::NoExtension)
        );
    }

    #[test]
    fn test_validate_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            validate_document(&dir.path().join("missing.pdf")),
            Err(DocumentValidationError::FileNotFound)
        );
    }

    #[test]
    fn test_supported_extensions_case_insensitive() {
        assert!(is_supported_extension("PDF"));
        assert!(is_supported_extension("Docx"));
        assert!(is_supported_extension("JPG"));
        assert!(!is_supported_extension("exe"));
        assert!(!is_supported_extension("gif"));
    }

    #[test]
    fn test_is_image_extension() {
        assert!(is_image_extension("png"));
        assert!(is_image_extension("JPEG"));
        assert!(!is_image_extension("pdf"));
    }
}
