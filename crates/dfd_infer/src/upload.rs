//! Uploaded files and their temporary staging.

use std::io::Write;
use std::path::Path;

use dfd_transforms::InputError;
use tempfile::NamedTempFile;
use tracing::debug;

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-supplied file name.
    pub filename: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Upload from parts.
    pub fn new(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a local file, guessing the content type from its extension
    /// unless one is given.
    pub fn from_path(path: impl AsRef<Path>, content_type: Option<&str>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_content_type(path));
        Ok(Self::new(filename, content_type, bytes))
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// MIME type implied by a path's extension.
pub fn guess_content_type(path: &Path) -> String {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Reject anything not declared as `image/*`.
pub fn validate_content_type(content_type: &str) -> Result<(), InputError> {
    if content_type
        .trim()
        .to_ascii_lowercase()
        .starts_with("image/")
    {
        Ok(())
    } else {
        Err(InputError::UnsupportedContentType(content_type.to_string()))
    }
}

/// An upload written to a temporary file, deleted when dropped.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    /// Write `upload` to a fresh temporary file.
    pub fn stage(upload: &Upload) -> std::io::Result<Self> {
        let suffix = upload
            .extension()
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| ".img".to_string());
        let mut file = tempfile::Builder::new()
            .prefix("dfd-upload-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(&upload.bytes)?;
        file.flush()?;
        debug!(path = %file.path().display(), bytes = upload.bytes.len(), "staged upload");
        Ok(Self { file })
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        debug!(path = %self.file.path().display(), "removing staged upload");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type() {
        assert!(validate_content_type("image/png").is_ok());
        assert!(validate_content_type("IMAGE/JPEG").is_ok());
        assert!(matches!(
            validate_content_type("text/plain"),
            Err(InputError::UnsupportedContentType(ct)) if ct == "text/plain"
        ));
        assert!(validate_content_type("application/pdf").is_err());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("scan.PNG")), "image/png");
        assert_eq!(guess_content_type(Path::new("a/b/id.jpeg")), "image/jpeg");
        assert_eq!(guess_content_type(Path::new("notes.txt")), "text/plain");
        assert_eq!(guess_content_type(Path::new("blob")), "application/octet-stream");
    }

    #[test]
    fn test_staged_upload_removed_on_drop() {
        let upload = Upload::new("doc.png", "image/png", vec![1u8, 2, 3]);
        let staged = StagedUpload::stage(&upload).unwrap();
        let path = staged.path().to_path_buf();

        assert!(path.exists());
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(std::fs::read(&path).unwrap(), vec![1u8, 2, 3]);

        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn test_upload_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.jpg");
        std::fs::write(&path, b"bytes").unwrap();

        let upload = Upload::from_path(&path, None).unwrap();
        assert_eq!(upload.filename, "scan.jpg");
        assert_eq!(upload.content_type, "image/jpeg");

        let upload = Upload::from_path(&path, Some("image/png")).unwrap();
        assert_eq!(upload.content_type, "image/png");
    }
}
