//! Upload intake and validation.
//!
//! An [`UploadedFile`] is the request-scoped temporary copy of the
//! client's VCF. It owns a [`tempfile::NamedTempFile`], so the file is
//! removed when the value is discarded or dropped on any exit path,
//! including early returns and panics unwinding through the handler.
//!
//! [`UploadValidator::validate`] applies the checks in a fixed order and
//! stops at the first failure:
//!
//! 1. a file was supplied
//! 2. the name carries the accepted extension
//! 3. the size is within the ceiling
//! 4. the stored copy can be opened and is not empty
//!
//! [`parse_drugs`] validates the drug list independently.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::UploadConfig;
use crate::error::AnalyzeError;

pub const MSG_NO_FILE: &str = "No VCF file uploaded.";
pub const MSG_EMPTY_FILE: &str = "Uploaded VCF file is empty.";
pub const MSG_UNREADABLE: &str = "Uploaded file could not be read.";
pub const MSG_NO_DRUGS: &str = "Drug list is required.";
pub const MSG_NO_VALID_DRUGS: &str = "At least one valid drug name is required.";

/// Temporary on-disk copy of an uploaded file.
pub struct UploadedFile {
    file: NamedTempFile,
    writer: Option<tokio::fs::File>,
    original_name: String,
    size: u64,
}

impl UploadedFile {
    /// Creates an empty temporary file in `dir` (system temp dir when `None`).
    pub fn create(dir: Option<&Path>, original_name: impl Into<String>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("pharmaguard_").suffix(".vcf");
        let file = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create upload dir: {}", dir.display()))?;
                builder.tempfile_in(dir)
            }
            None => builder.tempfile(),
        }
        .context("Failed to create temporary upload file")?;

        Ok(Self {
            file,
            writer: None,
            original_name: original_name.into(),
            size: 0,
        })
    }

    /// Creates a temporary file holding `bytes`.
    pub async fn from_bytes(
        dir: Option<&Path>,
        original_name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self> {
        let mut upload = Self::create(dir, original_name)?;
        upload.append(bytes).await?;
        upload.finish().await?;
        Ok(upload)
    }

    /// Copies an existing file into request-scoped temporary storage.
    ///
    /// The source file is left untouched.
    pub async fn copy_from(dir: Option<&Path>, source: &Path) -> Result<Self> {
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let upload = Self::create(dir, name)?;
        let size = tokio::fs::copy(source, upload.path())
            .await
            .with_context(|| format!("Failed to copy {}", source.display()))?;
        Ok(Self { size, ..upload })
    }

    /// Appends a chunk of the upload body.
    pub async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if self.writer.is_none() {
            let handle = self
                .file
                .as_file()
                .try_clone()
                .context("Failed to open temporary upload file for writing")?;
            self.writer = Some(tokio::fs::File::from_std(handle));
        }
        if let Some(writer) = self.writer.as_mut() {
            writer
                .write_all(chunk)
                .await
                .context("Failed to write upload chunk")?;
        }
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Counts bytes received but not stored, once the ceiling is passed.
    pub fn count_dropped(&mut self, bytes: u64) {
        self.size = self.size.saturating_add(bytes);
    }

    /// Flushes buffered writes. Call once the body is fully received.
    pub async fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().await.context("Failed to flush upload")?;
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Absolute location, for handing to services that resolve paths themselves.
    pub fn absolute_path(&self) -> PathBuf {
        std::fs::canonicalize(self.path()).unwrap_or_else(|_| self.path().to_path_buf())
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Bytes received so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Deletes the temporary file now. Failures are logged, never returned.
    pub fn discard(mut self) {
        drop(self.writer.take());
        let path = self.path().to_path_buf();
        if let Err(e) = self.file.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove temporary upload");
        }
    }
}

impl std::fmt::Debug for UploadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadedFile")
            .field("path", &self.path())
            .field("original_name", &self.original_name)
            .field("size", &self.size)
            .finish()
    }
}

/// Structural, size, and type checks on an incoming upload.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_bytes: u64,
    extension: String,
}

impl UploadValidator {
    pub fn new(max_bytes: u64, extension: impl Into<String>) -> Self {
        Self {
            max_bytes,
            extension: extension.into().to_lowercase(),
        }
    }

    pub fn from_config(config: &UploadConfig) -> Self {
        Self::new(config.max_bytes, config.extension.clone())
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// True once `size` bytes exceed the ceiling.
    pub fn exceeds_limit(&self, size: u64) -> bool {
        size > self.max_bytes
    }

    pub fn too_large(&self) -> AnalyzeError {
        let limit = if self.max_bytes >= 1024 * 1024 {
            format!("{} MB", self.max_bytes / (1024 * 1024))
        } else {
            format!("{} bytes", self.max_bytes)
        };
        AnalyzeError::vcf(format!("File too large. Maximum size is {}.", limit))
    }

    fn has_accepted_extension(&self, name: &str) -> bool {
        name.to_lowercase().ends_with(&self.extension) && name.len() > self.extension.len()
    }

    /// Runs every upload check. A rejected file is deleted before returning.
    pub async fn validate(
        &self,
        candidate: Option<UploadedFile>,
    ) -> Result<UploadedFile, AnalyzeError> {
        let Some(upload) = candidate else {
            return Err(AnalyzeError::vcf(MSG_NO_FILE));
        };

        if !self.has_accepted_extension(upload.original_name()) {
            upload.discard();
            return Err(AnalyzeError::vcf(format!(
                "Invalid file type. Only {} files are accepted.",
                self.extension
            )));
        }

        if self.exceeds_limit(upload.size()) {
            upload.discard();
            return Err(self.too_large());
        }

        match readable(upload.path()).await {
            Ok(true) => Ok(upload),
            Ok(false) => {
                upload.discard();
                Err(AnalyzeError::vcf(MSG_EMPTY_FILE))
            }
            Err(e) => {
                tracing::warn!(path = %upload.path().display(), error = %e, "uploaded file not readable");
                upload.discard();
                Err(AnalyzeError::vcf(MSG_UNREADABLE))
            }
        }
    }
}

/// Opens the file and reads one byte. `Ok(false)` means the file is empty.
async fn readable(path: &Path) -> std::io::Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut first = [0u8; 1];
    Ok(file.read(&mut first).await? > 0)
}

/// Parses the `drugs` form field.
///
/// Accepts comma-separated text or a JSON array of strings. Tokens are
/// trimmed and empty tokens dropped; duplicates are kept.
pub fn parse_drugs(raw: Option<&str>) -> Result<Vec<String>, AnalyzeError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(AnalyzeError::input(MSG_NO_DRUGS));
    }

    let tokens: Vec<String> = if raw.starts_with('[') {
        match serde_json::from_str::<Vec<serde_json::Value>>(raw) {
            Ok(items) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.trim().to_string(),
                    other => other.to_string(),
                })
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => split_drugs(raw),
        }
    } else {
        split_drugs(raw)
    };

    if tokens.is_empty() {
        return Err(AnalyzeError::input(MSG_NO_VALID_DRUGS));
    }
    Ok(tokens)
}

fn split_drugs(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const VCF: &[u8] = b"##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n";

    fn validator() -> UploadValidator {
        UploadValidator::new(1024, ".vcf")
    }

    #[tokio::test]
    async fn test_missing_file_rejected() {
        let err = validator().validate(None).await.unwrap_err();
        assert_eq!(err.error_type(), "VCF_VALIDATION_ERROR");
        assert_eq!(err.public_message(), MSG_NO_FILE);
    }

    #[tokio::test]
    async fn test_wrong_extension_rejected_and_removed() {
        let dir = TempDir::new().unwrap();
        let upload = UploadedFile::from_bytes(Some(dir.path()), "sample.txt", VCF)
            .await
            .unwrap();
        let path = upload.path().to_path_buf();
        assert!(path.exists());

        let err = validator().validate(Some(upload)).await.unwrap_err();
        assert_eq!(err.error_type(), "VCF_VALIDATION_ERROR");
        assert!(err.public_message().contains(".vcf"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_extension_check_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let upload = UploadedFile::from_bytes(Some(dir.path()), "PATIENT.VCF", VCF)
            .await
            .unwrap();
        assert!(validator().validate(Some(upload)).await.is_ok());
    }

    #[tokio::test]
    async fn test_bare_extension_is_not_a_name() {
        let dir = TempDir::new().unwrap();
        let upload = UploadedFile::from_bytes(Some(dir.path()), ".vcf", VCF)
            .await
            .unwrap();
        assert!(validator().validate(Some(upload)).await.is_err());
    }

    #[tokio::test]
    async fn test_oversized_rejected_and_removed() {
        let dir = TempDir::new().unwrap();
        let big = vec![b'A'; 2048];
        let upload = UploadedFile::from_bytes(Some(dir.path()), "big.vcf", &big)
            .await
            .unwrap();
        let path = upload.path().to_path_buf();

        let err = validator().validate(Some(upload)).await.unwrap_err();
        assert!(err.public_message().contains("too large"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_dropped_bytes_count_toward_limit() {
        let dir = TempDir::new().unwrap();
        let mut upload = UploadedFile::from_bytes(Some(dir.path()), "big.vcf", VCF)
            .await
            .unwrap();
        upload.count_dropped(4096);
        assert_eq!(upload.size(), VCF.len() as u64 + 4096);
        let err = validator().validate(Some(upload)).await.unwrap_err();
        assert!(err.public_message().contains("too large"));
    }

    #[tokio::test]
    async fn test_empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let upload = UploadedFile::from_bytes(Some(dir.path()), "empty.vcf", b"")
            .await
            .unwrap();
        let path = upload.path().to_path_buf();
        let err = validator().validate(Some(upload)).await.unwrap_err();
        assert_eq!(err.public_message(), MSG_EMPTY_FILE);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_valid_upload_kept_until_discarded() {
        let dir = TempDir::new().unwrap();
        let upload = UploadedFile::from_bytes(Some(dir.path()), "ok.vcf", VCF)
            .await
            .unwrap();
        let upload = validator().validate(Some(upload)).await.unwrap();
        assert_eq!(upload.size(), VCF.len() as u64);
        let path = upload.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), VCF);

        upload.discard();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = {
            let upload = UploadedFile::from_bytes(Some(dir.path()), "ok.vcf", VCF)
                .await
                .unwrap();
            upload.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_copy_from_leaves_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("input.vcf");
        std::fs::write(&source, VCF).unwrap();

        let upload = UploadedFile::copy_from(Some(dir.path()), &source).await.unwrap();
        assert_eq!(upload.original_name(), "input.vcf");
        assert_eq!(upload.size(), VCF.len() as u64);
        upload.discard();
        assert!(source.exists());
    }

    #[test]
    fn test_parse_drugs_comma_separated() {
        let drugs = parse_drugs(Some(" WARFARIN, CODEINE ,,SIMVASTATIN ")).unwrap();
        assert_eq!(drugs, vec!["WARFARIN", "CODEINE", "SIMVASTATIN"]);
    }

    #[test]
    fn test_parse_drugs_keeps_duplicates() {
        let drugs = parse_drugs(Some("CODEINE,CODEINE")).unwrap();
        assert_eq!(drugs.len(), 2);
    }

    #[test]
    fn test_parse_drugs_json_array() {
        let drugs = parse_drugs(Some(r#"["WARFARIN", " CODEINE ", ""]"#)).unwrap();
        assert_eq!(drugs, vec!["WARFARIN", "CODEINE"]);
    }

    #[test]
    fn test_parse_drugs_rejects_blank() {
        for raw in [None, Some(""), Some("   "), Some(" , ,, "), Some("[]")] {
            let err = parse_drugs(raw).unwrap_err();
            assert_eq!(err.error_type(), "INPUT_VALIDATION", "input: {:?}", raw);
        }
    }
}
