//! File-based paper PDF storage
//!
//! Stores uploaded PDFs under the data directory.
//! Structure: {DATA_DIR}/papers/{paper_id}/{file_name}
//!
//! The path recorded on the paper is relative to the data directory.

use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const PAPERS_DIR: &str = "papers";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Largest accepted upload
pub const MAX_PDF_SIZE: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredFile {
    pub relative_path: String,
    pub size: i64,
}

#[derive(Debug, Clone)]
pub struct PaperStorage {
    root: PathBuf,
}

/// Accepts a bare `*.pdf` file name without path separators
pub fn validate_pdf_file_name(file_name: &str) -> Result<()> {
    if file_name.trim().is_empty() {
        bail!("File name cannot be empty");
    }
    if file_name.len() > 255 {
        bail!("File name is too long (max 255 characters)");
    }
    if file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        bail!("File name must not contain path components");
    }
    if !file_name.to_lowercase().ends_with(".pdf") {
        bail!("Only PDF files are accepted");
    }
    Ok(())
}

impl PaperStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: data_dir.into(),
        }
    }

    fn paper_dir(&self, paper_id: i64) -> PathBuf {
        self.root.join(PAPERS_DIR).join(paper_id.to_string())
    }

    /// Writes the PDF of a paper, replacing a file of the same name
    pub async fn save_pdf(&self, paper_id: i64, file_name: &str, bytes: &[u8]) -> Result<StoredFile> {
        validate_pdf_file_name(file_name)?;
        if bytes.len() > MAX_PDF_SIZE {
            bail!("PDF is too large (max {} bytes)", MAX_PDF_SIZE);
        }
        if !bytes.starts_with(PDF_MAGIC) {
            bail!("Uploaded file is not a PDF");
        }

        let dir = self.paper_dir(paper_id);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create paper directory {}", dir.display()))?;

        let path = dir.join(file_name);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write PDF to {}", path.display()))?;

        tracing::debug!(paper_id, file_name, size = bytes.len(), "Saved paper PDF");

        Ok(StoredFile {
            relative_path: format!("{}/{}/{}", PAPERS_DIR, paper_id, file_name),
            size: bytes.len() as i64,
        })
    }

    fn stored_path(&self, relative_path: &str) -> Result<PathBuf> {
        let relative = Path::new(relative_path);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("Invalid stored file path: {}", relative_path);
        }
        Ok(self.root.join(relative))
    }

    /// Reads a previously stored PDF by the path recorded on the paper
    pub async fn load_pdf(&self, relative_path: &str) -> Result<Option<Vec<u8>>> {
        let path = self.stored_path(relative_path)?;
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&path)
            .await
            .with_context(|| format!("Failed to read PDF from {}", path.display()))?;

        Ok(Some(bytes))
    }

    /// Deletes a stored PDF. Returns false when it was already gone.
    pub async fn remove_pdf(&self, relative_path: &str) -> Result<bool> {
        let path = self.stored_path(relative_path)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed paper PDF");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
        }
    }
}
