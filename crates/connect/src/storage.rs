//! Local file storage for invoice PDFs and export archives.
//!
//! Invoices are fetched as base64 from the API and have to live on disk
//! briefly so they can be attached to emails or bundled into export
//! archives.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while working with the local file storage.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("the file could not be created: {path}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the file could not be read: {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the folder could not be created: {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File storage rooted at the connector's temp directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory for invoice PDFs of one invoice key.
    #[must_use]
    pub fn invoice_dir(&self, invoice_key: &str) -> PathBuf {
        self.root.join("invoices").join(invoice_key)
    }

    /// Directory for bulk export archives.
    #[must_use]
    pub fn exports_dir(&self) -> PathBuf {
        self.root.join("exports")
    }

    /// Store a file, creating its parent directory as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the directory or file cannot be
    /// written.
    pub fn store_file(&self, path: &Path, data: &[u8]) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            self.create_directory(parent)?;
        }
        std::fs::write(path, data).map_err(|source| StorageError::WriteFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a file's contents.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::ReadFile`] when the file cannot be read.
    pub fn load_file(&self, path: &Path) -> Result<Vec<u8>, StorageError> {
        std::fs::read(path).map_err(|source| StorageError::ReadFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Create a directory including its parents.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::CreateDir`] when creation fails.
    pub fn create_directory(&self, path: &Path) -> Result<(), StorageError> {
        std::fs::create_dir_all(path).map_err(|source| StorageError::CreateDir {
            path: path.to_path_buf(),
            source,
        })
    }
}
