//! Temporary files holding documents while they are printed

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::SpoolError;

/// Where document payloads wait for the print subsystem.
#[async_trait]
pub trait Spool: Send + Sync {
    /// Persist a payload under a unique name. On failure the error carries
    /// the path that was attempted so the caller can still clean it up.
    async fn write(&self, payload: &[u8]) -> Result<PathBuf, SpoolError>;

    async fn remove(&self, path: &Path) -> Result<(), SpoolError>;
}

/// Spool backed by a directory, one `<uuid>.pdf` per document.
#[derive(Debug, Clone)]
pub struct DirSpool {
    dir: PathBuf,
}

impl DirSpool {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl Spool for DirSpool {
    async fn write(&self, payload: &[u8]) -> Result<PathBuf, SpoolError> {
        let path = self.dir.join(format!("{}.pdf", Uuid::new_v4()));

        let result = match tokio::fs::create_dir_all(&self.dir).await {
            Ok(()) => tokio::fs::write(&path, payload).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Ok(path),
            Err(source) => Err(SpoolError::Write { path, source }),
        }
    }

    async fn remove(&self, path: &Path) -> Result<(), SpoolError> {
        tokio::fs::remove_file(path)
            .await
            .map_err(|source| SpoolError::Delete {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_unique_files_and_removes_them() {
        let tmp = tempfile::tempdir().unwrap();
        let spool = DirSpool::new(tmp.path().join("spool"));

        let a = spool.write(b"%PDF-a").await.unwrap();
        let b = spool.write(b"%PDF-b").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.extension().unwrap(), "pdf");
        assert_eq!(std::fs::read(&a).unwrap(), b"%PDF-a");

        spool.remove(&a).await.unwrap();
        spool.remove(&b).await.unwrap();
        assert!(!a.exists());
        assert!(!b.exists());
    }

    #[tokio::test]
    async fn removing_missing_file_reports_delete_error() {
        let tmp = tempfile::tempdir().unwrap();
        let spool = DirSpool::new(tmp.path());
        let err = spool.remove(&tmp.path().join("gone.pdf")).await.unwrap_err();
        assert!(matches!(err, SpoolError::Delete { .. }));
    }
}
