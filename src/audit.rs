//! Failed-print audit file, one per batch

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use std::io::ErrorKind;
use tokio::io::AsyncWriteExt;

use crate::error::AuditError;

/// Same-second batches beyond this give up with the last `AlreadyExists`.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// Append-only record of the entries that failed to print in one batch.
///
/// Created empty when the batch starts. At the end of the batch it is either
/// discarded (nothing failed) or filled with one line per failed entry and kept.
#[derive(Debug)]
pub struct FailureAuditFile {
    path: PathBuf,
}

impl FailureAuditFile {
    /// `print_failed_list_<day>_<month>_<year>_<hour>_<minute>_<second>.txt`
    pub fn file_name(at: &DateTime<Local>) -> String {
        Self::numbered_file_name(at, 0)
    }

    /// Name for the `attempt`-th batch started within the same second.
    /// Attempt 0 has no suffix, later ones end in `_<attempt>`.
    fn numbered_file_name(at: &DateTime<Local>, attempt: u32) -> String {
        let stamp = at.format("%-d_%-m_%Y_%-H_%-M_%-S");
        match attempt {
            0 => format!("print_failed_list_{}.txt", stamp),
            n => format!("print_failed_list_{}_{}.txt", stamp, n),
        }
    }

    /// Create a fresh, empty audit file. A file left by an earlier batch with
    /// the same timestamp is never reused or truncated.
    pub async fn create(dir: &Path, at: DateTime<Local>) -> Result<Self, AuditError> {
        tokio::fs::create_dir_all(dir).await.map_err(|source| AuditError {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut attempt = 0;
        loop {
            let path = dir.join(Self::numbered_file_name(&at, attempt));
            let opened = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await;

            match opened {
                Ok(_) => {
                    tracing::info!(path = %path.display(), "file for failed printing created");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    attempt += 1;
                }
                Err(source) => return Err(AuditError { path, source }),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append each entry as its own line.
    pub async fn append(&self, entries: &[String]) -> Result<(), AuditError> {
        let io_err = |source| AuditError { path: self.path.clone(), source };

        let mut file = tokio::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .await
            .map_err(io_err)?;

        let mut text = String::new();
        for entry in entries {
            text.push_str(entry);
            text.push('\n');
        }
        file.write_all(text.as_bytes()).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;
        Ok(())
    }

    /// Delete the file; used when the batch had no failures.
    pub async fn discard(self) -> Result<(), AuditError> {
        tokio::fs::remove_file(&self.path)
            .await
            .map_err(|source| AuditError { path: self.path.clone(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_name_uses_unpadded_local_time() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 2).unwrap();
        assert_eq!(FailureAuditFile::file_name(&at), "print_failed_list_5_3_2024_9_7_2.txt");
    }

    #[tokio::test]
    async fn append_writes_one_line_per_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let audit = FailureAuditFile::create(tmp.path(), Local::now()).await.unwrap();
        assert_eq!(std::fs::read_to_string(audit.path()).unwrap(), "");

        audit
            .append(&["[A] SRUT.pdf".to_string(), "B".to_string()])
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(audit.path()).unwrap(),
            "[A] SRUT.pdf\nB\n"
        );
    }

    #[tokio::test]
    async fn same_second_batches_get_separate_files() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Local.with_ymd_and_hms(2024, 3, 5, 9, 7, 2).unwrap();

        let first = FailureAuditFile::create(tmp.path(), at).await.unwrap();
        first.append(&["A".to_string()]).await.unwrap();

        let second = FailureAuditFile::create(tmp.path(), at).await.unwrap();
        let third = FailureAuditFile::create(tmp.path(), at).await.unwrap();
        assert_eq!(
            second.path().file_name().unwrap(),
            "print_failed_list_5_3_2024_9_7_2_1.txt"
        );
        assert_eq!(
            third.path().file_name().unwrap(),
            "print_failed_list_5_3_2024_9_7_2_2.txt"
        );

        second.discard().await.unwrap();
        assert_eq!(std::fs::read_to_string(first.path()).unwrap(), "A\n");
    }

    #[tokio::test]
    async fn discard_removes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let audit = FailureAuditFile::create(&tmp.path().join("nested"), Local::now())
            .await
            .unwrap();
        let path = audit.path().to_path_buf();
        assert!(path.exists());
        audit.discard().await.unwrap();
        assert!(!path.exists());
    }
}
