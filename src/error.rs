//! Error types for every step of a print batch

use std::path::PathBuf;
use thiserror::Error;

/// A malformed activation string. The batch never starts.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("activation does not start with {expected}")]
    WrongScheme { expected: String },
    #[error("activation has no '-' between the mode and the frame numbers")]
    MissingSeparator,
    #[error("activation contains no frame numbers")]
    EmptyIdentifiers,
    #[error("no launch arguments to inspect")]
    NoArguments,
}

/// A new activation arrived while another batch is still printing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Currently there is a printing process ongoing. Please try again later")]
pub struct BusyError;

/// Failure to obtain the documents for one frame number.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("document {document_type} is not valid base64: {source}")]
    Payload {
        document_type: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("{0}")]
    Other(String),
}

/// Failure from the OS print subsystem.
#[derive(Debug, Error)]
pub enum PrintError {
    #[error("failed to launch print command: {0}")]
    Io(#[from] std::io::Error),
    #[error("print command failed: {0}")]
    Failed(String),
}

/// Failure writing or removing a temporary document file.
#[derive(Debug, Error)]
pub enum SpoolError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure telling the remote service which frame numbers printed.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Rejected(u16),
}

/// Failure maintaining the failed-print audit file.
#[derive(Debug, Error)]
#[error("audit file {path}: {source}")]
pub struct AuditError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failure talking to the authentication endpoint.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {0}")]
    Rejected(u16),
}

/// Any step-level failure inside a running batch. These are logged and
/// recorded by the runner and never escape it.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("fetch failed for frame number {identifier}: {source}")]
    Fetch {
        identifier: String,
        #[source]
        source: FetchError,
    },
    #[error(transparent)]
    Spool(#[from] SpoolError),
    #[error("failed to print {file} for frame number {identifier}: {source}")]
    Print {
        identifier: String,
        file: String,
        #[source]
        source: PrintError,
    },
    #[error("failed to notify succeeded frame numbers: {0}")]
    Notification(#[from] NotificationError),
    #[error(transparent)]
    Audit(#[from] AuditError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_error_message_matches_dialog_text() {
        assert_eq!(
            BusyError.to_string(),
            "Currently there is a printing process ongoing. Please try again later"
        );
    }

    #[test]
    fn step_error_keeps_spool_message() {
        let err = StepError::from(SpoolError::Delete {
            path: PathBuf::from("/tmp/a.pdf"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
        assert!(err.to_string().starts_with("failed to delete /tmp/a.pdf"));
    }
}
