//! Batch completion: audit file, success notification and the final summary

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

use crate::alerts::UserAlerts;
use crate::api::{NotificationRoute, SuccessNotifier};
use crate::audit::FailureAuditFile;
use crate::deeplink::PrintMode;
use crate::error::StepError;
use crate::runner::BatchState;

/// What a finished batch reports back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub mode: String,
    /// Frame numbers in the request, duplicates included.
    pub total: usize,
    /// Frame-number attempts whose documents all printed.
    pub succeeded: usize,
    pub succeeded_identifiers: Vec<String>,
    pub failed_identifiers: Vec<String>,
    pub failed_entries: Vec<String>,
    /// Documents that could not be spooled or printed.
    pub failed_documents: usize,
    /// Kept audit file, only present when something failed.
    pub audit_file: Option<PathBuf>,
    pub notified: Option<NotifiedRoute>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotifiedRoute {
    PrintingSuccess,
    ReprintingSuccess,
}

impl From<NotificationRoute> for NotifiedRoute {
    fn from(route: NotificationRoute) -> Self {
        match route {
            NotificationRoute::PrintingSuccess => NotifiedRoute::PrintingSuccess,
            NotificationRoute::ReprintingSuccess => NotifiedRoute::ReprintingSuccess,
        }
    }
}

impl BatchSummary {
    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    pub fn message(&self) -> String {
        format!(
            "Printing framenumbers has been finished with {} success and {} fail",
            self.succeeded,
            self.failed()
        )
    }
}

/// Consumes the final [`BatchState`]. Holds no state of its own.
pub struct Reporter {
    notifier: Arc<dyn SuccessNotifier>,
    alerts: Arc<dyn UserAlerts>,
}

impl Reporter {
    pub fn new(notifier: Arc<dyn SuccessNotifier>, alerts: Arc<dyn UserAlerts>) -> Self {
        Self { notifier, alerts }
    }

    pub async fn finish(
        &self,
        mode: &PrintMode,
        state: BatchState,
        audit: Option<FailureAuditFile>,
    ) -> BatchSummary {
        let audit_file = match audit {
            Some(audit) => self.settle_audit(audit, state.failed_entries()).await,
            None => None,
        };

        let notified = self.notify(mode, state.succeeded_identifiers()).await;

        let summary = BatchSummary {
            mode: mode.to_string(),
            total: state.total(),
            succeeded: state.succeeded_attempts(),
            succeeded_identifiers: state.succeeded_identifiers().to_vec(),
            failed_identifiers: state.failed_identifiers().to_vec(),
            failed_entries: state.failed_entries().to_vec(),
            failed_documents: state.failed_documents(),
            audit_file,
            notified,
        };

        self.alerts.info("Print Finished", &summary.message());
        summary
    }

    async fn settle_audit(
        &self,
        audit: FailureAuditFile,
        failed_entries: &[String],
    ) -> Option<PathBuf> {
        if failed_entries.is_empty() {
            let path = audit.path().to_path_buf();
            match audit.discard().await {
                Ok(()) => tracing::info!(path = %path.display(), "deleted empty failed-print file"),
                Err(e) => tracing::error!("{}", StepError::from(e)),
            }
            return None;
        }

        match audit.append(failed_entries).await {
            Ok(()) => {
                tracing::info!(path = %audit.path().display(), "failed frame numbers appended")
            }
            Err(e) => tracing::error!("{}", StepError::from(e)),
        }
        Some(audit.path().to_path_buf())
    }

    async fn notify(&self, mode: &PrintMode, succeeded: &[String]) -> Option<NotifiedRoute> {
        if succeeded.is_empty() {
            return None;
        }

        let route = NotificationRoute::for_mode(mode);
        match self.notifier.notify(route, succeeded).await {
            Ok(()) => {
                tracing::info!(
                    route = route.path(),
                    count = succeeded.len(),
                    "notified succeeded frame numbers"
                );
                Some(route.into())
            }
            Err(e) => {
                tracing::error!("{}", StepError::from(e));
                None
            }
        }
    }
}
