//! Wires configuration and collaborators into a ready-to-use print helper

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::alerts::UserAlerts;
use crate::api::ApiClient;
use crate::auth::Session;
use crate::config::Config;
use crate::deeplink::{self, PrintJobRequest};
use crate::error::{BusyError, DecodeError};
use crate::guard::PrintGuard;
use crate::printer::SystemPrinter;
use crate::progress::ProgressSink;
use crate::report::BatchSummary;
use crate::runner::{BatchRunner, Collaborators, RunnerOptions};
use crate::spool::DirSpool;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Busy(#[from] BusyError),
}

/// Application state shared by the CLI and the resident server.
pub struct PrintHelper {
    scheme: String,
    session: Session,
    runner: Arc<BatchRunner>,
    alerts: Arc<dyn UserAlerts>,
}

impl PrintHelper {
    /// Build the production helper: HTTP fetcher and notifier, directory
    /// spool and the system printer.
    pub fn from_config(
        config: &Config,
        progress: Arc<dyn ProgressSink>,
        alerts: Arc<dyn UserAlerts>,
    ) -> Result<Self, reqwest::Error> {
        let session = Session::from_cookie_header(config.session_cookie.as_deref());
        let api = Arc::new(ApiClient::new(
            &config.base_url,
            session.clone(),
            config.request_timeout(),
        )?);

        let collaborators = Collaborators {
            fetcher: api.clone(),
            printer: Arc::new(SystemPrinter::new(config.printer.clone())),
            spool: Arc::new(DirSpool::new(config.spool_dir())),
            notifier: api,
            progress,
            alerts: Arc::clone(&alerts),
        };
        let options = RunnerOptions {
            audit_dir: config.audit_dir(),
            document_order: config.document_order,
            release_guard_on_step_error: config.release_guard_on_step_error,
        };
        let runner = Arc::new(BatchRunner::new(collaborators, PrintGuard::new(), options));

        Ok(Self::with_runner(&config.scheme, session, runner, alerts))
    }

    pub fn with_runner(
        scheme: &str,
        session: Session,
        runner: Arc<BatchRunner>,
        alerts: Arc<dyn UserAlerts>,
    ) -> Self {
        Self {
            scheme: scheme.to_string(),
            session,
            runner,
            alerts,
        }
    }

    pub fn runner(&self) -> &Arc<BatchRunner> {
        &self.runner
    }

    pub fn decode(&self, activation: &str) -> Result<PrintJobRequest, ActivationError> {
        deeplink::decode(activation, &self.scheme).map_err(|e| {
            tracing::warn!(activation, "ignoring activation: {}", e);
            ActivationError::from(e)
        })
    }

    /// Decode and run a batch, waiting for it to finish.
    pub async fn run_activation(&self, activation: &str) -> Result<BatchSummary, ActivationError> {
        let request = self.decode(activation)?;
        Ok(self.run_request(request).await?)
    }

    /// Run an already decoded request, waiting for it to finish.
    pub async fn run_request(&self, request: PrintJobRequest) -> Result<BatchSummary, BusyError> {
        let ticket = self.claim()?;
        self.session.check_before_batch();
        Ok(self.runner.run_claimed(request, ticket).await)
    }

    /// Decode, claim the busy guard and run the batch in the background.
    /// Busy and decode errors are reported before anything is spawned.
    pub fn start_activation(
        &self,
        activation: &str,
    ) -> Result<JoinHandle<BatchSummary>, ActivationError> {
        let request = self.decode(activation)?;
        let ticket = self.claim()?;
        self.session.check_before_batch();

        let runner = Arc::clone(&self.runner);
        Ok(tokio::spawn(async move { runner.run_claimed(request, ticket).await }))
    }

    fn claim(&self) -> Result<crate::guard::BatchTicket, BusyError> {
        self.runner.claim().map_err(|e| {
            self.alerts.error("Printer is busy", &e.to_string());
            e
        })
    }
}
