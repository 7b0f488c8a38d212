//! Batch print runner
//!
//! Turns a [`PrintJobRequest`] into a strictly sequential series of
//! fetch → spool → print → delete steps. Every step failure is logged and
//! recorded against its frame number; nothing escapes [`BatchRunner::run`]
//! except [`BusyError`] for a batch that never started.

use chrono::Local;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::alerts::UserAlerts;
use crate::api::{DocumentFetcher, SuccessNotifier};
use crate::audit::FailureAuditFile;
use crate::deeplink::{PrintJobRequest, PrintMode};
use crate::document::{Document, DocumentOrder};
use crate::error::{BusyError, SpoolError, StepError};
use crate::guard::{BatchTicket, PrintGuard};
use crate::printer::{PrintOptions, Printer};
use crate::progress::{ProgressEvent, ProgressSink};
use crate::report::{BatchSummary, Reporter};
use crate::spool::Spool;

/// Run-time bookkeeping for one batch, owned by a single `run` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchState {
    total: usize,
    pending: VecDeque<String>,
    succeeded: Vec<String>,
    failed: Vec<String>,
    succeeded_entries: Vec<String>,
    failed_entries: Vec<String>,
    succeeded_attempts: usize,
    failed_documents: usize,
}

impl BatchState {
    pub fn new(identifiers: &[String]) -> Self {
        Self {
            total: identifiers.len(),
            pending: identifiers.iter().cloned().collect(),
            ..Default::default()
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn pending(&self) -> &VecDeque<String> {
        &self.pending
    }

    /// Fully succeeded frame numbers, first-success order, no duplicates.
    pub fn succeeded_identifiers(&self) -> &[String] {
        &self.succeeded
    }

    pub fn failed_identifiers(&self) -> &[String] {
        &self.failed
    }

    pub fn failed_entries(&self) -> &[String] {
        &self.failed_entries
    }

    pub fn succeeded_attempts(&self) -> usize {
        self.succeeded_attempts
    }

    pub fn failed_documents(&self) -> usize {
        self.failed_documents
    }

    /// Record a finished attempt and pop it from the pending queue.
    ///
    /// A frame number is in at most one of the succeeded and failed sets.
    /// When a duplicate fails after an earlier success, failure wins.
    fn finish_identifier(&mut self, identifier: &str, fully_printed: bool) {
        if fully_printed {
            self.succeeded_attempts += 1;
            if !self.failed.iter().any(|id| id == identifier)
                && !self.succeeded.iter().any(|id| id == identifier)
            {
                self.succeeded.push(identifier.to_string());
            }
        } else {
            self.succeeded.retain(|id| id != identifier);
            if !self.failed.iter().any(|id| id == identifier) {
                self.failed.push(identifier.to_string());
            }
        }

        let popped = self.pending.pop_front();
        debug_assert_eq!(popped.as_deref(), Some(identifier));
        tracing::debug!(
            "pop frame number {} from the queue, {} left",
            identifier,
            self.pending.len()
        );
    }
}

/// External collaborators the runner drives.
pub struct Collaborators {
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub printer: Arc<dyn Printer>,
    pub spool: Arc<dyn Spool>,
    pub notifier: Arc<dyn SuccessNotifier>,
    pub progress: Arc<dyn ProgressSink>,
    pub alerts: Arc<dyn UserAlerts>,
}

#[derive(Debug, Clone)]
pub struct RunnerOptions {
    pub audit_dir: PathBuf,
    pub document_order: DocumentOrder,
    /// Release the busy guard as soon as any step fails instead of at the
    /// end of the batch. Remaining steps still run.
    pub release_guard_on_step_error: bool,
}

pub struct BatchRunner {
    fetcher: Arc<dyn DocumentFetcher>,
    printer: Arc<dyn Printer>,
    spool: Arc<dyn Spool>,
    progress: Arc<dyn ProgressSink>,
    alerts: Arc<dyn UserAlerts>,
    reporter: Reporter,
    guard: Arc<PrintGuard>,
    options: RunnerOptions,
}

/// Per-run mutable context threaded through the steps.
struct Run {
    state: BatchState,
    ticket: BatchTicket,
}

impl BatchRunner {
    pub fn new(
        collaborators: Collaborators,
        guard: Arc<PrintGuard>,
        options: RunnerOptions,
    ) -> Self {
        let Collaborators {
            fetcher,
            printer,
            spool,
            notifier,
            progress,
            alerts,
        } = collaborators;

        Self {
            fetcher,
            printer,
            spool,
            progress,
            reporter: Reporter::new(notifier, Arc::clone(&alerts)),
            alerts,
            guard,
            options,
        }
    }

    pub fn guard(&self) -> &Arc<PrintGuard> {
        &self.guard
    }

    /// Claim the busy guard for a batch without starting it yet.
    pub fn claim(&self) -> Result<BatchTicket, BusyError> {
        self.guard.try_acquire()
    }

    /// Run one batch to completion. Refuses with [`BusyError`] while another
    /// batch holds the guard.
    pub async fn run(&self, request: PrintJobRequest) -> Result<BatchSummary, BusyError> {
        let ticket = self.claim()?;
        Ok(self.run_claimed(request, ticket).await)
    }

    /// Run a batch whose guard was already claimed with [`BatchRunner::claim`].
    pub async fn run_claimed(&self, request: PrintJobRequest, ticket: BatchTicket) -> BatchSummary {
        let mode = request.mode().clone();
        let identifiers = request.identifiers();

        tracing::info!("---------- NEW DEEP LINK TRIGGERED ----------");
        tracing::info!(mode = %mode, "printing {} frame numbers", identifiers.len());

        let mut run = Run {
            state: BatchState::new(identifiers),
            ticket,
        };

        let audit = match FailureAuditFile::create(&self.options.audit_dir, Local::now()).await {
            Ok(audit) => Some(audit),
            Err(e) => {
                self.step_failed(&mut run, StepError::from(e));
                None
            }
        };

        self.progress.emit(ProgressEvent::BatchStarted {
            total: identifiers.len(),
            identifiers: identifiers.to_vec(),
        });

        for identifier in identifiers {
            let fully_printed = self.print_identifier(&mut run, identifier, &mode).await;
            run.state.finish_identifier(identifier, fully_printed);
        }

        let Run { state, mut ticket } = run;
        let summary = self.reporter.finish(&mode, state, audit).await;
        ticket.release();
        summary
    }

    async fn print_identifier(&self, run: &mut Run, identifier: &str, mode: &PrintMode) -> bool {
        self.progress.emit(ProgressEvent::IdentifierStarted {
            identifier: identifier.to_string(),
        });

        let documents = match self.fetcher.fetch(identifier, mode).await {
            Ok(documents) => self.options.document_order.apply(documents),
            Err(source) => {
                let err = StepError::Fetch {
                    identifier: identifier.to_string(),
                    source,
                };
                self.alerts.error("Failed to print", &err.to_string());
                self.record_failure(run, identifier.to_string());
                self.step_failed(run, err);
                return false;
            }
        };

        if documents.is_empty() {
            tracing::warn!("no documents returned for frame number {}", identifier);
            self.alerts.error(
                "Failed to print",
                &format!("No documents to print for frame number {}", identifier),
            );
            self.record_failure(run, identifier.to_string());
            return false;
        }

        let mut printed = 0;
        for document in &documents {
            if self.print_document(run, document).await {
                printed += 1;
            }
        }

        printed == documents.len()
    }

    /// Spool, print and delete one document. Returns whether it printed.
    async fn print_document(&self, run: &mut Run, document: &Document) -> bool {
        let identifier = &document.source_identifier;

        let path = match self.spool.write(&document.payload).await {
            Ok(path) => path,
            Err(err) => {
                run.state.failed_documents += 1;
                self.record_failure(run, document.display_entry());
                let attempted = match &err {
                    SpoolError::Write { path, .. } | SpoolError::Delete { path, .. } => {
                        path.clone()
                    }
                };
                self.step_failed(run, StepError::from(err));
                self.cleanup(run, &attempted).await;
                return false;
            }
        };
        let file = file_name(&path);
        tracing::info!("success writing temp file {} for frame number {}", file, identifier);

        let options = PrintOptions {
            silent: true,
            pages: document.page_range().map(str::to_string),
        };

        let printed = match self.printer.print(&path, &options).await {
            Ok(()) => {
                tracing::info!("success printed file {} for frame number {}", file, identifier);
                run.state.succeeded_entries.push(document.display_entry());
                self.progress.emit(ProgressEvent::DocumentsPrinted {
                    total: run.state.succeeded_entries.len(),
                    entries: run.state.succeeded_entries.clone(),
                });
                true
            }
            Err(source) => {
                run.state.failed_documents += 1;
                let err = StepError::Print {
                    identifier: identifier.clone(),
                    file,
                    source,
                };
                self.alerts.error("Failed to print", &err.to_string());
                self.record_failure(run, document.display_entry());
                self.step_failed(run, err);
                false
            }
        };

        self.cleanup(run, &path).await;
        printed
    }

    async fn cleanup(&self, run: &mut Run, path: &Path) {
        match self.spool.remove(path).await {
            Ok(()) => tracing::info!("success deleting file {}", file_name(path)),
            Err(e) => self.step_failed(run, StepError::from(e)),
        }
    }

    fn record_failure(&self, run: &mut Run, entry: String) {
        run.state.failed_entries.push(entry);
        self.progress.emit(ProgressEvent::DocumentsFailed {
            total: run.state.failed_entries.len(),
            entries: run.state.failed_entries.clone(),
        });
    }

    fn step_failed(&self, run: &mut Run, err: StepError) {
        tracing::error!("{}", err);
        if self.options.release_guard_on_step_error && !run.ticket.is_released() {
            tracing::warn!("releasing busy guard after step failure while the batch continues");
            run.ticket.release();
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
