//! Progress events emitted while a batch prints

use serde::Serialize;
use std::sync::RwLock;
use tokio::sync::mpsc::UnboundedSender;

/// One-way progress notification for whatever is displaying the batch.
///
/// `entries` on the documents events are cumulative for the batch, so a
/// renderer can always redraw from the latest event alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ProgressEvent {
    BatchStarted { total: usize, identifiers: Vec<String> },
    IdentifierStarted { identifier: String },
    DocumentsPrinted { total: usize, entries: Vec<String> },
    DocumentsFailed { total: usize, entries: Vec<String> },
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

impl ProgressSink for UnboundedSender<ProgressEvent> {
    fn emit(&self, event: ProgressEvent) {
        // receiver gone means nobody is watching
        let _ = self.send(event);
    }
}

impl<A: ProgressSink, B: ProgressSink> ProgressSink for (A, B) {
    fn emit(&self, event: ProgressEvent) {
        self.0.emit(event.clone());
        self.1.emit(event);
    }
}

/// Writes progress to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn emit(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::BatchStarted { total, identifiers } => {
                tracing::info!(total, "frame numbers from deep link: {}", identifiers.join(", "));
            }
            ProgressEvent::IdentifierStarted { identifier } => {
                tracing::info!("------- printing frame number: {}", identifier);
            }
            ProgressEvent::DocumentsPrinted { total, entries } => {
                if let Some(last) = entries.last() {
                    tracing::info!(total, "printed {}", last);
                }
            }
            ProgressEvent::DocumentsFailed { total, entries } => {
                if let Some(last) = entries.last() {
                    tracing::warn!(total, "failed {}", last);
                }
            }
        }
    }
}

/// Latest view of a batch, suitable for polling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub identifiers: Vec<String>,
    pub current: Option<String>,
    pub printed: Vec<String>,
    pub failed: Vec<String>,
}

/// Sink that folds events into a [`ProgressSnapshot`].
#[derive(Debug, Default)]
pub struct ProgressBoard {
    snapshot: RwLock<ProgressSnapshot>,
}

impl ProgressBoard {
    pub fn snapshot(&self) -> ProgressSnapshot {
        match self.snapshot.read() {
            Ok(s) => s.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ProgressSink for ProgressBoard {
    fn emit(&self, event: ProgressEvent) {
        let mut snapshot = match self.snapshot.write() {
            Ok(s) => s,
            Err(poisoned) => poisoned.into_inner(),
        };
        match event {
            ProgressEvent::BatchStarted { total, identifiers } => {
                *snapshot = ProgressSnapshot {
                    total,
                    identifiers,
                    ..Default::default()
                };
            }
            ProgressEvent::IdentifierStarted { identifier } => snapshot.current = Some(identifier),
            ProgressEvent::DocumentsPrinted { entries, .. } => snapshot.printed = entries,
            ProgressEvent::DocumentsFailed { entries, .. } => snapshot.failed = entries,
        }
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for std::sync::Arc<T> {
    fn emit(&self, event: ProgressEvent) {
        (**self).emit(event)
    }
}
