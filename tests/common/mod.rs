#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::sync::Notify;

use tls_print_helper::alerts::UserAlerts;
use tls_print_helper::api::{DocumentFetcher, NotificationRoute, SuccessNotifier};
use tls_print_helper::deeplink::{self, PrintJobRequest, PrintMode};
use tls_print_helper::document::{Document, DocumentOrder};
use tls_print_helper::error::{FetchError, NotificationError, PrintError, SpoolError};
use tls_print_helper::guard::PrintGuard;
use tls_print_helper::printer::{PrintOptions, Printer};
use tls_print_helper::progress::{ProgressBoard, ProgressEvent, ProgressSink};
use tls_print_helper::runner::{BatchRunner, Collaborators, RunnerOptions};
use tls_print_helper::spool::{DirSpool, Spool};

pub const SCHEME: &str = "tls-printing";

pub fn request(url: &str) -> PrintJobRequest {
    deeplink::decode(url, SCHEME).unwrap()
}

/// Pauses a fetch until the test lets it continue.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Payloads starting with `FAIL` make [`FakePrinter`] fail.
#[derive(Default)]
pub struct FakeFetcher {
    responses: HashMap<String, Result<Vec<(String, Vec<u8>)>, String>>,
    gate: Option<(String, Arc<Gate>)>,
    pub calls: Mutex<Vec<(String, PrintMode)>>,
}

impl FakeFetcher {
    pub fn with_docs(mut self, identifier: &str, docs: &[(&str, &str)]) -> Self {
        let docs = docs
            .iter()
            .map(|(kind, content)| (kind.to_string(), content.as_bytes().to_vec()))
            .collect();
        self.responses.insert(identifier.to_string(), Ok(docs));
        self
    }

    pub fn with_error(mut self, identifier: &str, message: &str) -> Self {
        self.responses.insert(identifier.to_string(), Err(message.to_string()));
        self
    }

    pub fn gated(mut self, identifier: &str, gate: Arc<Gate>) -> Self {
        self.gate = Some((identifier.to_string(), gate));
        self
    }

    pub fn called(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(id, _)| id.clone()).collect()
    }
}

#[async_trait]
impl DocumentFetcher for FakeFetcher {
    async fn fetch(&self, identifier: &str, mode: &PrintMode) -> Result<Vec<Document>, FetchError> {
        self.calls.lock().unwrap().push((identifier.to_string(), mode.clone()));

        if let Some((gated, gate)) = &self.gate {
            if gated == identifier {
                gate.entered.notify_one();
                gate.release.notified().await;
            }
        }

        match self.responses.get(identifier) {
            Some(Ok(docs)) => Ok(docs
                .iter()
                .map(|(kind, payload)| Document::new(identifier, kind.as_str(), payload.clone()))
                .collect()),
            Some(Err(message)) => Err(FetchError::Other(message.clone())),
            None => Err(FetchError::Rejected {
                status: 404,
                message: format!("unknown frame number {}", identifier),
            }),
        }
    }
}

#[derive(Default)]
pub struct FakePrinter {
    /// (file contents, options) in submission order
    pub printed: Mutex<Vec<(String, PrintOptions)>>,
}

impl FakePrinter {
    pub fn contents(&self) -> Vec<String> {
        self.printed.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

#[async_trait]
impl Printer for FakePrinter {
    async fn print(&self, file: &Path, options: &PrintOptions) -> Result<(), PrintError> {
        let content = String::from_utf8(tokio::fs::read(file).await?).unwrap();
        self.printed.lock().unwrap().push((content.clone(), options.clone()));
        if content.starts_with("FAIL") {
            return Err(PrintError::Failed("paper jam".into()));
        }
        Ok(())
    }
}

/// Wraps [`DirSpool`], recording every call. Writes of payloads starting
/// with `fail_writes_starting_with` fail without touching the disk, and
/// `fail_removes` makes every removal fail and leave the file in place.
pub struct RecordingSpool {
    inner: DirSpool,
    dir: PathBuf,
    pub writes: Mutex<Vec<PathBuf>>,
    pub failed_writes: Mutex<Vec<PathBuf>>,
    pub removes: Mutex<Vec<PathBuf>>,
    pub fail_writes_starting_with: Mutex<Option<String>>,
    pub fail_removes: AtomicBool,
}

impl RecordingSpool {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            inner: DirSpool::new(dir.clone()),
            dir,
            writes: Mutex::default(),
            failed_writes: Mutex::default(),
            removes: Mutex::default(),
            fail_writes_starting_with: Mutex::default(),
            fail_removes: AtomicBool::new(false),
        }
    }

    pub fn fail_writes_starting_with(&self, prefix: &str) {
        *self.fail_writes_starting_with.lock().unwrap() = Some(prefix.to_string());
    }

    pub fn fail_removes(&self) {
        self.fail_removes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Spool for RecordingSpool {
    async fn write(&self, payload: &[u8]) -> Result<PathBuf, SpoolError> {
        let prefix = self.fail_writes_starting_with.lock().unwrap().clone();
        if let Some(prefix) = prefix {
            if payload.starts_with(prefix.as_bytes()) {
                let n = self.failed_writes.lock().unwrap().len();
                let path = self.dir.join(format!("unwritten-{}.pdf", n));
                self.failed_writes.lock().unwrap().push(path.clone());
                return Err(SpoolError::Write {
                    path,
                    source: io::Error::new(io::ErrorKind::Other, "disk full"),
                });
            }
        }

        let path = self.inner.write(payload).await?;
        self.writes.lock().unwrap().push(path.clone());
        Ok(path)
    }

    async fn remove(&self, path: &Path) -> Result<(), SpoolError> {
        self.removes.lock().unwrap().push(path.to_path_buf());
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(SpoolError::Delete {
                path: path.to_path_buf(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "file in use"),
            });
        }
        self.inner.remove(path).await
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationRoute, Vec<String>)>>,
    pub fail: bool,
}

#[async_trait]
impl SuccessNotifier for RecordingNotifier {
    async fn notify(
        &self,
        route: NotificationRoute,
        identifiers: &[String],
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push((route, identifiers.to_vec()));
        if self.fail {
            return Err(NotificationError::Rejected(500));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAlerts {
    pub errors: Mutex<Vec<(String, String)>>,
    pub infos: Mutex<Vec<(String, String)>>,
}

impl UserAlerts for RecordingAlerts {
    fn error(&self, title: &str, message: &str) {
        self.errors.lock().unwrap().push((title.into(), message.into()));
    }

    fn info(&self, title: &str, message: &str) {
        self.infos.lock().unwrap().push((title.into(), message.into()));
    }
}

pub struct Harness {
    pub tmp: TempDir,
    pub fetcher: Arc<FakeFetcher>,
    pub printer: Arc<FakePrinter>,
    pub spool: Arc<RecordingSpool>,
    pub notifier: Arc<RecordingNotifier>,
    pub alerts: Arc<RecordingAlerts>,
    pub events: UnboundedReceiver<ProgressEvent>,
    pub runner: Arc<BatchRunner>,
}

pub struct HarnessOptions {
    pub document_order: DocumentOrder,
    pub release_guard_on_step_error: bool,
    pub notifier_fails: bool,
    /// Also fold progress into this board.
    pub board: Option<Arc<ProgressBoard>>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            document_order: DocumentOrder::AsFetched,
            release_guard_on_step_error: false,
            notifier_fails: false,
            board: None,
        }
    }
}

impl Harness {
    pub fn new(fetcher: FakeFetcher) -> Self {
        Self::with_options(fetcher, HarnessOptions::default())
    }

    pub fn with_options(fetcher: FakeFetcher, options: HarnessOptions) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(fetcher);
        let printer = Arc::new(FakePrinter::default());
        let spool = Arc::new(RecordingSpool::new(tmp.path().join("spool")));
        let notifier = Arc::new(RecordingNotifier {
            fail: options.notifier_fails,
            ..Default::default()
        });
        let alerts = Arc::new(RecordingAlerts::default());
        let (tx, events) = unbounded_channel();
        let progress: Arc<dyn ProgressSink> = match options.board {
            Some(board) => Arc::new((tx, board)),
            None => Arc::new(tx),
        };

        let runner = BatchRunner::new(
            Collaborators {
                fetcher: fetcher.clone(),
                printer: printer.clone(),
                spool: spool.clone(),
                notifier: notifier.clone(),
                progress,
                alerts: alerts.clone(),
            },
            PrintGuard::new(),
            RunnerOptions {
                audit_dir: tmp.path().join("audit"),
                document_order: options.document_order,
                release_guard_on_step_error: options.release_guard_on_step_error,
            },
        );

        Self {
            tmp,
            fetcher,
            printer,
            spool,
            notifier,
            alerts,
            events,
            runner: Arc::new(runner),
        }
    }

    pub fn drain_events(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn audit_files(&self) -> Vec<PathBuf> {
        let dir = self.tmp.path().join("audit");
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with("print_failed_list_"))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => vec![],
        }
    }

    pub fn spool_is_empty(&self) -> bool {
        self.spool_files() == 0
    }

    pub fn spool_files(&self) -> usize {
        match std::fs::read_dir(self.tmp.path().join("spool")) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}
