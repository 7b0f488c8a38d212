//! Logging setup: fmt output plus an in-memory buffer of recent entries

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Maximum number of log entries to keep in memory
const MAX_LOG_ENTRIES: usize = 500;

static LOG_BUFFER: Lazy<RwLock<VecDeque<LogEntry>>> =
    Lazy::new(|| RwLock::new(VecDeque::with_capacity(MAX_LOG_ENTRIES)));
static LOG_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Serialize, Clone, Debug)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: String,
    pub level: String,
    pub source: String,
    pub message: String,
}

fn add_log_entry(level: &str, source: &str, message: String) {
    let entry = LogEntry {
        id: LOG_COUNTER.fetch_add(1, Ordering::SeqCst),
        timestamp: chrono::Local::now().format("%H:%M:%S%.3f").to_string(),
        level: level.to_string(),
        source: source.to_string(),
        message,
    };

    if let Ok(mut buffer) = LOG_BUFFER.write() {
        if buffer.len() >= MAX_LOG_ENTRIES {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }
}

/// Most recent entries first, optionally filtered by level.
pub fn recent_logs(count: Option<usize>, level_filter: Option<&str>) -> Vec<LogEntry> {
    let buffer = match LOG_BUFFER.read() {
        Ok(b) => b,
        Err(_) => return vec![],
    };

    buffer
        .iter()
        .rev()
        .filter(|entry| {
            level_filter.map_or(true, |filter| entry.level.eq_ignore_ascii_case(filter))
        })
        .take(count.unwrap_or(100))
        .cloned()
        .collect()
}

/// Tracing layer that copies every event into the in-memory buffer.
pub struct LogBufferLayer;

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(&mut self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(&mut self.message, "{:?}", value);
        } else {
            let _ = write!(&mut self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S> Layer<S> for LogBufferLayer
where
    S: tracing::Subscriber,
{
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let metadata = event.metadata();
        let level = metadata.level().to_string();
        let target = metadata.target();
        let source = target.split("::").last().unwrap_or(target);

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let message = match (visitor.message.is_empty(), visitor.fields.is_empty()) {
            (true, true) => format!("[{}]", target),
            (true, false) => visitor.fields.trim_start().to_string(),
            _ => visitor.message + &visitor.fields,
        };

        add_log_entry(&level, source, message);
    }
}

/// Initialize the tracing subscriber with fmt output and log buffer capture.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(LogBufferLayer)
        .init();
}
