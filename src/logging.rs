// Logging setup and in-memory log capture

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::{EnvFilter, Layer};

/// Maximum number of log entries to keep in buffer
const DEFAULT_BUFFER_CAPACITY: usize = 1000;

/// Output format for the global subscriber
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Parse log format from string, defaulting to text
pub fn parse_log_format(s: &str) -> LogFormat {
    match s.to_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

/// Install the global subscriber. `RUST_LOG` overrides `log_level`.
pub fn init(log_level: &str, format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

/// One captured log event
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub level: Level,
    /// Message followed by every recorded field as `name=value`
    pub line: String,
}

/// Tracing layer that stores every event in a shared bounded buffer
pub struct CaptureLayer {
    /// Shared buffer for log entries
    buffer: Arc<Mutex<VecDeque<LogEntry>>>,
    /// Maximum buffer capacity
    capacity: usize,
    /// Least severe level to capture
    min_level: Level,
}

impl CaptureLayer {
    /// Capture everything down to TRACE
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::new())),
            capacity: DEFAULT_BUFFER_CAPACITY,
            min_level: Level::TRACE,
        }
    }

    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Keep at most `capacity` entries, never fewer than one
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Handle for reading captured entries after the layer is installed
    pub fn handle(&self) -> CapturedLogs {
        CapturedLogs {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

impl Default for CaptureLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.level() > &self.min_level {
            return;
        }

        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        let entry = LogEntry {
            timestamp: chrono::Utc::now(),
            level: *metadata.level(),
            line: visitor.finish(),
        };

        if let Ok(mut buffer) = self.buffer.lock() {
            while buffer.len() >= self.capacity {
                buffer.pop_front();
            }
            buffer.push_back(entry);
        }
    }
}

/// Read side of a `CaptureLayer`
#[derive(Clone)]
pub struct CapturedLogs {
    buffer: Arc<Mutex<VecDeque<LogEntry>>>,
}

impl CapturedLogs {
    pub fn entries(&self) -> Vec<LogEntry> {
        self.buffer
            .lock()
            .map(|b| b.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.line).collect()
    }

    /// Whether any captured line contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|e| e.line.contains(needle))
    }
}

/// Flattens the message and all fields into one line
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl tracing::field::Visit for LineVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }
}
