//! Log sink adapter
//!
//! Every component logs through `tracing`. Hosts that ship their own logger
//! (Android logcat, os_log, a Dart isolate) implement [`LogSink`] and pass it to
//! [`init_logging`]; events are then forwarded to it as `(tag, message, level)`
//! lines. Without a sink the default `fmt` output is used.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Severity of a forwarded log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "ERROR"),
            Self::Warn => write!(f, "WARN"),
            Self::Info => write!(f, "INFO"),
            Self::Debug => write!(f, "DEBUG"),
            Self::Trace => write!(f, "TRACE"),
        }
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::ERROR => Self::Error,
            tracing::Level::WARN => Self::Warn,
            tracing::Level::INFO => Self::Info,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::TRACE => Self::Trace,
        }
    }
}

/// External log sink supplied by the host
pub trait LogSink: Send + Sync {
    fn log(&self, tag: &str, message: &str, level: LogLevel);
}

/// `tracing` layer that forwards every event to a [`LogSink`]
pub struct SinkLayer {
    sink: Arc<dyn LogSink>,
}

impl SinkLayer {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }
}

impl<S> Layer<S> for SinkLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);

        self.sink.log(
            tag_for(metadata.target()),
            &visitor.into_line(),
            LogLevel::from(*metadata.level()),
        );
    }
}

/// Last path segment of a tracing target, e.g. `connection` for
/// `walletnotify_core::connection`.
fn tag_for(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: Vec<String>,
}

impl LineVisitor {
    fn into_line(self) -> String {
        if self.fields.is_empty() {
            return self.message;
        }
        if self.message.is_empty() {
            return self.fields.join(" ");
        }
        format!("{} {}", self.message, self.fields.join(" "))
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Install the global subscriber (idempotent).
///
/// `RUST_LOG` wins over `default_filter`. Returns `false` when a global
/// subscriber was already installed, in which case nothing changes.
pub fn init_logging(sink: Option<Arc<dyn LogSink>>, default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = match sink {
        Some(sink) => tracing_subscriber::registry()
            .with(filter)
            .with(SinkLayer::new(sink))
            .try_init(),
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init(),
    };

    installed.is_ok()
}
