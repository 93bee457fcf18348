use chrono::format::{Item, StrftimeItems};
use chrono::{FixedOffset, Local, Utc};
use chrono_tz::Tz;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_core::{Event, Level, Subscriber};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::LoggingConfig;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const LOG_TARGET_PREFIX: &str = "deploy_hook";

pub type LogLevel = Level;

/// Timezone used for log line timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogTimezone {
    Utc,
    Local,
    Fixed(FixedOffset),
    Named(Tz),
}

impl LogTimezone {
    /// Accepts `UTC`, `Local`, a fixed offset like `+02:00` or an IANA name
    /// like `Europe/Istanbul`. Anything else yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" | "UTC" | "utc" | "Z" => Some(LogTimezone::Utc),
            "Local" | "local" => Some(LogTimezone::Local),
            other => other
                .parse::<FixedOffset>()
                .map(LogTimezone::Fixed)
                .ok()
                .or_else(|| other.parse::<Tz>().ok().map(LogTimezone::Named)),
        }
    }
}

/// A usable strftime format: no invalid specifiers and at least one `%` field.
fn is_usable_date_format(format: &str) -> bool {
    format.contains('%') && !StrftimeItems::new(format).any(|item| item == Item::Error)
}

/// Problems in the logging section that fall back to defaults, worded for
/// the operator. Reported once logging is installed.
pub fn config_warnings(config: &LoggingConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    if !config.enabled {
        return warnings;
    }
    if !config.date_format.is_empty() && !is_usable_date_format(&config.date_format) {
        warnings.push(format!(
            "Log date format '{}' is not a strftime format (e.g. '{}'), using the default",
            config.date_format, DEFAULT_DATE_FORMAT
        ));
    }
    if LogTimezone::parse(&config.timezone).is_none() {
        warnings.push(format!(
            "Unsupported log timezone '{}', falling back to UTC",
            config.timezone
        ));
    }
    warnings
}

/// File sink for deployment log lines: `<timestamp> - [LEVEL] <message>`.
///
/// The file is opened on the first `emit`, so a hook that never logs never
/// creates it.
pub struct DeployLog {
    path: PathBuf,
    date_format: String,
    timezone: LogTimezone,
    writer: Mutex<Option<RollingFileAppender>>,
}

impl DeployLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            timezone: LogTimezone::Utc,
            writer: Mutex::new(None),
        }
    }

    /// Keeps the default format unless `format` is a usable strftime format.
    /// PHP-style formats such as `Y-m-d H:i:s` carry no `%` and are rejected.
    pub fn with_date_format(mut self, format: &str) -> Self {
        if is_usable_date_format(format) {
            self.date_format = format.to_string();
        }
        self
    }

    pub fn with_timezone(mut self, timezone: LogTimezone) -> Self {
        self.timezone = timezone;
        self
    }

    /// Builds a sink from the logging section, or `None` when logging is disabled.
    pub fn from_config(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let timezone = LogTimezone::parse(&config.timezone).unwrap_or(LogTimezone::Utc);
        Some(
            Self::new(&config.log_file_path)
                .with_date_format(&config.date_format)
                .with_timezone(timezone),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line to the log file.
    pub fn emit(&self, level: LogLevel, message: &str) -> io::Result<()> {
        let line = format!("{} - [{}] {}\n", self.timestamp(), level, message);
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("deploy log writer poisoned"))?;
        if guard.is_none() {
            *guard = Some(self.open()?);
        }
        match guard.as_mut() {
            Some(writer) => {
                writer.write_all(line.as_bytes())?;
                writer.flush()
            }
            None => Ok(()),
        }
    }

    fn open(&self) -> io::Result<RollingFileAppender> {
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid log file path {}", self.path.display()),
                )
            })?;
        let directory = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(file_name)
            .build(directory)
            .map_err(io::Error::other)
    }

    fn timestamp(&self) -> String {
        let now = Utc::now();
        match self.timezone {
            LogTimezone::Utc => now.format(&self.date_format).to_string(),
            LogTimezone::Local => now
                .with_timezone(&Local)
                .format(&self.date_format)
                .to_string(),
            LogTimezone::Fixed(offset) => now
                .with_timezone(&offset)
                .format(&self.date_format)
                .to_string(),
            LogTimezone::Named(tz) => now
                .with_timezone(&tz)
                .format(&self.date_format)
                .to_string(),
        }
    }
}

/// Helper to extract the log message
#[derive(Default)]
struct MessageVisitor {
    message: String,
}

impl tracing::field::Visit for MessageVisitor {
    fn record_str(&mut self, field: &tracing_core::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &tracing_core::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        }
    }
}

/// Forwards this crate's INFO, WARN and ERROR events to a `DeployLog`.
#[derive(Clone)]
pub struct DeployLogLayer {
    sink: Arc<DeployLog>,
}

impl DeployLogLayer {
    pub fn new(sink: Arc<DeployLog>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> Arc<DeployLog> {
        Arc::clone(&self.sink)
    }
}

impl<S: Subscriber> Layer<S> for DeployLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let metadata = event.metadata();
        if *metadata.level() > Level::INFO || !metadata.target().starts_with(LOG_TARGET_PREFIX) {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        if let Err(e) = self.sink.emit(*metadata.level(), &visitor.message) {
            eprintln!(
                "Failed to write deploy log {}: {}",
                self.sink.path().display(),
                e
            );
        }
    }
}

/// Install console logging (filtered by `RUST_LOG`) plus the deploy log file
/// layer when enabled in config.
pub fn setup_logging(config: &LoggingConfig) -> Option<Arc<DeployLog>> {
    let sink = DeployLog::from_config(config).map(Arc::new);
    let console = tracing_subscriber::fmt::layer()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    tracing_subscriber::registry()
        .with(console)
        .with(sink.clone().map(DeployLogLayer::new))
        .init();

    for warning in config_warnings(config) {
        warn!("{}", warning);
    }
    sink
}
