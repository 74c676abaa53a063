//! Per-client logging built on `tracing` and `tracing-subscriber`.
//!
//! A [`LogSettings`] turns into a [`tracing::Dispatch`] that the [`Client`]
//! installs only while it executes a request. The library never sets the
//! global subscriber; a client built without log settings emits its events
//! to whatever subscriber the application installed.
//!
//! # Log Levels
//!
//! - `error`: non-2xx responses
//! - `warn`: retried requests
//! - `info`: one line per request, pager metadata
//! - `debug`: each page fetched, each period probed by the resolver
//!
//! [`Client`]: crate::Client

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use tracing::Dispatch;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self as layer_fmt, MakeWriter, writer::BoxMakeWriter},
    layer::SubscriberExt,
};

use crate::error::{Error, Result};

/// Output format for log records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable single-line text.
    Text,
}

impl FromStr for LogFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "plain" | "pretty" => Ok(LogFormat::Text),
            other => Err(Error::Config(format!("unknown log format `{other}`"))),
        }
    }
}

/// Where log records go.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LogDestination {
    #[default]
    Stderr,
    Stdout,
    /// Appended to; created if missing.
    File(PathBuf),
}

impl LogDestination {
    /// `stderr` and `stdout` name the streams; anything else is a file path.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "" | "stderr" => LogDestination::Stderr,
            "stdout" => LogDestination::Stdout,
            path => LogDestination::File(PathBuf::from(path)),
        }
    }
}

impl fmt::Display for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogDestination::Stderr => f.write_str("stderr"),
            LogDestination::Stdout => f.write_str("stdout"),
            LogDestination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub destination: LogDestination,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::WARN,
            format: LogFormat::default(),
            destination: LogDestination::default(),
        }
    }
}

impl LogSettings {
    #[must_use]
    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_destination(mut self, destination: LogDestination) -> Self {
        self.destination = destination;
        self
    }

    /// Builds the dispatcher the client installs around each request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LogDestination`] if the log file cannot be opened.
    pub fn build_dispatch(&self) -> Result<Dispatch> {
        let writer = match &self.destination {
            LogDestination::Stderr => BoxMakeWriter::new(io::stderr),
            LogDestination::Stdout => BoxMakeWriter::new(io::stdout),
            LogDestination::File(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|source| Error::LogDestination {
                        path: path.clone(),
                        source,
                    })?;
                BoxMakeWriter::new(SharedFileWriter::new(file))
            }
        };

        let registry = tracing_subscriber::registry().with(build_filter(self.level));
        let dispatch = match self.format {
            LogFormat::Json => Dispatch::new(
                registry.with(layer_fmt::layer().json().with_writer(writer)),
            ),
            LogFormat::Text => Dispatch::new(
                registry.with(
                    layer_fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false),
                ),
            ),
        };
        Ok(dispatch)
    }
}

/// Parses a level name, accepting Python-style `WARNING` and `CRITICAL`.
pub fn parse_level(s: &str) -> Option<LevelFilter> {
    let level = match s.trim().to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "info" => LevelFilter::INFO,
        "warn" | "warning" => LevelFilter::WARN,
        "error" | "critical" | "fatal" => LevelFilter::ERROR,
        "off" | "none" => LevelFilter::OFF,
        _ => return None,
    };
    Some(level)
}

/// Only this crate's events; dependencies stay quiet.
fn build_filter(level: LevelFilter) -> EnvFilter {
    EnvFilter::new(format!("off,dhis2={level}"))
}

#[derive(Clone)]
struct SharedFileWriter {
    file: Arc<Mutex<File>>,
}

impl SharedFileWriter {
    fn new(file: File) -> Self {
        Self {
            file: Arc::new(Mutex::new(file)),
        }
    }
}

struct SharedFileGuard {
    file: Arc<Mutex<File>>,
}

impl Write for SharedFileGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|_| io::Error::other("log file lock poisoned"))?;
        guard.flush()
    }
}

impl<'a> MakeWriter<'a> for SharedFileWriter {
    type Writer = SharedFileGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedFileGuard {
            file: Arc::clone(&self.file),
        }
    }
}
