//! Process-wide structured logging built on `tracing`.
//!
//! The entry point calls [`init_global`] once before any component runs.
//! Later calls swap the active configuration in place, so every emitter
//! picks up the replacement. There is no implicit initialisation:
//! [`current`] fails until a logger has been installed.

use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError, RwLock};
use std::time::{Duration, SystemTime};

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::ContentLimit;
use serde::{Deserialize, Serialize};
use tracing::field::Empty;
use tracing::{Level, Span};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Layer, Registry};

use crate::utils::error::{AppError, Result};
use crate::utils::log_format::ServiceFormat;
use crate::utils::sampling::Sampler;

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

const DEFAULT_SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
const DEFAULT_MAX_SIZE_MB: u64 = 128;
const DEFAULT_MAX_BACKUPS: usize = 7;
const DEFAULT_MAX_AGE_DAYS: u64 = 7;
const SECS_PER_DAY: u64 = 24 * 60 * 60;
const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    Json,
    Console,
}

/// Size/age/count-bounded rotating file sink.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRotate {
    pub filename: String,
    /// Megabytes before the active file is rotated.
    pub max_size: u64,
    pub max_backups: usize,
    /// Days a rotated file is kept.
    pub max_age: u64,
    pub compress: bool,
    pub enable: bool,
}

impl FileRotate {
    fn for_path(path: &str) -> Self {
        Self {
            filename: path.to_string(),
            max_size: DEFAULT_MAX_SIZE_MB,
            max_backups: DEFAULT_MAX_BACKUPS,
            max_age: DEFAULT_MAX_AGE_DAYS,
            compress: true,
            enable: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace|debug|info|warn|error, anything else means info
    pub level: String,
    pub encoding: Encoding,
    pub development: bool,
    pub enable_caller: bool,
    pub enable_stacktrace: bool,
    pub sampling: bool,
    /// `stdout`, `stderr` or a file path
    pub output_paths: Vec<String>,
    /// Sinks that only receive error-level lines.
    pub error_output_paths: Vec<String>,
    pub service_name: String,
    pub environment: String,
    pub file: FileRotate,
}

impl LogConfig {
    /// Verbose human-readable output on stdout, no file.
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            encoding: Encoding::Console,
            development: true,
            enable_caller: true,
            enable_stacktrace: false,
            sampling: false,
            output_paths: vec!["stdout".to_string()],
            error_output_paths: Vec::new(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            environment: "dev".to_string(),
            file: FileRotate::default(),
        }
    }

    /// Sampled JSON at info level on stdout plus a rotating file.
    pub fn production() -> Self {
        Self {
            level: "info".to_string(),
            encoding: Encoding::Json,
            development: false,
            enable_caller: true,
            enable_stacktrace: true,
            sampling: true,
            output_paths: vec!["stdout".to_string()],
            error_output_paths: Vec::new(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            environment: "prod".to_string(),
            file: FileRotate {
                filename: "./logs/app.log".to_string(),
                max_size: 256,
                max_backups: 10,
                max_age: 14,
                compress: true,
                enable: true,
            },
        }
    }

    pub fn level_filter(&self) -> LevelFilter {
        parse_level(&self.level)
    }
}

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "trace" => LevelFilter::TRACE,
        "debug" => LevelFilter::DEBUG,
        "warn" | "warning" => LevelFilter::WARN,
        "error" => LevelFilter::ERROR,
        _ => LevelFilter::INFO,
    }
}

/// Builds the full layer stack for `cfg` without installing it.
pub fn build_layer(cfg: &LogConfig) -> Result<BoxedLayer> {
    let format = ServiceFormat::new(cfg);
    let mut sinks: Vec<BoxedLayer> = Vec::new();

    let outputs = if cfg.output_paths.is_empty() {
        vec!["stdout".to_string()]
    } else {
        cfg.output_paths.clone()
    };
    for path in &outputs {
        let (writer, is_terminal) = writer_for(path)?;
        sinks.push(sink(&format, writer, is_terminal && cfg.development));
    }

    for path in &cfg.error_output_paths {
        let (writer, is_terminal) = writer_for(path)?;
        let writer = BoxMakeWriter::new(writer.with_max_level(Level::ERROR));
        sinks.push(sink(&format, writer, is_terminal && cfg.development));
    }

    if cfg.file.enable && !cfg.file.filename.is_empty() {
        let writer = rotating_writer(&cfg.file)?;
        sinks.push(sink(&format, writer, false));
    }

    // RUST_LOG still wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},sqlx=warn,hyper_util=warn,aws_smithy_runtime=warn,aws_config=warn",
            cfg.level_filter()
        ))
    });
    let sampler = cfg.sampling.then(Sampler::default);

    Ok(filter.and_then(sampler).and_then(sinks).boxed())
}

fn sink(format: &ServiceFormat, writer: BoxMakeWriter, ansi: bool) -> BoxedLayer {
    if format.is_json() {
        // span fields are stored as JSON so the encoder can flatten them
        tracing_subscriber::fmt::layer()
            .fmt_fields(JsonFields::new())
            .event_format(format.clone())
            .with_writer(writer)
            .with_ansi(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .event_format(format.clone())
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed()
    }
}

fn writer_for(path: &str) -> Result<(BoxMakeWriter, bool)> {
    match path.to_ascii_lowercase().as_str() {
        "stdout" => Ok((BoxMakeWriter::new(io::stdout), true)),
        "stderr" => Ok((BoxMakeWriter::new(io::stderr), true)),
        _ => Ok((rotating_writer(&FileRotate::for_path(path))?, false)),
    }
}

fn rotating_writer(file: &FileRotate) -> Result<BoxMakeWriter> {
    let path = Path::new(&file.filename);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::logging(format!(
                "create log directory {} failed: {e}",
                parent.display()
            ))
        })?;
    }

    prune_rotated(path, retention(file));
    let compression = if file.compress {
        Compression::OnRotate(0)
    } else {
        Compression::None
    };
    let max_backups = if file.max_backups > 0 {
        file.max_backups
    } else {
        DEFAULT_MAX_BACKUPS
    };

    let writer = file_rotate::FileRotate::new(
        path,
        AppendCount::new(max_backups),
        ContentLimit::Bytes(size_limit(file)),
        compression,
        #[cfg(unix)]
        None,
    );
    Ok(BoxMakeWriter::new(RotatingFile(Mutex::new(writer))))
}

/// How long rotated files are kept. Oversized values saturate instead of wrapping.
fn retention(file: &FileRotate) -> Duration {
    let days = or_default(file.max_age, DEFAULT_MAX_AGE_DAYS);
    Duration::from_secs(days.saturating_mul(SECS_PER_DAY))
}

fn size_limit(file: &FileRotate) -> usize {
    let bytes = or_default(file.max_size, DEFAULT_MAX_SIZE_MB).saturating_mul(BYTES_PER_MB);
    usize::try_from(bytes).unwrap_or(usize::MAX)
}

fn or_default(value: u64, default: u64) -> u64 {
    if value > 0 {
        value
    } else {
        default
    }
}

/// Removes rotated siblings (`app.log.1`, `app.log.2.gz`, ...) older than `max_age`.
fn prune_rotated(path: &Path, max_age: Duration) {
    let (Some(dir), Some(base)) = (path.parent(), path.file_name().and_then(|n| n.to_str()))
    else {
        return;
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let prefix = format!("{base}.");
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    let now = SystemTime::now();
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !name.starts_with(&prefix) {
            continue;
        }
        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|modified| now.duration_since(modified).unwrap_or_default() > max_age)
            .unwrap_or(false);
        if expired {
            let _ = fs::remove_file(entry.path());
        }
    }
}

/// Rotating file that flushes after every line.
struct RotatingFile(Mutex<file_rotate::FileRotate<AppendCount>>);

struct RotatingGuard<'a>(MutexGuard<'a, file_rotate::FileRotate<AppendCount>>);

impl io::Write for RotatingGuard<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Drop for RotatingGuard<'_> {
    fn drop(&mut self) {
        let _ = self.0.flush();
    }
}

impl<'a> MakeWriter<'a> for RotatingFile {
    type Writer = RotatingGuard<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RotatingGuard(self.0.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Request-scoped identifiers. Every line emitted inside [`LogContext::span`]
/// carries the ones that are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogContext {
    pub trace_id: Option<String>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
}

impl LogContext {
    pub fn span(&self) -> Span {
        // ERROR level keeps the span alive under any level filter
        let span = tracing::span!(
            Level::ERROR,
            "context",
            trace_id = Empty,
            request_id = Empty,
            user_id = Empty
        );
        let ids = [
            ("trace_id", &self.trace_id),
            ("request_id", &self.request_id),
            ("user_id", &self.user_id),
        ];
        for (name, value) in ids {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                span.record(name, value);
            }
        }
        span
    }
}

struct GlobalLogger {
    handle: reload::Handle<BoxedLayer, Registry>,
    active: RwLock<LogConfig>,
}

static GLOBAL: OnceLock<GlobalLogger> = OnceLock::new();
static INSTALL: Mutex<()> = Mutex::new(());

/// Installs `cfg` as the process-wide logger, replacing any active one.
pub fn init_global(cfg: LogConfig) -> Result<()> {
    let layer = build_layer(&cfg)?;
    let _install = INSTALL.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(global) = GLOBAL.get() {
        global
            .handle
            .reload(layer)
            .map_err(|e| AppError::logging(format!("replace logger failed: {e}")))?;
        *global.active.write().unwrap_or_else(PoisonError::into_inner) = cfg;
        return Ok(());
    }

    let (reloadable, handle) = reload::Layer::new(layer);
    tracing_subscriber::registry()
        .with(reloadable)
        .try_init()
        .map_err(|e| AppError::logging(format!("install logger failed: {e}")))?;

    let _ = GLOBAL.set(GlobalLogger {
        handle,
        active: RwLock::new(cfg),
    });
    Ok(())
}

/// Configuration of the active logger.
pub fn current() -> Result<LogConfig> {
    GLOBAL
        .get()
        .map(|g| {
            g.active
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        })
        .ok_or_else(|| AppError::logging("logger not initialised; call init_global first"))
}

pub fn is_initialized() -> bool {
    GLOBAL.get().is_some()
}
