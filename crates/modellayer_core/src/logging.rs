//! Process-wide logging for the data-access layer.
//!
//! # Responsibility
//! - Start a rolling file logger once per process.
//! - Keep log lines in the `event=… module=… status=…` key/value shape used
//!   by every module of this crate.
//!
//! # Invariants
//! - Starting twice with equal settings is a no-op; different settings are
//!   rejected.
//! - Credentials and bound parameter values are never logged.

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt;
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "modellayer";
const ROTATE_AT_BYTES: u64 = 5 * 1024 * 1024;
const KEEP_ROTATED: usize = 3;
const PANIC_TEXT_LIMIT: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub directory: PathBuf,
    /// Also copy warnings and errors to stderr.
    pub echo_warnings: bool,
}

impl LogSettings {
    pub fn new(level: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            directory: directory.into(),
            echo_warnings: false,
        }
    }

    pub fn echo_warnings(mut self) -> Self {
        self.echo_warnings = true;
        self
    }
}

/// Failure to start logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnknownLevel(String),
    InvalidDirectory(String),
    AlreadyStarted { active: String, requested: String },
    Backend(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unknown log level `{level}`; expected trace, debug, info, warn or error"
            ),
            Self::InvalidDirectory(reason) => write!(f, "invalid log directory: {reason}"),
            Self::AlreadyStarted { active, requested } => write!(
                f,
                "logging already started with {active}; cannot restart with {requested}"
            ),
            Self::Backend(message) => write!(f, "logger backend failed: {message}"),
        }
    }
}

impl std::error::Error for LoggingError {}

struct ActiveLogger {
    level: &'static str,
    directory: PathBuf,
    echo_warnings: bool,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn describe(&self) -> String {
        describe(self.level, &self.directory, self.echo_warnings)
    }
}

fn describe(level: &str, directory: &Path, echo_warnings: bool) -> String {
    format!(
        "level={level} dir={} echo_warnings={echo_warnings}",
        directory.display()
    )
}

/// Starts file logging.
///
/// # Errors
/// - `UnknownLevel` / `InvalidDirectory` for bad settings.
/// - `AlreadyStarted` when a logger with different settings is running.
/// - `Backend` when the directory cannot be created or the logger fails.
pub fn init_logging(settings: &LogSettings) -> Result<(), LoggingError> {
    let level = parse_level(&settings.level)?;
    let directory = check_directory(&settings.directory)?;

    let active = ACTIVE.get_or_try_init(|| start(level, &directory, settings.echo_warnings))?;
    if active.level != level
        || active.directory != directory
        || active.echo_warnings != settings.echo_warnings
    {
        return Err(LoggingError::AlreadyStarted {
            active: active.describe(),
            requested: describe(level, &directory, settings.echo_warnings),
        });
    }
    Ok(())
}

fn start(
    level: &'static str,
    directory: &Path,
    echo_warnings: bool,
) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(directory).map_err(|err| {
        LoggingError::Backend(format!("cannot create `{}`: {err}", directory.display()))
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| LoggingError::Backend(err.to_string()))?
        .log_to_file(
            FileSpec::default()
                .directory(directory)
                .basename(LOG_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED),
        )
        .duplicate_to_stderr(if echo_warnings {
            Duplicate::Warn
        } else {
            Duplicate::None
        })
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=logging_start module=logging status=ok level={} log_dir={} version={}",
        level,
        directory.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        directory: directory.to_path_buf(),
        echo_warnings,
        _handle: handle,
    })
}

/// Active `(level, directory)`, or `None` before [`init_logging`] succeeded.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.directory.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    let level = level.trim().to_ascii_lowercase();
    ["trace", "debug", "info", "warn", "error"]
        .into_iter()
        .find(|known| *known == level || (level == "warning" && *known == "warn"))
        .ok_or(LoggingError::UnknownLevel(level))
}

fn check_directory(directory: &Path) -> Result<PathBuf, LoggingError> {
    if directory.as_os_str().is_empty() {
        return Err(LoggingError::InvalidDirectory("path is empty".to_string()));
    }
    if !directory.is_absolute() {
        return Err(LoggingError::InvalidDirectory(format!(
            "`{}` is not absolute",
            directory.display()
        )));
    }
    Ok(directory.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, PANIC_TEXT_LIMIT)
        );
        previous(info);
    }));
}

/// Flattens `text` to one line of at most `limit` characters.
pub(crate) fn single_line(text: &str, limit: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect();
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut cut: String = flat.chars().take(limit).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_accepts_aliases_and_case() {
        assert_eq!(parse_level(" WARNING ").unwrap(), "warn");
        assert_eq!(parse_level("Info").unwrap(), "info");
        assert!(matches!(
            parse_level("verbose"),
            Err(LoggingError::UnknownLevel(level)) if level == "verbose"
        ));
    }

    #[test]
    fn relative_directory_is_rejected() {
        let err = check_directory(Path::new("logs/dev")).unwrap_err();
        assert!(err.to_string().contains("not absolute"));
    }

    #[test]
    fn single_line_flattens_and_truncates() {
        assert_eq!(single_line("a\nb", 10), "a b");
        assert_eq!(single_line("abcdef", 3), "abc...");
    }

    #[test]
    fn init_is_idempotent_and_rejects_different_settings() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings::new("info", dir.path().join("logs"));

        init_logging(&settings).unwrap();
        init_logging(&settings).unwrap();

        let louder = LogSettings::new("debug", dir.path().join("logs"));
        assert!(matches!(
            init_logging(&louder),
            Err(LoggingError::AlreadyStarted { .. })
        ));

        let (level, directory) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(directory, dir.path().join("logs"));
    }
}
