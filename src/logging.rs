/// Structured logging for the phenology fitting pipeline
///
/// Provides context-rich logging tagged with the pipeline stage and,
/// where relevant, the individual or species being processed. Supports
/// both console output and an append-only log file for batch runs.

use chrono::Utc;
use serde::Deserialize;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::{FitOutcome, FitResult, Granularity, PhenoError};

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[serde(alias = "warn")]
    Warning,
    Error,
}

impl LogLevel {
    /// Case-insensitive level name, as accepted in config and environment.
    pub fn parse(name: &str) -> Option<LogLevel> {
        match name.trim().to_ascii_lowercase().as_str() {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warning),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Ingest,
    Join,
    Bins,
    Dates,
    Aggregate,
    Fit,
    Export,
    System,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => write!(f, "INGEST"),
            Stage::Join => write!(f, "JOIN"),
            Stage::Bins => write!(f, "BINS"),
            Stage::Dates => write!(f, "DATES"),
            Stage::Aggregate => write!(f, "AGG"),
            Stage::Fit => write!(f, "FIT"),
            Stage::Export => write!(f, "EXPORT"),
            Stage::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Required table or column is missing - input is malformed
    Schema,
    /// Input is well-formed but contradicts itself
    DataQuality,
    /// Configuration cannot be used as given
    Configuration,
    /// Reading or writing files failed
    Io,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorClass::Schema => write!(f, "SCHEMA"),
            ErrorClass::DataQuality => write!(f, "DATA-QUALITY"),
            ErrorClass::Configuration => write!(f, "CONFIG"),
            ErrorClass::Io => write!(f, "IO"),
        }
    }
}

pub fn classify_error(err: &PhenoError) -> ErrorClass {
    match err {
        PhenoError::MissingColumn { .. } | PhenoError::DuplicateColumn { .. } => ErrorClass::Schema,
        PhenoError::AmbiguousLatest { .. }
        | PhenoError::DuplicateAggregate { .. }
        | PhenoError::InvalidDate { .. } => ErrorClass::DataQuality,
        PhenoError::InvalidGrid(_) | PhenoError::Config(_) => ErrorClass::Configuration,
        PhenoError::Ingest(_) | PhenoError::Export(_) => ErrorClass::Io,
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn log(&self, level: LogLevel, stage: Stage, group: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");

        let group_part = group.map(|g| format!(" [{}]", g)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, stage, group_part, message);

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", stage, group_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", stage, group_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => println!("   [DEBUG] {}{}: {}", stage, group_part, message),
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, stage: Stage, group: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, stage, group, message);
        }
    }
}

pub fn info(stage: Stage, group: Option<&str>, message: &str) {
    emit(LogLevel::Info, stage, group, message);
}

pub fn warn(stage: Stage, group: Option<&str>, message: &str) {
    emit(LogLevel::Warning, stage, group, message);
}

pub fn error(stage: Stage, group: Option<&str>, message: &str) {
    emit(LogLevel::Error, stage, group, message);
}

pub fn debug(stage: Stage, group: Option<&str>, message: &str) {
    emit(LogLevel::Debug, stage, group, message);
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a pipeline error with its classification
pub fn log_pipeline_error(stage: Stage, operation: &str, err: &PhenoError) {
    let message = format!("{} failed [{}]: {}", operation, classify_error(err), err);
    error(stage, None, &message);
}

/// Log each group that could not be fitted
pub fn log_fit_gaps(results: &[FitResult]) {
    for result in results {
        if let FitOutcome::NoFit { reason } = &result.outcome {
            let message = format!("no {} fit: {}", result.granularity, reason);
            warn(Stage::Fit, Some(&result.group_key), &message);
        }
    }
}

// ---------------------------------------------------------------------------
// Fit Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of one fitting pass
pub fn log_fit_summary(granularity: Granularity, total: usize, fitted: usize, no_fit: usize) {
    let message = format!(
        "{} fits complete: {}/{} fitted, {} without usable observations",
        granularity, fitted, total, no_fit
    );

    if no_fit == 0 {
        info(Stage::Fit, None, &message);
    } else if fitted == 0 {
        error(Stage::Fit, None, &message);
    } else {
        warn(Stage::Fit, None, &message);
    }
}
