/// Core data types for the phenology fitting pipeline.
///
/// This module defines the shared domain model imported by all other modules:
/// typed leaf observations, aggregated species series, fit results and the
/// crate-wide error type. It contains no pipeline logic.

use chrono::NaiveDate;

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// Phenophase retained for fitting unless configured otherwise.
pub const DEFAULT_PHENOPHASE: &str = "Leaves";

/// A joined status row projected onto the fields the fitter needs.
///
/// `midpoint` is `None` when the intensity label is absent or not one of the
/// six known bins; such records stay in the joined table but are excluded
/// from fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafObservation {
    pub individual_id: String,
    pub scientific_name: Option<String>,
    pub growth_form: Option<String>,
    pub date: NaiveDate,
    pub intensity_label: Option<String>,
    pub midpoint: Option<f64>,
    pub day_offset: i64,
}

/// Mean midpoint intensity across individuals of one species on one date.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesDailyMean {
    pub species: String,
    pub date: NaiveDate,
    pub day_offset: i64,
    /// `None` if no individual on this date had a usable midpoint.
    pub mean_intensity: Option<f64>,
    /// Distinct individuals with a usable midpoint on this date.
    pub n_individuals: usize,
}

// ---------------------------------------------------------------------------
// Fit types
// ---------------------------------------------------------------------------

/// Level at which a group of observations is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Granularity {
    Individual,
    Species,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Granularity::Individual => write!(f, "individual"),
            Granularity::Species => write!(f, "species"),
        }
    }
}

/// Best phase for one group plus the residual curve it was chosen from.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseFit {
    pub phase: f64,
    pub sse: f64,
    pub n_obs: usize,
    /// `(candidate phase, sum of squared residuals)` in grid order.
    pub curve: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Fitted(PhaseFit),
    /// The group had no observation with a usable intensity.
    NoFit { reason: String },
}

impl FitOutcome {
    pub fn phase(&self) -> Option<f64> {
        match self {
            FitOutcome::Fitted(fit) => Some(fit.phase),
            FitOutcome::NoFit { .. } => None,
        }
    }
}

/// One fit per group key at a given granularity.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub granularity: Granularity,
    pub group_key: String,
    pub outcome: FitOutcome,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while cleaning, joining, or fitting phenology data.
#[derive(Debug, PartialEq)]
pub enum PhenoError {
    /// A required column is absent from an input or joined table.
    MissingColumn { table: String, column: String },
    /// Renaming a colliding column would repeat an existing column name.
    DuplicateColumn { table: String, column: String },
    /// Two different metadata rows share an individual's latest edited date.
    AmbiguousLatest { individual: String, edited_date: String },
    /// A (species, date) pair appears more than once after aggregation.
    DuplicateAggregate { species: String, date: NaiveDate },
    /// A date cell could not be parsed.
    InvalidDate { column: String, value: String },
    /// The phase grid is empty or malformed.
    InvalidGrid(String),
    /// The configuration file could not be read or parsed.
    Config(String),
    /// Delimited input could not be read.
    Ingest(String),
    /// An output file could not be written.
    Export(String),
}

impl std::fmt::Display for PhenoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhenoError::MissingColumn { table, column } => {
                write!(f, "Column '{}' missing from {} table", column, table)
            }
            PhenoError::DuplicateColumn { table, column } => {
                write!(f, "Column '{}' would appear twice after renaming {} table", column, table)
            }
            PhenoError::AmbiguousLatest { individual, edited_date } => write!(
                f,
                "Individual {} has conflicting metadata rows edited on {}",
                individual, edited_date
            ),
            PhenoError::DuplicateAggregate { species, date } => {
                write!(f, "Duplicate aggregate for {} on {}", species, date)
            }
            PhenoError::InvalidDate { column, value } => {
                write!(f, "Invalid date in column '{}': '{}'", column, value)
            }
            PhenoError::InvalidGrid(msg) => write!(f, "Invalid phase grid: {}", msg),
            PhenoError::Config(msg) => write!(f, "Config error: {}", msg),
            PhenoError::Ingest(msg) => write!(f, "Ingest error: {}", msg),
            PhenoError::Export(msg) => write!(f, "Export error: {}", msg),
        }
    }
}

impl std::error::Error for PhenoError {}

impl From<csv::Error> for PhenoError {
    fn from(err: csv::Error) -> Self {
        PhenoError::Ingest(err.to_string())
    }
}

impl From<std::io::Error> for PhenoError {
    fn from(err: std::io::Error) -> Self {
        PhenoError::Ingest(err.to_string())
    }
}

impl From<toml::de::Error> for PhenoError {
    fn from(err: toml::de::Error) -> Self {
        PhenoError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for PhenoError {
    fn from(err: serde_json::Error) -> Self {
        PhenoError::Export(err.to_string())
    }
}
