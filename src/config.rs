/// Pipeline configuration loaded from a TOML file.
///
/// Every field has a default, so an empty file (or a file that only sets
/// input paths) is a valid configuration. Example:
///
/// ```toml
/// phenophase = "Leaves"
///
/// [input]
/// status_path = "data/status_intensity.csv"
/// individuals_path = "data/individuals.csv"
///
/// [fit.grid]
/// start = 0.0
/// stop = 1.1
/// step = 0.01
///
/// [logging]
/// level = "info"
/// ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::dates::DateReference;
use crate::fit::PhaseGrid;
use crate::logging::LogLevel;
use crate::model::{PhenoError, DEFAULT_PHENOPHASE};

/// Environment variable naming the config file when none is given.
pub const CONFIG_ENV: &str = "PHENOFIT_CONFIG";
/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "PHENOFIT_LOG_LEVEL";
pub const DEFAULT_CONFIG_PATH: &str = "phenofit.toml";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub input: InputConfig,
    pub columns: ColumnNames,
    pub join: JoinConfig,
    /// Only observations of this phenophase are fitted.
    pub phenophase: String,
    pub dates: DatesConfig,
    pub fit: FitConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            columns: ColumnNames::default(),
            join: JoinConfig::default(),
            phenophase: DEFAULT_PHENOPHASE.to_string(),
            dates: DatesConfig::default(),
            fit: FitConfig::default(),
            output: OutputConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub status_path: PathBuf,
    pub individuals_path: PathBuf,
    pub delimiter: char,
    /// Cell values read as missing in addition to empty cells.
    pub missing_values: Vec<String>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            status_path: PathBuf::from("status_intensity.csv"),
            individuals_path: PathBuf::from("individuals.csv"),
            delimiter: ',',
            missing_values: vec!["-9999".to_string()],
        }
    }
}

/// Column names used by the joiner and the leaf projection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub individual_id: String,
    pub edited_date: String,
    pub scientific_name: String,
    pub growth_form: String,
    pub phenophase: String,
    pub intensity: String,
    pub observation_date: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            individual_id: "Individual_ID".to_string(),
            edited_date: "Edited_Date".to_string(),
            scientific_name: "Scientific_Name".to_string(),
            growth_form: "Growth_Form".to_string(),
            phenophase: "Phenophase_Name".to_string(),
            intensity: "Phenophase_Intensity".to_string(),
            observation_date: "Observation_Date".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    /// Unique-row identifier removed from the status table, if any.
    pub status_row_id: Option<String>,
    /// Unique-row identifier removed from the individual table, if any.
    pub individual_row_id: Option<String>,
    /// Appended to status columns whose name also exists in the individual table.
    pub collision_suffix: String,
    /// Status columns dropped before the join because the individual
    /// table already carries them.
    pub redundant_status_columns: Vec<String>,
    /// Reject individuals whose latest edited date has conflicting rows.
    /// When false the first such row wins and a warning is logged.
    pub strict_ties: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            status_row_id: Some("Observation_ID".to_string()),
            individual_row_id: Some("Record_ID".to_string()),
            collision_suffix: "Stat".to_string(),
            redundant_status_columns: vec![
                "Species_ID".to_string(),
                "Scientific_Name".to_string(),
                "Growth_Form".to_string(),
            ],
            strict_ties: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct DatesConfig {
    pub reference: DateReference,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub grid: PhaseGrid,
    pub per_individual: bool,
    pub per_species: bool,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            grid: PhaseGrid::default(),
            per_individual: true,
            per_species: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("phenofit_out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            file: None,
            timestamps: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl PipelineConfig {
    /// Parses and validates configuration text.
    pub fn from_toml_str(text: &str) -> Result<Self, PhenoError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PhenoError> {
        self.fit.grid.validate()?;
        if !self.input.delimiter.is_ascii() {
            return Err(PhenoError::Config(format!(
                "delimiter '{}' is not a single-byte character",
                self.input.delimiter
            )));
        }
        if self.phenophase.trim().is_empty() {
            return Err(PhenoError::Config("phenophase must not be empty".to_string()));
        }
        Ok(())
    }

    /// Applies overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Result<Self, PhenoError> {
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            self.logging.level = LogLevel::parse(&level).ok_or_else(|| {
                PhenoError::Config(format!("{} has unknown level '{}'", LOG_LEVEL_ENV, level))
            })?;
        }
        Ok(self)
    }
}

/// Reads, parses and validates a configuration file.
pub fn load_config(path: &Path) -> Result<PipelineConfig, PhenoError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| PhenoError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    PipelineConfig::from_toml_str(&text)
}

/// Resolves the config path: explicit argument, then `PHENOFIT_CONFIG`,
/// then `phenofit.toml` in the working directory.
pub fn resolve_config_path(arg: Option<String>) -> PathBuf {
    arg.or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").expect("empty config is valid");
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.phenophase, "Leaves");
        assert_eq!(config.join.collision_suffix, "Stat");
        assert_eq!(config.dates.reference, DateReference::Global);
    }

    #[test]
    fn test_partial_sections_keep_remaining_defaults() {
        let text = r#"
            phenophase = "Leaves"

            [input]
            status_path = "data/status.csv"

            [fit.grid]
            stop = 1.0
            step = 0.05

            [dates]
            reference = "per_group"

            [logging]
            level = "debug"
        "#;
        let config = PipelineConfig::from_toml_str(text).unwrap();
        assert_eq!(config.input.status_path, PathBuf::from("data/status.csv"));
        assert_eq!(config.input.individuals_path, PathBuf::from("individuals.csv"));
        assert_eq!(config.fit.grid, PhaseGrid { start: 0.0, stop: 1.0, step: 0.05 });
        assert!(config.fit.per_species);
        assert_eq!(config.dates.reference, DateReference::PerGroup);
        assert_eq!(config.logging.level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_grid_is_rejected_at_load() {
        let err = PipelineConfig::from_toml_str("[fit.grid]\nstep = 0.0\n").unwrap_err();
        assert!(matches!(err, PhenoError::InvalidGrid(_)), "got {:?}", err);
    }

    #[test]
    fn test_grid_too_fine_to_evaluate_is_rejected_at_load() {
        let err = PipelineConfig::from_toml_str("[fit.grid]\nstep = 1e-20\n").unwrap_err();
        assert!(matches!(err, PhenoError::InvalidGrid(_)), "got {:?}", err);
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("phenophase = ").unwrap_err();
        assert!(matches!(err, PhenoError::Config(_)), "got {:?}", err);
    }

    #[test]
    fn test_example_config_matches_defaults_apart_from_paths() {
        let config = PipelineConfig::from_toml_str(include_str!("../phenofit.example.toml"))
            .expect("example config should parse");
        assert_eq!(config.columns, ColumnNames::default());
        assert_eq!(config.join, JoinConfig::default());
        assert_eq!(config.fit, FitConfig::default());
        assert_eq!(config.input.status_path, PathBuf::from("data/status_intensity.csv"));
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let path = resolve_config_path(Some("custom.toml".to_string()));
        assert_eq!(path, PathBuf::from("custom.toml"));
    }
}
