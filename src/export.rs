/// Output writers for downstream plotting and analysis.
///
/// Files written into the output directory:
///   - `joined.csv`          cleaned and joined record set
///   - `fits.csv`            one row per fitted group
///   - `rss_curves.csv`      residual sum of squares per group and candidate
///   - `species_series.csv`  aggregated per-species time series
///   - `summary.json`        counts and best phases for the run

use std::fmt::Display;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;

use crate::model::{FitOutcome, FitResult, PhenoError, SpeciesDailyMean};
use crate::pipeline::PipelineOutput;
use crate::table::Table;

fn export_error<E: Display>(path: &Path, err: E) -> PhenoError {
    PhenoError::Export(format!("{}: {}", path.display(), err))
}

fn format_optional(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// CSV rows
// ---------------------------------------------------------------------------

pub fn write_table_rows<W: Write>(table: &Table, writer: &mut csv::Writer<W>) -> csv::Result<()> {
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_fit_rows<W: Write>(results: &[FitResult], writer: &mut csv::Writer<W>) -> csv::Result<()> {
    writer.write_record(["granularity", "group", "phase", "sse", "n_obs", "status"])?;
    for result in results {
        let granularity = result.granularity.to_string();
        match &result.outcome {
            FitOutcome::Fitted(fit) => writer.write_record([
                granularity,
                result.group_key.clone(),
                fit.phase.to_string(),
                fit.sse.to_string(),
                fit.n_obs.to_string(),
                "fitted".to_string(),
            ])?,
            FitOutcome::NoFit { reason } => writer.write_record([
                granularity,
                result.group_key.clone(),
                String::new(),
                String::new(),
                "0".to_string(),
                format!("no fit: {}", reason),
            ])?,
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_curve_rows<W: Write>(results: &[FitResult], writer: &mut csv::Writer<W>) -> csv::Result<()> {
    writer.write_record(["granularity", "group", "phase", "sse"])?;
    for result in results {
        if let FitOutcome::Fitted(fit) = &result.outcome {
            let granularity = result.granularity.to_string();
            for (phase, sse) in &fit.curve {
                let phase = phase.to_string();
                let sse = sse.to_string();
                writer.write_record([
                    granularity.as_str(),
                    result.group_key.as_str(),
                    phase.as_str(),
                    sse.as_str(),
                ])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_series_rows<W: Write>(
    series: &[SpeciesDailyMean],
    writer: &mut csv::Writer<W>,
) -> csv::Result<()> {
    writer.write_record(["species", "date", "day_offset", "mean_intensity", "n_individuals"])?;
    for point in series {
        writer.write_record([
            point.species.clone(),
            point.date.format("%Y-%m-%d").to_string(),
            point.day_offset.to_string(),
            format_optional(point.mean_intensity),
            point.n_individuals.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub joined_rows: usize,
    pub joined_columns: Vec<String>,
    pub leaf_observations: usize,
    pub observations_with_midpoint: usize,
    pub species_dates: usize,
    pub individual_fits: Vec<PhaseSummary>,
    pub species_fits: Vec<PhaseSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseSummary {
    pub group: String,
    pub phase: Option<f64>,
    pub sse: Option<f64>,
}

fn phase_summaries(results: &[FitResult]) -> Vec<PhaseSummary> {
    results
        .iter()
        .map(|r| PhaseSummary {
            group: r.group_key.clone(),
            phase: r.outcome.phase(),
            sse: match &r.outcome {
                FitOutcome::Fitted(fit) => Some(fit.sse),
                FitOutcome::NoFit { .. } => None,
            },
        })
        .collect()
}

pub fn summarize(output: &PipelineOutput) -> RunSummary {
    RunSummary {
        generated_at: Utc::now().to_rfc3339(),
        joined_rows: output.joined.len(),
        joined_columns: output.joined.columns.clone(),
        leaf_observations: output.observations.len(),
        observations_with_midpoint: output
            .observations
            .iter()
            .filter(|o| o.midpoint.is_some())
            .count(),
        species_dates: output.species_series.len(),
        individual_fits: phase_summaries(&output.individual_fits),
        species_fits: phase_summaries(&output.species_fits),
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

fn write_csv_file<F>(path: &Path, write_rows: F) -> Result<(), PhenoError>
where
    F: FnOnce(&mut csv::Writer<File>) -> csv::Result<()>,
{
    let file = File::create(path).map_err(|e| export_error(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    write_rows(&mut writer).map_err(|e| export_error(path, e))
}

/// Writes every output file into `dir`, creating it if needed.
/// Returns the paths written.
pub fn write_outputs(output: &PipelineOutput, dir: &Path) -> Result<Vec<PathBuf>, PhenoError> {
    fs::create_dir_all(dir).map_err(|e| export_error(dir, e))?;

    let mut fits = output.individual_fits.clone();
    fits.extend(output.species_fits.iter().cloned());

    let joined_path = dir.join("joined.csv");
    write_csv_file(&joined_path, |w| write_table_rows(&output.joined, w))?;

    let fits_path = dir.join("fits.csv");
    write_csv_file(&fits_path, |w| write_fit_rows(&fits, w))?;

    let curves_path = dir.join("rss_curves.csv");
    write_csv_file(&curves_path, |w| write_curve_rows(&fits, w))?;

    let series_path = dir.join("species_series.csv");
    write_csv_file(&series_path, |w| write_series_rows(&output.species_series, w))?;

    let summary_path = dir.join("summary.json");
    let json = serde_json::to_string_pretty(&summarize(output))?;
    fs::write(&summary_path, json).map_err(|e| export_error(&summary_path, e))?;

    Ok(vec![joined_path, fits_path, curves_path, series_path, summary_path])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Granularity, PhaseFit};

    fn results() -> Vec<FitResult> {
        vec![
            FitResult {
                granularity: Granularity::Individual,
                group_key: "101".to_string(),
                outcome: FitOutcome::Fitted(PhaseFit {
                    phase: 0.3,
                    sse: 0.25,
                    n_obs: 4,
                    curve: vec![(0.25, 0.5), (0.3, 0.25)],
                }),
            },
            FitResult {
                granularity: Granularity::Species,
                group_key: "Quercus alba".to_string(),
                outcome: FitOutcome::NoFit {
                    reason: "no observations with a usable intensity".to_string(),
                },
            },
        ]
    }

    fn render<F>(write_rows: F) -> String
    where
        F: FnOnce(&mut csv::Writer<Vec<u8>>) -> csv::Result<()>,
    {
        let mut writer = csv::Writer::from_writer(Vec::new());
        write_rows(&mut writer).unwrap();
        String::from_utf8(writer.into_inner().unwrap()).unwrap()
    }

    #[test]
    fn test_fit_rows_mark_no_fit_groups() {
        let text = render(|w| write_fit_rows(&results(), w));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "granularity,group,phase,sse,n_obs,status");
        assert_eq!(lines[1], "individual,101,0.3,0.25,4,fitted");
        assert_eq!(
            lines[2],
            "species,Quercus alba,,,0,no fit: no observations with a usable intensity"
        );
    }

    #[test]
    fn test_curve_rows_skip_unfitted_groups() {
        let text = render(|w| write_curve_rows(&results(), w));
        assert_eq!(text.lines().count(), 3);
        assert!(text.contains("individual,101,0.25,0.5"));
    }

    #[test]
    fn test_table_rows_write_missing_as_empty() {
        let table = Table::from_rows("joined", &["a", "b"], &[&["1", ""]]);
        let text = render(|w| write_table_rows(&table, w));
        assert_eq!(text, "a,b\n1,\n");
    }

    #[test]
    fn test_phase_summaries_carry_missing_phase() {
        let summaries = phase_summaries(&results());
        assert_eq!(summaries[0].phase, Some(0.3));
        assert_eq!(summaries[1].phase, None);
        assert_eq!(summaries[1].sse, None);
    }
}
