/// End-to-end batch pipeline.
///
/// clean → join → midpoint → day offsets → (aggregate) → grid-search fit.
///
/// Each stage takes its input by reference and returns a new value; nothing
/// is shared or mutated between stages. Join-stage errors abort the run.
/// Fitting gaps are per group and never stop other groups from fitting.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;

use crate::aggregate::{species_daily_means, verify_unique_pairs};
use crate::config::{ColumnNames, PipelineConfig};
use crate::dates::{self, DateReference};
use crate::fit::fit_groups;
use crate::intensity::midpoint_for_label;
use crate::join::join_tables;
use crate::logging::{self, Stage};
use crate::model::{
    FitOutcome, FitResult, Granularity, LeafObservation, PhenoError, SpeciesDailyMean,
};
use crate::table::Table;

/// Everything the pipeline hands to downstream consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutput {
    pub joined: Table,
    pub observations: Vec<LeafObservation>,
    pub species_series: Vec<SpeciesDailyMean>,
    pub individual_fits: Vec<FitResult>,
    pub species_fits: Vec<FitResult>,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Finds a column that came from the status table.
///
/// A status column that collided with a metadata column was renamed with
/// the suffix, and the bare name now holds the metadata value, so the
/// suffixed name is tried first.
fn resolve_status_column(table: &Table, name: &str, suffix: &str) -> Option<usize> {
    table
        .column_index(&format!("{}{}", name, suffix))
        .or_else(|| table.column_index(name))
}

fn require_status_column(table: &Table, name: &str, suffix: &str) -> Result<usize, PhenoError> {
    resolve_status_column(table, name, suffix).ok_or_else(|| PhenoError::MissingColumn {
        table: table.name.clone(),
        column: name.to_string(),
    })
}

/// Projects joined rows of the given phenophase onto typed observations
/// with their midpoint intensity. Day offsets are left at 0.
///
/// Rows without an individual id or observation date cannot be placed on a
/// time axis and are skipped with a warning. Scientific name, growth form
/// and intensity may have been pruned as all-missing; they then read as
/// missing.
pub fn project_leaf_observations(
    joined: &Table,
    columns: &ColumnNames,
    phenophase: &str,
    suffix: &str,
) -> Result<Vec<LeafObservation>, PhenoError> {
    // the join key is never renamed
    let id_idx = joined.require_column(&columns.individual_id)?;
    let phase_idx = require_status_column(joined, &columns.phenophase, suffix)?;
    let date_idx = require_status_column(joined, &columns.observation_date, suffix)?;
    let intensity_idx = resolve_status_column(joined, &columns.intensity, suffix);
    // metadata columns keep their bare names
    let species_idx = joined.column_index(&columns.scientific_name);
    let form_idx = joined.column_index(&columns.growth_form);

    let optional = |row: usize, idx: Option<usize>| -> Option<String> {
        idx.and_then(|i| joined.cell(row, i)).map(String::from)
    };

    let mut observations = Vec::new();
    let mut skipped = 0usize;
    let mut unbinned = 0usize;

    for row in 0..joined.len() {
        if joined.cell(row, phase_idx).map(str::trim) != Some(phenophase) {
            continue;
        }
        let (Some(individual_id), Some(date_text)) =
            (joined.cell(row, id_idx), joined.cell(row, date_idx))
        else {
            skipped += 1;
            continue;
        };
        let date = dates::parse_date(&columns.observation_date, date_text)?;
        let intensity_label = optional(row, intensity_idx);
        let midpoint = midpoint_for_label(intensity_label.as_deref());
        if midpoint.is_none() {
            unbinned += 1;
        }

        observations.push(LeafObservation {
            individual_id: individual_id.to_string(),
            scientific_name: optional(row, species_idx),
            growth_form: optional(row, form_idx),
            date,
            intensity_label,
            midpoint,
            day_offset: 0,
        });
    }

    if skipped > 0 {
        logging::warn(
            Stage::Bins,
            None,
            &format!("{} {} rows lack an individual id or date and are not fitted", skipped, phenophase),
        );
    }
    logging::info(
        Stage::Bins,
        None,
        &format!(
            "{} {} observations, {} without a recognised intensity bin",
            observations.len(),
            phenophase,
            unbinned
        ),
    );
    Ok(observations)
}

// ---------------------------------------------------------------------------
// Day offsets
// ---------------------------------------------------------------------------

/// Returns observations with `day_offset` filled in.
///
/// `Global` measures from the earliest observation overall; `PerGroup` from
/// each individual's earliest observation.
pub fn assign_observation_offsets(
    observations: &[LeafObservation],
    reference: DateReference,
) -> Vec<LeafObservation> {
    let references = reference_dates(observations, reference, |o| (o.individual_id.as_str(), o.date));
    observations
        .iter()
        .map(|obs| {
            let mut obs = obs.clone();
            if let Some(&start) = references.get(obs.individual_id.as_str()) {
                obs.day_offset = dates::day_offset(obs.date, start);
            }
            obs
        })
        .collect()
}

/// Returns the species series with `day_offset` filled in.
///
/// `Global` uses `global_start` (the earliest leaf observation, so species
/// and individual offsets share one axis); `PerGroup` uses each species'
/// earliest aggregated date.
pub fn assign_series_offsets(
    series: &[SpeciesDailyMean],
    reference: DateReference,
    global_start: Option<NaiveDate>,
) -> Vec<SpeciesDailyMean> {
    let per_group = reference_dates(series, DateReference::PerGroup, |p| (p.species.as_str(), p.date));
    series
        .iter()
        .map(|point| {
            let mut point = point.clone();
            let start = match reference {
                DateReference::Global => global_start,
                DateReference::PerGroup => per_group.get(point.species.as_str()).copied(),
            };
            if let Some(start) = start {
                point.day_offset = dates::day_offset(point.date, start);
            }
            point
        })
        .collect()
}

/// Reference date for each group key under the given policy.
fn reference_dates<'a, T>(
    items: &'a [T],
    reference: DateReference,
    key_and_date: impl Fn(&'a T) -> (&'a str, NaiveDate),
) -> HashMap<&'a str, NaiveDate> {
    let mut earliest: HashMap<&str, NaiveDate> = HashMap::new();
    let mut global: Option<NaiveDate> = None;
    for item in items {
        let (key, date) = key_and_date(item);
        earliest
            .entry(key)
            .and_modify(|d| *d = (*d).min(date))
            .or_insert(date);
        global = Some(global.map_or(date, |g| g.min(date)));
    }
    if let (DateReference::Global, Some(start)) = (reference, global) {
        for value in earliest.values_mut() {
            *value = start;
        }
    }
    earliest
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// `(t, midpoint)` points per individual, ordered by individual id.
/// Individuals whose midpoints are all missing get an empty group so they
/// are reported as "no fit" rather than silently absent.
pub fn individual_groups(observations: &[LeafObservation]) -> Vec<(String, Vec<(f64, f64)>)> {
    let mut groups: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for obs in observations {
        let points = groups.entry(obs.individual_id.as_str()).or_default();
        if let Some(midpoint) = obs.midpoint {
            points.push((obs.day_offset as f64, midpoint));
        }
    }
    groups.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// `(t, mean intensity)` points per species, ordered by species name.
pub fn species_groups(series: &[SpeciesDailyMean]) -> Vec<(String, Vec<(f64, f64)>)> {
    let mut groups: BTreeMap<&str, Vec<(f64, f64)>> = BTreeMap::new();
    for point in series {
        let points = groups.entry(point.species.as_str()).or_default();
        if let Some(mean) = point.mean_intensity {
            points.push((point.day_offset as f64, mean));
        }
    }
    groups.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

fn summarize(granularity: Granularity, results: &[FitResult]) {
    let fitted = results
        .iter()
        .filter(|r| matches!(r.outcome, FitOutcome::Fitted(_)))
        .count();
    logging::log_fit_gaps(results);
    logging::log_fit_summary(granularity, results.len(), fitted, results.len() - fitted);
}

// ---------------------------------------------------------------------------
// Run
// ---------------------------------------------------------------------------

/// Runs the full pipeline over the two input tables.
pub fn run(
    status: &Table,
    individuals: &Table,
    config: &PipelineConfig,
) -> Result<PipelineOutput, PhenoError> {
    config.fit.grid.validate()?;
    let columns = &config.columns;
    let suffix = config.join.collision_suffix.as_str();

    logging::info(
        Stage::Join,
        None,
        &format!(
            "joining {} status rows with {} individual rows",
            status.len(),
            individuals.len()
        ),
    );
    let joined = join_tables(
        status,
        individuals,
        &columns.individual_id,
        &columns.edited_date,
        &config.join,
    )?;
    logging::info(
        Stage::Join,
        None,
        &format!("joined table: {} rows, {} columns", joined.len(), joined.columns.len()),
    );

    let observations = project_leaf_observations(&joined, columns, &config.phenophase, suffix)?;

    let reference = config.dates.reference;
    let global_start = dates::earliest(&observations.iter().map(|o| o.date).collect::<Vec<_>>());
    let observations = assign_observation_offsets(&observations, reference);
    if let Some(start) = global_start {
        logging::debug(Stage::Dates, None, &format!("earliest observation {}", start));
    }

    let species_series = if config.fit.per_species {
        let series = species_daily_means(&observations);
        verify_unique_pairs(&series)?;
        logging::info(
            Stage::Aggregate,
            None,
            &format!("{} species-date means", series.len()),
        );
        assign_series_offsets(&series, reference, global_start)
    } else {
        Vec::new()
    };

    let individual_fits = if config.fit.per_individual {
        let results = fit_groups(
            Granularity::Individual,
            &individual_groups(&observations),
            &config.fit.grid,
        )?;
        summarize(Granularity::Individual, &results);
        results
    } else {
        Vec::new()
    };

    let species_fits = if config.fit.per_species {
        let results = fit_groups(
            Granularity::Species,
            &species_groups(&species_series),
            &config.fit.grid,
        )?;
        summarize(Granularity::Species, &results);
        results
    } else {
        Vec::new()
    };

    Ok(PipelineOutput {
        joined,
        observations,
        species_series,
        individual_fits,
        species_fits,
    })
}
