/// Cleaning and joining of the status and individual metadata tables.
///
/// The status table has one row per observation; the individual table has
/// one row per (individual, edit). The join keeps every status row and
/// attaches the most recently edited metadata for its individual.
///
/// Stages, each producing a new table:
///   1. drop the unique-row identifier from each input
///   2. drop exact-duplicate rows from each input
///   3. keep the latest-edited metadata row per individual
///   4. drop redundant status columns, suffix the remaining name collisions
///   5. left join on the individual identifier
///   6. drop columns that are missing in every joined row

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::NaiveDate;

use crate::config::JoinConfig;
use crate::dates::parse_date;
use crate::logging::{self, Stage};
use crate::model::PhenoError;
use crate::table::Table;

// ---------------------------------------------------------------------------
// Cleaning
// ---------------------------------------------------------------------------

/// Removes the row identifier (if configured) and exact-duplicate rows.
pub fn clean_table(table: &Table, row_id: Option<&str>) -> Result<Table, PhenoError> {
    let stripped = match row_id {
        Some(column) => {
            table.require_column(column)?;
            table.without_columns(&[column])
        }
        None => table.clone(),
    };
    let deduped = stripped.deduplicated();
    let removed = stripped.len() - deduped.len();
    if removed > 0 {
        logging::debug(
            Stage::Join,
            None,
            &format!("removed {} duplicate rows from {} table", removed, table.name),
        );
    }
    Ok(deduped)
}

struct Latest {
    row: usize,
    edited: Option<NaiveDate>,
    /// Another row with different content shares `edited`.
    conflict: bool,
}

/// Keeps one metadata row per individual: the one with the latest edited date.
///
/// Runs in a single pass, tracking the best row seen so far per key. Rows
/// without an individual id are dropped. A missing edited date ranks below
/// any present date. Input is expected to be deduplicated already, so two
/// rows tied at the latest date always differ; with `strict_ties` that is
/// an `AmbiguousLatest` error, otherwise the first one wins.
pub fn latest_per_individual(
    individuals: &Table,
    key_column: &str,
    edited_column: &str,
    strict_ties: bool,
) -> Result<Table, PhenoError> {
    let key_idx = individuals.require_column(key_column)?;
    let edited_idx = individuals.require_column(edited_column)?;

    // key -> best row so far; insertion order kept separately
    let mut best: HashMap<&str, Latest> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for (row_idx, row) in individuals.rows.iter().enumerate() {
        let Some(key) = row[key_idx].as_deref() else {
            continue;
        };
        let edited = match row[edited_idx].as_deref() {
            Some(value) => Some(parse_date(edited_column, value)?),
            None => None,
        };

        match best.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(Latest { row: row_idx, edited, conflict: false });
                order.push(key);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if edited > current.edited {
                    *current = Latest { row: row_idx, edited, conflict: false };
                } else if edited == current.edited && individuals.rows[current.row] != *row {
                    current.conflict = true;
                }
            }
        }
    }

    for &key in &order {
        let latest = &best[key];
        if !latest.conflict {
            continue;
        }
        let edited_date = latest.edited.map(|d| d.to_string()).unwrap_or_default();
        if strict_ties {
            return Err(PhenoError::AmbiguousLatest {
                individual: key.to_string(),
                edited_date,
            });
        }
        logging::warn(
            Stage::Join,
            Some(key),
            &format!("conflicting metadata rows edited on {}; keeping the first", edited_date),
        );
    }

    let rows = order
        .iter()
        .map(|key| individuals.rows[best[key].row].clone())
        .collect();
    Ok(Table {
        name: individuals.name.clone(),
        columns: individuals.columns.clone(),
        rows,
    })
}

/// Drops redundant status columns, then renames status columns that
/// collide with individual columns by appending `suffix`. The join key is
/// never renamed.
pub fn disambiguate_status_columns(
    status: &Table,
    individuals: &Table,
    key_column: &str,
    redundant: &[String],
    suffix: &str,
) -> Result<Table, PhenoError> {
    let redundant: Vec<&str> = redundant
        .iter()
        .map(String::as_str)
        .filter(|c| *c != key_column)
        .collect();
    let mut renamed = status.without_columns(&redundant);
    let original = renamed.columns.clone();
    for column in renamed.columns.iter_mut() {
        if column.as_str() == key_column || !individuals.has_column(column) {
            continue;
        }
        column.push_str(suffix);
        if original.contains(column) || individuals.has_column(column) {
            return Err(PhenoError::DuplicateColumn {
                table: status.name.clone(),
                column: column.clone(),
            });
        }
    }
    Ok(renamed)
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Left-joins `status` with `individuals` on `key_column`.
///
/// `individuals` must hold at most one row per key (see
/// `latest_per_individual`). Output columns are the status columns followed
/// by the individual columns other than the key.
pub fn left_join(status: &Table, individuals: &Table, key_column: &str) -> Result<Table, PhenoError> {
    let status_key = status.require_column(key_column)?;
    let individual_key = individuals.require_column(key_column)?;

    let carried: Vec<usize> = (0..individuals.columns.len())
        .filter(|&i| i != individual_key)
        .collect();

    let mut lookup: HashMap<&str, usize> = HashMap::with_capacity(individuals.len());
    for (row_idx, row) in individuals.rows.iter().enumerate() {
        if let Some(key) = row[individual_key].as_deref() {
            lookup.entry(key).or_insert(row_idx);
        }
    }

    let mut columns = status.columns.clone();
    columns.extend(carried.iter().map(|&i| individuals.columns[i].clone()));

    let mut unmatched = 0usize;
    let rows: Vec<Vec<Option<String>>> = status
        .rows
        .iter()
        .map(|row| {
            let matched = row[status_key]
                .as_deref()
                .and_then(|key| lookup.get(key))
                .map(|&idx| &individuals.rows[idx]);
            if matched.is_none() {
                unmatched += 1;
            }
            let mut joined = row.clone();
            joined.extend(carried.iter().map(|&i| matched.and_then(|m| m[i].clone())));
            joined
        })
        .collect();

    if unmatched > 0 {
        logging::warn(
            Stage::Join,
            None,
            &format!("{} status rows have no individual metadata", unmatched),
        );
    }

    Ok(Table {
        name: "joined".to_string(),
        columns,
        rows,
    })
}

/// Full cleaning and join of the two input tables.
pub fn join_tables(
    status: &Table,
    individuals: &Table,
    key_column: &str,
    edited_column: &str,
    config: &JoinConfig,
) -> Result<Table, PhenoError> {
    status.require_column(key_column)?;
    individuals.require_column(key_column)?;

    let status = clean_table(status, config.status_row_id.as_deref())?;
    let individuals = clean_table(individuals, config.individual_row_id.as_deref())?;
    let latest = latest_per_individual(&individuals, key_column, edited_column, config.strict_ties)?;
    logging::debug(
        Stage::Join,
        None,
        &format!(
            "kept {} latest metadata rows out of {}",
            latest.len(),
            individuals.len()
        ),
    );

    let status = disambiguate_status_columns(
        &status,
        &latest,
        key_column,
        &config.redundant_status_columns,
        &config.collision_suffix,
    )?;
    let joined = left_join(&status, &latest, key_column)?;

    let dropped = joined.all_missing_columns();
    if !dropped.is_empty() {
        logging::debug(
            Stage::Join,
            None,
            &format!("dropping all-missing columns: {}", dropped.join(", ")),
        );
    }
    Ok(joined.without_all_missing_columns())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
