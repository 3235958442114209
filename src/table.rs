/// In-memory tabular data with named columns.
///
/// Cells are `Option<String>`: `None` is a missing value. Every operation
/// returns a new `Table` (or borrows), so pipeline stages never mutate the
/// tables handed to them.

use std::collections::HashSet;

use crate::model::PhenoError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Identifies the table in error messages ("status", "individuals", ...).
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl Table {
    pub fn new(name: &str, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from string literals, treating `""` as missing.
    /// Mostly useful in tests.
    pub fn from_rows(name: &str, columns: &[&str], rows: &[&[&str]]) -> Self {
        let mut table = Table::new(name, columns.iter().map(|c| c.to_string()).collect());
        for row in rows {
            table.rows.push(
                row.iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            None
                        } else {
                            Some(cell.to_string())
                        }
                    })
                    .collect(),
            );
        }
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Like `column_index`, but a missing column is a schema error.
    pub fn require_column(&self, column: &str) -> Result<usize, PhenoError> {
        self.column_index(column).ok_or_else(|| PhenoError::MissingColumn {
            table: self.name.clone(),
            column: column.to_string(),
        })
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// Returns a copy without the named columns. Names not present are ignored.
    pub fn without_columns(&self, drop: &[&str]) -> Table {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !drop.contains(&self.columns[i].as_str()))
            .collect();
        self.project(&keep)
    }

    /// Returns a copy with exact-duplicate rows removed, keeping the first
    /// occurrence of each row in its original position.
    pub fn deduplicated(&self) -> Table {
        let mut seen: HashSet<&Vec<Option<String>>> = HashSet::with_capacity(self.rows.len());
        let rows = self
            .rows
            .iter()
            .filter(|row| seen.insert(*row))
            .cloned()
            .collect();
        Table {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        }
    }

    /// Returns a copy with every column that is missing in all rows removed.
    ///
    /// A table with no rows keeps its columns; there is nothing to scan.
    pub fn without_all_missing_columns(&self) -> Table {
        if self.rows.is_empty() {
            return self.clone();
        }
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| self.rows.iter().any(|row| row[i].is_some()))
            .collect();
        self.project(&keep)
    }

    /// Names of columns that are missing in every row.
    pub fn all_missing_columns(&self) -> Vec<String> {
        if self.rows.is_empty() {
            return Vec::new();
        }
        (0..self.columns.len())
            .filter(|&i| self.rows.iter().all(|row| row[i].is_none()))
            .map(|i| self.columns[i].clone())
            .collect()
    }

    fn project(&self, keep: &[usize]) -> Table {
        Table {
            name: self.name.clone(),
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            "status",
            &["Observation_ID", "Individual_ID", "Notes"],
            &[
                &["1", "A1", ""],
                &["2", "A1", ""],
                &["3", "B7", ""],
            ],
        )
    }

    #[test]
    fn test_empty_literal_cells_become_missing() {
        let table = sample();
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(0, 1), Some("A1"));
    }

    #[test]
    fn test_require_column_reports_table_name() {
        let err = sample().require_column("Edited_Date").unwrap_err();
        assert_eq!(
            err,
            PhenoError::MissingColumn {
                table: "status".to_string(),
                column: "Edited_Date".to_string(),
            }
        );
    }

    #[test]
    fn test_dropping_row_id_exposes_duplicates() {
        let table = sample().without_columns(&["Observation_ID"]);
        assert_eq!(table.len(), 3);
        let deduped = table.deduplicated();
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped.cell(0, 0), Some("A1"));
        assert_eq!(deduped.cell(1, 0), Some("B7"));
    }

    #[test]
    fn test_all_missing_columns_are_pruned() {
        let table = sample();
        assert_eq!(table.all_missing_columns(), vec!["Notes".to_string()]);
        let pruned = table.without_all_missing_columns();
        assert_eq!(pruned.columns, vec!["Observation_ID", "Individual_ID"]);
    }

    #[test]
    fn test_partially_missing_column_is_kept() {
        let table = Table::from_rows("t", &["a", "b"], &[&["1", ""], &["2", "x"]]);
        assert_eq!(table.without_all_missing_columns().columns, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_table_keeps_columns_when_pruning() {
        let table = Table::new("t", vec!["a".to_string()]);
        assert_eq!(table.without_all_missing_columns().columns, vec!["a"]);
    }
}
