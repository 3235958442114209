/// Delimited text reader
///
/// Reads observation exports (one header row, one record per line) into a
/// `Table`. Every cell is kept as text; empty cells and the configured
/// sentinel values (`-9999` in the usual exports) become missing.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::InputConfig;
use crate::model::PhenoError;
use crate::table::Table;

/// Reads a table from any reader.
pub fn read_table<R: Read>(name: &str, reader: R, config: &InputConfig) -> Result<Table, PhenoError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter as u8)
        .has_headers(true)
        .flexible(false)
        .from_reader(reader);

    let columns: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let mut table = Table::new(name, columns);

    for record in csv_reader.records() {
        let record = record?;
        table.rows.push(
            record
                .iter()
                .map(|cell| parse_cell(cell, &config.missing_values))
                .collect(),
        );
    }

    Ok(table)
}

/// Opens and reads a table from a file.
pub fn read_table_path(name: &str, path: &Path, config: &InputConfig) -> Result<Table, PhenoError> {
    let file = File::open(path)
        .map_err(|e| PhenoError::Ingest(format!("cannot open {}: {}", path.display(), e)))?;
    read_table(name, file, config)
}

fn parse_cell(cell: &str, missing_values: &[String]) -> Option<String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() || missing_values.iter().any(|m| m == trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS_CSV: &str = "\
Observation_ID,Individual_ID,Phenophase_Name,Phenophase_Intensity,Observation_Date
1,101,Leaves,25-49%,2019-04-01
2,101,Leaves,-9999,2019-04-15
3,202,Leaves,,2019-04-15
";

    #[test]
    fn test_reads_header_and_rows() {
        let table = read_table("status", STATUS_CSV.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(table.name, "status");
        assert_eq!(table.columns.len(), 5);
        assert_eq!(table.len(), 3);
        assert_eq!(table.cell(0, 3), Some("25-49%"));
    }

    #[test]
    fn test_sentinels_and_empty_cells_are_missing() {
        let table = read_table("status", STATUS_CSV.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(table.cell(1, 3), None);
        assert_eq!(table.cell(2, 3), None);
    }

    #[test]
    fn test_quoted_fields_keep_embedded_delimiters() {
        let text = "Individual_ID,Site_Name\n101,\"Oak Ridge, north plot\"\n";
        let table = read_table("individuals", text.as_bytes(), &InputConfig::default()).unwrap();
        assert_eq!(table.cell(0, 1), Some("Oak Ridge, north plot"));
    }

    #[test]
    fn test_alternate_delimiter() {
        let config = InputConfig {
            delimiter: '\t',
            ..InputConfig::default()
        };
        let text = "Individual_ID\tEdited_Date\n101\t2019-01-01\n";
        let table = read_table("individuals", text.as_bytes(), &config).unwrap();
        assert_eq!(table.cell(0, 1), Some("2019-01-01"));
    }

    #[test]
    fn test_ragged_row_is_ingest_error() {
        let text = "a,b\n1,2,3\n";
        let err = read_table("t", text.as_bytes(), &InputConfig::default()).unwrap_err();
        assert!(matches!(err, PhenoError::Ingest(_)), "got {:?}", err);
    }

    #[test]
    fn test_missing_file_is_ingest_error() {
        let err = read_table_path("t", Path::new("/nonexistent/phenofit.csv"), &InputConfig::default())
            .unwrap_err();
        assert!(matches!(err, PhenoError::Ingest(_)));
    }
}
