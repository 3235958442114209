/// Input adapters that turn external tabular data into `Table`s.
///
/// Submodules:
/// - `delimited`: CSV / delimited text with a header row.

pub mod delimited;
