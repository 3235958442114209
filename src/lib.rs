/// Seasonal leaf-cover phase fitting for plant phenology observations.
///
/// Joins a per-observation status table with per-individual metadata,
/// turns categorical intensity bins into numeric midpoints, and fits the
/// phase of a fixed annual sinusoid per individual and per species by
/// grid search.

pub mod aggregate;
pub mod config;
pub mod dates;
pub mod export;
pub mod fit;
pub mod ingest;
pub mod intensity;
pub mod join;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod table;
