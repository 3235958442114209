/// Batch runner: read the two input tables, fit, write outputs.
///
/// Usage: `phenofit [config.toml]`
///
/// Without an argument the config path comes from `PHENOFIT_CONFIG` (a
/// `.env` file in the working directory is honoured) or defaults to
/// `phenofit.toml`.

use std::process::ExitCode;

use phenofit::config::{load_config, resolve_config_path, PipelineConfig};
use phenofit::export::write_outputs;
use phenofit::ingest::delimited::read_table_path;
use phenofit::logging::{self, Stage};
use phenofit::model::PhenoError;
use phenofit::pipeline;

fn run(config: &PipelineConfig) -> Result<(), PhenoError> {
    let status = read_table_path("status", &config.input.status_path, &config.input)
        .inspect_err(|e| logging::log_pipeline_error(Stage::Ingest, "read status table", e))?;
    let individuals = read_table_path("individuals", &config.input.individuals_path, &config.input)
        .inspect_err(|e| logging::log_pipeline_error(Stage::Ingest, "read individual table", e))?;
    logging::info(
        Stage::Ingest,
        None,
        &format!(
            "loaded {} status rows and {} individual rows",
            status.len(),
            individuals.len()
        ),
    );

    let output = pipeline::run(&status, &individuals, config)
        .inspect_err(|e| logging::log_pipeline_error(Stage::System, "pipeline", e))?;

    let written = write_outputs(&output, &config.output.dir)
        .inspect_err(|e| logging::log_pipeline_error(Stage::Export, "write outputs", e))?;
    for path in &written {
        logging::info(Stage::Export, None, &format!("wrote {}", path.display()));
    }
    Ok(())
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let path = resolve_config_path(std::env::args().nth(1));
    let config = match load_config(&path).and_then(PipelineConfig::with_env_overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("phenofit: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init_logger(
        config.logging.level,
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    logging::info(Stage::System, None, &format!("config: {}", path.display()));

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(_) => ExitCode::FAILURE,
    }
}
