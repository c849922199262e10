use std::path::{Path, PathBuf};

use loadscope_workload::config::{EngineConfig, WeightConfig};
use loadscope_workload::engine::{
    load_csv_records, load_json_records, load_stored_summaries, load_weight_entries_csv,
};
use loadscope_workload::model::StoredSummary;
use loadscope_workload::WorkRecord;

use crate::exit_codes::{engine_exit_code, EXIT_RUNTIME};
use crate::CliError;

/// Read and validate a config file. A `weights_file` is resolved relative to the config's
/// directory and replaces any inline weight tables.
pub(crate) fn load_config(path: &Path) -> Result<EngineConfig, CliError> {
    let text = read(path)?;
    let mut config = EngineConfig::from_toml(&text).map_err(CliError::engine)?;

    if let Some(file) = config.weights_file.clone() {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let weights_path = base_dir.join(&file);
        let csv = read(&weights_path)?;
        let entries = load_weight_entries_csv(&file, &csv).map_err(CliError::engine)?;
        config.weights = WeightConfig::from_entries(&entries).map_err(CliError::engine)?;
        config.validate().map_err(CliError::engine)?;
        tracing::debug!(file = %weights_path.display(), entries = entries.len(), "loaded weights file");
    }

    Ok(config)
}

/// Records from CSV (using the config's column mapping) or a JSON array, by extension.
pub(crate) fn load_records(path: &Path, config: &EngineConfig) -> Result<Vec<WorkRecord>, CliError> {
    let text = read(path)?;
    let label = path.display().to_string();
    let records = match extension(path).as_deref() {
        Some("json") => load_json_records(&label, &text),
        _ => load_csv_records(&label, &text, &config.columns),
    }
    .map_err(CliError::engine)?;

    tracing::debug!(file = %label, records = records.len(), "loaded records");
    Ok(records)
}

pub(crate) fn load_stored(path: &Path) -> Result<Vec<StoredSummary>, CliError> {
    let text = read(path)?;
    load_stored_summaries(&path.display().to_string(), &text).map_err(CliError::engine)
}

/// Pretty JSON to stdout and/or a file.
pub(crate) fn emit_json<T: serde::Serialize>(
    value: &T,
    json: bool,
    output: Option<&PathBuf>,
) -> Result<(), CliError> {
    if !json && output.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("JSON serialization error: {e}")))?;

    if let Some(path) = output {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }
    if json {
        println!("{json_str}");
    }
    Ok(())
}

fn read(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::new(EXIT_RUNTIME, format!("cannot read {}: {e}", path.display())))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

impl CliError {
    pub(crate) fn engine(err: loadscope_workload::EngineError) -> Self {
        let hint = match &err {
            loadscope_workload::EngineError::MissingDefault { config_type } => Some(format!(
                "add a `default` entry to [weights.{config_type}]"
            )),
            loadscope_workload::EngineError::MissingColumn { .. } => {
                Some("map column names under [columns] in the config".to_string())
            }
            _ => None,
        };
        Self {
            code: engine_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}
