use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::aggregate::aggregate_person;
use crate::audit::{audit, sort_issues};
use crate::config::{ColumnMapping, EngineConfig, WeightEntry};
use crate::error::EngineError;
use crate::model::{
    ComputeOutput, DataQualityIssue, IssueKind, PersonCapacitySummary, StoredSummary, WorkRecord,
};

/// Compute capacity summaries for every person in `records`.
///
/// Configuration problems abort the whole batch. A person whose available hours are invalid is
/// skipped and reported as an issue; everyone else still gets a summary.
pub fn compute(records: &[WorkRecord], config: &EngineConfig) -> Result<ComputeOutput, EngineError> {
    config.validate()?;

    let groups = group_by_person(records);
    let unassigned = records.len() - groups.values().map(Vec::len).sum::<usize>();
    if unassigned > 0 {
        tracing::warn!(unassigned, "records without a person were left out of the batch");
    }

    let people: Vec<(&String, &Vec<WorkRecord>)> = groups.iter().collect();
    let results: Vec<(&String, Result<PersonCapacitySummary, EngineError>)> = people
        .par_iter()
        .map(|(person, recs)| {
            let available = config.available_hours_for(person);
            (*person, aggregate_person(person, recs, config, available))
        })
        .collect();

    let mut summaries = Vec::with_capacity(results.len());
    let mut issues = Vec::new();
    for (person, result) in results {
        match result {
            Ok(summary) => summaries.push(summary),
            Err(EngineError::InvalidAvailableHours { person_id, hours }) => {
                tracing::warn!(person = %person_id, hours, "skipping person with invalid available hours");
                issues.push(DataQualityIssue::person(
                    &person_id,
                    IssueKind::InvalidAvailableHours,
                    format!("available hours must be > 0, got {hours}"),
                ));
            }
            Err(e) => {
                tracing::error!(person = %person, error = %e, "aggregation failed");
                return Err(e);
            }
        }
    }

    tracing::info!(
        people = summaries.len(),
        skipped = issues.len(),
        records = records.len(),
        "computed capacity"
    );

    Ok(ComputeOutput { summaries, issues })
}

/// Compute summaries, then audit them against their records and any stored summaries.
/// Issues from both passes are merged into one ordered list.
pub fn run_audit(
    records: &[WorkRecord],
    config: &EngineConfig,
    stored: &[StoredSummary],
) -> Result<ComputeOutput, EngineError> {
    let mut output = compute(records, config)?;
    output
        .issues
        .extend(audit(&output.summaries, records, config, stored));
    sort_issues(&mut output.issues);

    tracing::info!(issues = output.issues.len(), "audit finished");
    Ok(output)
}

/// Records grouped by trimmed person id, in person order. Records with no person are dropped.
pub fn group_by_person(records: &[WorkRecord]) -> BTreeMap<String, Vec<WorkRecord>> {
    let mut groups: BTreeMap<String, Vec<WorkRecord>> = BTreeMap::new();
    for record in records {
        let person = record.person_id.trim();
        if person.is_empty() {
            continue;
        }
        groups.entry(person.to_string()).or_default().push(record.clone());
    }
    groups
}

/// Load CSV rows into WorkRecords using the configured column names.
///
/// `id`, `person_id` and `status` columns are required; the rest are optional and read as
/// absent when the column is missing or the cell is blank.
pub fn load_csv_records(
    file_label: &str,
    csv_data: &str,
    columns: &ColumnMapping,
) -> Result<Vec<WorkRecord>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let require = |name: &str| {
        find(name).ok_or_else(|| EngineError::MissingColumn {
            file: file_label.into(),
            column: name.into(),
        })
    };

    let id_idx = require(&columns.id)?;
    let person_idx = require(&columns.person_id)?;
    let status_idx = require(&columns.status)?;
    let name_idx = find(&columns.name);
    let effort_idx = find(&columns.effort);
    let role_idx = find(&columns.role);
    let work_type_idx = find(&columns.work_type);
    let phase_idx = find(&columns.phase);
    let direct_idx = find(&columns.direct_hours);
    let prior_idx = find(&columns.prior_weekly_hours);
    let logged_idx = find(&columns.logged_hours);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let row_data = result.map_err(|e| EngineError::Io(e.to_string()))?;
        // Header is line 1.
        let line = row + 2;

        let text = |idx: Option<usize>| {
            idx.and_then(|i| row_data.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let number = |idx: Option<usize>, field: &str| -> Result<Option<f64>, EngineError> {
            match text(idx) {
                None => Ok(None),
                Some(raw) => raw.parse::<f64>().map(Some).map_err(|_| EngineError::ValueParse {
                    file: file_label.into(),
                    line,
                    field: field.into(),
                    value: raw,
                }),
            }
        };

        records.push(WorkRecord {
            id: text(Some(id_idx)).unwrap_or_default(),
            person_id: text(Some(person_idx)).unwrap_or_default(),
            name: text(name_idx),
            effort_label: text(effort_idx),
            role_label: text(role_idx),
            work_type_label: text(work_type_idx),
            phase_label: text(phase_idx),
            status: text(Some(status_idx)).unwrap_or_default(),
            direct_hours: number(direct_idx, &columns.direct_hours)?,
            prior_weekly_hours: number(prior_idx, &columns.prior_weekly_hours)?,
            logged_hours: number(logged_idx, &columns.logged_hours)?,
        });
    }

    tracing::debug!(file = file_label, records = records.len(), "loaded csv records");
    Ok(records)
}

/// Load a JSON array of WorkRecords.
pub fn load_json_records(file_label: &str, json: &str) -> Result<Vec<WorkRecord>, EngineError> {
    serde_json::from_str(json).map_err(|e| EngineError::Io(format!("{file_label}: {e}")))
}

/// Load stored summaries (JSON array) for the stale-state audit.
pub fn load_stored_summaries(
    file_label: &str,
    json: &str,
) -> Result<Vec<StoredSummary>, EngineError> {
    serde_json::from_str(json).map_err(|e| EngineError::Io(format!("{file_label}: {e}")))
}

/// Load `config_type,key,value` rows.
pub fn load_weight_entries_csv(
    file_label: &str,
    csv_data: &str,
) -> Result<Vec<WeightEntry>, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| EngineError::Io(e.to_string()))?
        .clone();
    for column in ["config_type", "key", "value"] {
        if !headers.iter().any(|h| h == column) {
            return Err(EngineError::MissingColumn {
                file: file_label.into(),
                column: column.into(),
            });
        }
    }

    let mut entries = Vec::new();
    for (row, result) in reader.deserialize::<WeightEntry>().enumerate() {
        let entry = result.map_err(|e| EngineError::ConfigParse(format!(
            "{file_label}, line {}: {e}",
            row + 2
        )))?;
        entries.push(entry);
    }
    Ok(entries)
}
