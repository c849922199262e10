use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::classify::Capacity;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hours::calculate_hours;
use crate::model::{
    CategoryBreakdown, DataQualityCounts, Factors, HoursSources, PersonCapacitySummary,
    RecordField, RecordHours, WorkRecord,
};

/// Build one person's capacity summary from their records.
///
/// Contributions are summed in a canonical order, so the result is bit-identical for any
/// ordering of `records`.
pub fn aggregate_person(
    person_id: &str,
    records: &[WorkRecord],
    config: &EngineConfig,
    available_hours: f64,
) -> Result<PersonCapacitySummary, EngineError> {
    let mut results: Vec<RecordHours> = records.iter().map(|r| calculate_hours(r, config)).collect();
    results.sort_by(canonical_order);

    let mut hours: Vec<f64> = Vec::with_capacity(results.len());
    let mut logged: Vec<f64> = Vec::new();
    let mut estimated: Vec<f64> = Vec::new();
    let mut category_hours: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut categories: BTreeMap<String, CategoryBreakdown> = BTreeMap::new();
    let mut quality = DataQualityCounts::default();
    let mut active_records = 0;

    for r in &results {
        let bucket = categories.entry(r.category.clone()).or_default();
        bucket.records += 1;

        if !r.is_active() {
            continue;
        }
        active_records += 1;
        bucket.active_records += 1;
        hours.push(r.weekly_hours);
        if r.method.is_estimate() {
            estimated.push(r.weekly_hours);
        } else {
            logged.push(r.weekly_hours);
        }
        category_hours
            .entry(r.category.clone())
            .or_default()
            .push(r.weekly_hours);
        tally_quality(&mut quality, r);
    }

    for (name, values) in category_hours {
        if let Some(bucket) = categories.get_mut(&name) {
            bucket.weekly_hours = canonical_sum(values);
        }
    }

    let hours_sources = HoursSources {
        logged_records: logged.len(),
        estimated_records: estimated.len(),
        logged_hours: canonical_sum(logged),
        estimated_hours: canonical_sum(estimated),
    };

    let weekly_hours = canonical_sum(hours);
    let capacity = Capacity::compute(person_id, weekly_hours, available_hours, &config.capacity)?;

    tracing::debug!(
        person = person_id,
        records = results.len(),
        active = active_records,
        logged = hours_sources.logged_records,
        weekly_hours,
        status = %capacity.status(),
        "aggregated person"
    );

    Ok(PersonCapacitySummary {
        person_id: person_id.to_string(),
        total_records: results.len(),
        active_records,
        terminal_records: results.len() - active_records,
        capacity,
        categories,
        hours_sources,
        data_quality: quality,
        records: results,
    })
}

/// Total order over every serialized field, so records sharing an id still sort the same way
/// whatever order they arrived in.
fn canonical_order(a: &RecordHours, b: &RecordHours) -> Ordering {
    a.record_id
        .cmp(&b.record_id)
        .then_with(|| a.weekly_hours.total_cmp(&b.weekly_hours))
        .then_with(|| a.estimated_hours.total_cmp(&b.estimated_hours))
        .then_with(|| a.category.cmp(&b.category))
        .then_with(|| a.status.cmp(&b.status))
        .then_with(|| a.method.cmp(&b.method))
        .then_with(|| a.complete.cmp(&b.complete))
        .then_with(|| a.missing_fields.cmp(&b.missing_fields))
        .then_with(|| a.defaulted_fields.cmp(&b.defaulted_fields))
        .then_with(|| a.effort.cmp(&b.effort))
        .then_with(|| a.effective_size.cmp(&b.effective_size))
        .then_with(|| cmp_factors(a.factors.as_ref(), b.factors.as_ref()))
}

fn cmp_factors(a: Option<&Factors>, b: Option<&Factors>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a
            .as_array()
            .iter()
            .zip(b.as_array().iter())
            .map(|(x, y)| x.total_cmp(y))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal),
    }
}

/// Order-independent sum: values are put in a total order before adding.
pub(crate) fn canonical_sum(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    values.into_iter().fold(0.0, |acc, v| acc + v)
}

fn tally_quality(quality: &mut DataQualityCounts, r: &RecordHours) {
    if !r.defaulted_fields.is_empty() {
        quality.defaulted_labels += 1;
    }
    if !r.complete {
        quality.incomplete_records += 1;
    }

    let missing = |field| r.missing_fields.contains(&field);
    if missing(RecordField::Effort) {
        quality.missing_effort += 1;
    }
    if missing(RecordField::Role) {
        quality.missing_role += 1;
    }
    if missing(RecordField::WorkType) {
        quality.missing_work_type += 1;
    }
    if missing(RecordField::Phase) {
        quality.missing_phase += 1;
    }
    if missing(RecordField::Effort) && missing(RecordField::Role) && missing(RecordField::WorkType) {
        quality.needs_baseline += 1;
    }
}
