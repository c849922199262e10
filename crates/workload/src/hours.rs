use std::collections::BTreeSet;

use crate::config::{EngineConfig, Lookup, WeightTable};
use crate::effort::classify_effort;
use crate::model::{EffortSize, Factors, HoursMethod, RecordField, RecordHours, WorkRecord};

/// Category for work types that are absent or not in the work-type table.
pub const OTHER_CATEGORY: &str = "other";

/// Weekly-hours contribution of a single record.
///
/// Present-but-unmapped labels use the table default and are noted in `defaulted_fields`.
/// Absent labels are noted in `missing_fields` and contribute a factor of zero, so an
/// incomplete record never counts at full weight. A status outside the active set always
/// yields zero. On an active record, valid logged hours replace the estimate.
pub fn calculate_hours(record: &WorkRecord, config: &EngineConfig) -> RecordHours {
    let mut hours = estimate(record, config);

    if !hours.is_active() {
        hours.weekly_hours = 0.0;
        hours.estimated_hours = 0.0;
        hours.method = HoursMethod::Terminal;
        return hours;
    }

    if let Some(logged) = record.logged_hours.filter(|h| h.is_finite() && *h >= 0.0) {
        hours.weekly_hours = logged;
        hours.method = HoursMethod::Logged;
        hours.complete = true;
    }

    hours.effective_size = match hours.method {
        HoursMethod::Formula => hours.effort,
        HoursMethod::Direct | HoursMethod::Logged if hours.weekly_hours > 0.0 => {
            Some(EffortSize::from_hours(hours.weekly_hours))
        }
        _ => None,
    };
    hours
}

/// Formula or direct-hours estimate, ignoring status and logged hours.
fn estimate(record: &WorkRecord, config: &EngineConfig) -> RecordHours {
    let weights = &config.weights;
    let status = record.status();
    let effort = classify_effort(record.effort());

    let work_type = record.work_type().map(|label| weights.work_type_weight.resolve(label));
    let category = match work_type {
        Some(Lookup::Mapped { key, .. }) => key.to_string(),
        _ => OTHER_CATEGORY.to_string(),
    };

    // Direct-hours path: configured work types may carry hours entered on the record.
    if let (Some(Lookup::Mapped { key, .. }), Some(direct)) = (work_type, record.direct_hours) {
        if config.is_direct_hours_type(key) && direct.is_finite() && direct >= 0.0 {
            return RecordHours {
                record_id: record.id.clone(),
                weekly_hours: direct,
                estimated_hours: direct,
                complete: true,
                missing_fields: BTreeSet::new(),
                defaulted_fields: BTreeSet::new(),
                method: HoursMethod::Direct,
                factors: None,
                effort,
                effective_size: None,
                status,
                category,
            };
        }
    }

    let mut missing = BTreeSet::new();
    let mut defaulted = BTreeSet::new();

    let base_hours = match (record.effort(), effort) {
        (None, _) => {
            missing.insert(RecordField::Effort);
            0.0
        }
        (Some(_), Some(size)) => {
            let lookup = weights.base_hours(size);
            if matches!(lookup, Lookup::Defaulted(_)) {
                defaulted.insert(RecordField::Effort);
            }
            lookup.value()
        }
        (Some(_), None) => {
            defaulted.insert(RecordField::Effort);
            weights.effort_size.default.unwrap_or(0.0)
        }
    };

    let role_weight = factor(
        record.role(),
        &weights.role_weight,
        RecordField::Role,
        &mut missing,
        &mut defaulted,
    );
    let work_type_weight = match work_type {
        None => {
            missing.insert(RecordField::WorkType);
            0.0
        }
        Some(lookup) => {
            if matches!(lookup, Lookup::Defaulted(_)) {
                defaulted.insert(RecordField::WorkType);
            }
            lookup.value()
        }
    };
    let phase_weight = factor(
        record.phase(),
        &weights.phase_weight,
        RecordField::Phase,
        &mut missing,
        &mut defaulted,
    );

    let factors = Factors {
        base_hours,
        role_weight,
        work_type_weight,
        phase_weight,
    };

    RecordHours {
        record_id: record.id.clone(),
        weekly_hours: factors.product(),
        estimated_hours: factors.product(),
        complete: missing.is_empty(),
        missing_fields: missing,
        defaulted_fields: defaulted,
        method: HoursMethod::Formula,
        factors: Some(factors),
        effort,
        effective_size: None,
        status,
        category,
    }
}

fn factor(
    label: Option<&str>,
    table: &WeightTable,
    field: RecordField,
    missing: &mut BTreeSet<RecordField>,
    defaulted: &mut BTreeSet<RecordField>,
) -> f64 {
    match label {
        None => {
            missing.insert(field);
            0.0
        }
        Some(label) => {
            let lookup = table.resolve(label);
            if matches!(lookup, Lookup::Defaulted(_)) {
                defaulted.insert(field);
            }
            lookup.value()
        }
    }
}
