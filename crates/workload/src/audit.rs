//! Data-quality audit.
//!
//! Replaces the one-off fix-up scripts: every finding is reported as a structured
//! `DataQualityIssue` and nothing is ever mutated.

use std::collections::{BTreeMap, HashMap};

use crate::config::{normalize_label, EngineConfig};
use crate::hours::calculate_hours;
use crate::model::{
    DataQualityIssue, HoursMethod, IssueKind, PersonCapacitySummary, RecordField, RecordStatus,
    StoredSummary, WorkRecord,
};

/// Hours in a week; no single record can legitimately exceed it.
pub const HOURS_PER_WEEK: f64 = 168.0;

/// Tolerance when comparing stored hours with freshly computed hours.
const STALE_HOURS_EPSILON: f64 = 1e-6;

/// Audit computed summaries and their underlying records. Issues are ordered by person,
/// then record, then kind.
pub fn audit(
    summaries: &[PersonCapacitySummary],
    records: &[WorkRecord],
    config: &EngineConfig,
    stored: &[StoredSummary],
) -> Vec<DataQualityIssue> {
    let mut issues = Vec::new();

    for record in records {
        audit_record(record, config, &mut issues);
    }
    audit_duplicates(records, &mut issues);

    for summary in summaries {
        audit_summary(summary, config, &mut issues);
    }
    audit_stored(summaries, records, stored, &mut issues);

    sort_issues(&mut issues);
    issues
}

pub(crate) fn sort_issues(issues: &mut [DataQualityIssue]) {
    issues.sort_by(|a, b| {
        a.person_id
            .cmp(&b.person_id)
            .then_with(|| a.record_id.cmp(&b.record_id))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

fn audit_record(record: &WorkRecord, config: &EngineConfig, issues: &mut Vec<DataQualityIssue>) {
    if record.person_id.trim().is_empty() {
        issues.push(DataQualityIssue::record(
            record,
            IssueKind::UnassignedRecord,
            "record has no owning person",
        ));
    }

    let status = record.status();
    if let RecordStatus::Unrecognized(raw) = &status {
        issues.push(DataQualityIssue::record(
            record,
            IssueKind::UnrecognizedStatus,
            format!("status '{raw}' is not a known status; record contributes 0 h/week"),
        ));
    }

    for (field, value) in [
        ("direct_hours", record.direct_hours),
        ("prior_weekly_hours", record.prior_weekly_hours),
        ("logged_hours", record.logged_hours),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                issues.push(DataQualityIssue::record(
                    record,
                    IssueKind::ImpossibleValue,
                    format!("{field} is {v}; expected a finite number >= 0"),
                ));
            }
        }
    }

    let hours = calculate_hours(record, config);

    if hours.weekly_hours > HOURS_PER_WEEK {
        issues.push(DataQualityIssue::record(
            record,
            IssueKind::ImpossibleValue,
            format!(
                "computed {:.2} h/week exceeds the {HOURS_PER_WEEK} hours in a week",
                hours.weekly_hours
            ),
        ));
    }

    if hours.is_active() && !hours.missing_fields.is_empty() {
        let fields: Vec<String> = hours.missing_fields.iter().map(|f| f.to_string()).collect();
        let effect = if hours.method == HoursMethod::Logged {
            "no estimate; logged hours used"
        } else {
            "record contributes 0 h/week"
        };
        issues.push(DataQualityIssue::record(
            record,
            IssueKind::MissingFields,
            format!("missing {}; {effect}", fields.join(", ")),
        ));
    }

    if hours.is_active() {
        for field in &hours.defaulted_fields {
            let (label, table) = match field {
                RecordField::Effort => (record.effort(), "effort_size"),
                RecordField::Role => (record.role(), "role_weight"),
                RecordField::WorkType => (record.work_type(), "work_type_weight"),
                RecordField::Phase => (record.phase(), "phase_weight"),
            };
            issues.push(DataQualityIssue::record(
                record,
                IssueKind::UnmappedLabel,
                format!(
                    "{field} '{}' not found in {table}; default applied",
                    label.unwrap_or_default()
                ),
            ));
        }
    }

    if !hours.is_active() {
        if let Some(prior) = record.prior_weekly_hours.filter(|h| h.is_finite() && *h > 0.0) {
            issues.push(DataQualityIssue::record(
                record,
                IssueKind::StaleRecordHours,
                format!(
                    "stored {prior} h/week but status {} contributes 0",
                    hours.status
                ),
            ));
        }
    }
}

fn audit_duplicates(records: &[WorkRecord], issues: &mut Vec<DataQualityIssue>) {
    let mut by_id: BTreeMap<&str, Vec<&WorkRecord>> = BTreeMap::new();
    let mut by_name: BTreeMap<(&str, String), Vec<&WorkRecord>> = BTreeMap::new();

    for record in records {
        by_id.entry(record.id.as_str()).or_default().push(record);
        if let Some(name) = record.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            by_name
                .entry((record.person_id.trim(), normalize_label(name)))
                .or_default()
                .push(record);
        }
    }

    for (id, group) in by_id {
        if group.len() > 1 {
            issues.push(DataQualityIssue::record(
                group[0],
                IssueKind::DuplicateRecord,
                format!("record id '{id}' appears {} times", group.len()),
            ));
        }
    }

    for ((_, _), mut group) in by_name {
        if group.len() < 2 {
            continue;
        }
        group.sort_by(|a, b| a.id.cmp(&b.id));
        let first = group[0].id.clone();
        for dup in &group[1..] {
            if dup.id == first {
                // Already reported as a duplicate id.
                continue;
            }
            issues.push(DataQualityIssue::record(
                dup,
                IssueKind::DuplicateRecord,
                format!(
                    "assignment '{}' duplicates record '{first}'",
                    dup.name.as_deref().unwrap_or_default().trim()
                ),
            ));
        }
    }
}

fn audit_summary(
    summary: &PersonCapacitySummary,
    config: &EngineConfig,
    issues: &mut Vec<DataQualityIssue>,
) {
    use crate::model::CapacityStatus::{NearCapacity, OverCapacity};

    let ratio = summary.incomplete_ratio();
    if matches!(summary.status(), NearCapacity | OverCapacity)
        && ratio > config.audit.incomplete_threshold
    {
        issues.push(DataQualityIssue::person(
            &summary.person_id,
            IssueKind::UnreliableClassification,
            format!(
                "{} verdict rests on {} of {} active records being incomplete ({:.0}% > {:.0}%)",
                summary.status(),
                summary.data_quality.incomplete_records,
                summary.active_records,
                ratio * 100.0,
                config.audit.incomplete_threshold * 100.0,
            ),
        ));
    }
}

/// Compare what external storage last wrote against the fresh computation.
fn audit_stored(
    summaries: &[PersonCapacitySummary],
    records: &[WorkRecord],
    stored: &[StoredSummary],
    issues: &mut Vec<DataQualityIssue>,
) {
    let computed: HashMap<&str, &PersonCapacitySummary> =
        summaries.iter().map(|s| (s.person_id.as_str(), s)).collect();

    for prior in stored {
        let Some(summary) = computed.get(prior.person_id.as_str()) else {
            let owns_records = records.iter().any(|r| r.person_id.trim() == prior.person_id);
            if !owns_records {
                issues.push(DataQualityIssue::person(
                    &prior.person_id,
                    IssueKind::StaleSummary,
                    "stored summary exists but the person has no records",
                ));
            }
            continue;
        };

        let mut diffs = Vec::new();
        if let Some(status) = prior.status {
            if status != summary.status() {
                diffs.push(format!("status {status} (now {})", summary.status()));
            }
        }
        if let Some(hours) = prior.weekly_hours {
            if (hours - summary.weekly_hours()).abs() > STALE_HOURS_EPSILON {
                diffs.push(format!("{hours} h/week (now {:.4})", summary.weekly_hours()));
            }
        }
        if let Some(total) = prior.total_records {
            if total != summary.total_records {
                diffs.push(format!("{total} records (now {})", summary.total_records));
            }
        }

        if !diffs.is_empty() {
            issues.push(DataQualityIssue::person(
                &prior.person_id,
                IssueKind::StaleSummary,
                format!("stored summary is stale: {}", diffs.join(", ")),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_person;
    use crate::config::WeightConfig;
    use crate::model::CapacityStatus;

    fn config() -> EngineConfig {
        EngineConfig::with_weights(WeightConfig::standard())
    }

    fn record(id: &str, effort: &str, role: &str, status: &str) -> WorkRecord {
        let label = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        WorkRecord {
            id: id.into(),
            person_id: "p1".into(),
            name: None,
            effort_label: label(effort),
            role_label: label(role),
            work_type_label: Some("System Initiative".into()),
            phase_label: Some("Design".into()),
            status: status.into(),
            direct_hours: None,
            prior_weekly_hours: None,
            logged_hours: None,
        }
    }

    fn run(records: &[WorkRecord], available: f64) -> Vec<DataQualityIssue> {
        let cfg = config();
        let summary = aggregate_person("p1", records, &cfg, available).unwrap();
        audit(&[summary], records, &cfg, &[])
    }

    fn kinds(issues: &[DataQualityIssue]) -> Vec<IssueKind> {
        issues.iter().map(|i| i.kind).collect()
    }

    #[test]
    fn clean_records_have_no_issues() {
        let records = vec![record("a", "M", "Owner", "Active"), record("b", "L", "Owner", "Planning")];
        assert!(run(&records, 40.0).is_empty());
    }

    #[test]
    fn over_capacity_alone_is_not_an_issue() {
        let records = vec![record("a", "XL", "Owner", "Active"), record("b", "XL", "Owner", "Active")];
        let cfg = config();
        let summary = aggregate_person("p1", &records, &cfg, 20.0).unwrap();
        assert_eq!(summary.status(), CapacityStatus::OverCapacity);
        assert!(audit(&[summary], &records, &cfg, &[]).is_empty());
    }

    #[test]
    fn active_record_with_missing_fields() {
        let records = vec![record("a", "M", "", "Active")];
        let issues = run(&records, 40.0);
        assert_eq!(kinds(&issues), vec![IssueKind::MissingFields]);
        assert_eq!(issues[0].record_id.as_deref(), Some("a"));
        assert!(issues[0].detail.contains("missing role"));
    }

    #[test]
    fn terminal_record_with_missing_fields_is_quiet() {
        let records = vec![record("a", "", "", "Cancelled")];
        assert!(run(&records, 40.0).is_empty());
    }

    #[test]
    fn unreliable_classification() {
        // One complete XL record (15h) + two incomplete ones; 15/16 is near capacity.
        let records = vec![
            record("a", "XL", "Owner", "Active"),
            record("b", "M", "", "Active"),
            record("c", "", "Owner", "Active"),
        ];
        let issues = run(&records, 16.0);
        let unreliable: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::UnreliableClassification)
            .collect();
        assert_eq!(unreliable.len(), 1);
        assert_eq!(unreliable[0].person_id.as_deref(), Some("p1"));
        assert_eq!(unreliable[0].record_id, None);
        // Person-scope issue sorts ahead of record-scope issues.
        assert_eq!(issues[0].kind, IssueKind::UnreliableClassification);
    }

    #[test]
    fn incomplete_but_available_is_not_unreliable() {
        let records = vec![record("b", "M", "", "Active"), record("c", "", "Owner", "Active")];
        let issues = run(&records, 40.0);
        assert!(!kinds(&issues).contains(&IssueKind::UnreliableClassification));
    }

    #[test]
    fn stale_record_hours() {
        let mut r = record("a", "M", "Owner", "Completed");
        r.prior_weekly_hours = Some(3.5);
        let issues = run(&[r], 40.0);
        assert_eq!(kinds(&issues), vec![IssueKind::StaleRecordHours]);
        assert!(issues[0].detail.contains("Completed"));
    }

    #[test]
    fn unmapped_labels_on_active_record() {
        let mut r = record("a", "M", "Advisor", "Active");
        r.phase_label = Some("Validate".into());
        let issues = run(&[r], 40.0);
        assert_eq!(kinds(&issues), vec![IssueKind::UnmappedLabel, IssueKind::UnmappedLabel]);
        assert!(issues.iter().any(|i| i.detail.contains("role 'Advisor'")));
    }

    #[test]
    fn unrecognized_status_is_reported_and_zeroed() {
        let mut r = record("a", "M", "Advisor", "Paused");
        r.phase_label = Some("Validate".into());
        let issues = run(&[r], 40.0);
        // Not active, so its labels are not audited.
        assert_eq!(kinds(&issues), vec![IssueKind::UnrecognizedStatus]);
        assert!(issues[0].detail.contains("contributes 0"));
    }

    #[test]
    fn blank_status_is_unrecognized_but_inactive_is_not() {
        let blank = record("a", "M", "Owner", "");
        let archived = record("b", "M", "Owner", "Archived");
        let inactive = record("c", "M", "Owner", "Inactive");
        let issues = run(&[blank, archived, inactive], 40.0);
        let flagged: Vec<_> = issues
            .iter()
            .map(|i| (i.record_id.as_deref().unwrap_or_default(), i.kind))
            .collect();
        assert_eq!(
            flagged,
            vec![("a", IssueKind::UnrecognizedStatus), ("b", IssueKind::UnrecognizedStatus)]
        );
        assert!(issues[0].detail.contains("status ''"));
    }

    #[test]
    fn logged_hours_with_missing_fields() {
        let mut r = record("a", "", "", "Active");
        r.logged_hours = Some(4.0);
        let issues = run(&[r], 40.0);
        assert_eq!(kinds(&issues), vec![IssueKind::MissingFields]);
        assert!(issues[0].detail.contains("logged hours used"));
    }

    #[test]
    fn impossible_values() {
        let mut r = record("a", "M", "Owner", "Active");
        r.direct_hours = Some(-2.0);
        r.prior_weekly_hours = Some(f64::NAN);
        r.logged_hours = Some(-4.0);
        let issues = run(&[r], 40.0);
        assert_eq!(kinds(&issues), vec![IssueKind::ImpossibleValue; 3]);
        assert!(issues.iter().any(|i| i.detail.starts_with("logged_hours is -4")));
    }

    #[test]
    fn duplicates_by_id_and_name() {
        let mut a = record("a", "M", "Owner", "Active");
        a.name = Some("Sepsis bundle".into());
        let mut b = record("b", "M", "Owner", "Active");
        b.name = Some("sepsis  Bundle".into());
        let c = record("c", "S", "Owner", "Active");
        let c2 = record("c", "S", "Owner", "Active");
        let issues = run(&[a, b, c, c2], 40.0);
        let dups: Vec<_> = issues
            .iter()
            .filter(|i| i.kind == IssueKind::DuplicateRecord)
            .map(|i| i.record_id.clone().unwrap_or_default())
            .collect();
        assert_eq!(dups, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn unassigned_record() {
        let mut r = record("a", "M", "Owner", "Active");
        r.person_id = " ".into();
        let issues = audit(&[], &[r], &config(), &[]);
        assert_eq!(kinds(&issues), vec![IssueKind::UnassignedRecord]);
        assert_eq!(issues[0].person_id, None);
    }

    #[test]
    fn stale_stored_summary() {
        let records = vec![record("a", "M", "Owner", "Active")];
        let cfg = config();
        let summary = aggregate_person("p1", &records, &cfg, 40.0).unwrap();
        let stored = vec![
            StoredSummary {
                person_id: "p1".into(),
                weekly_hours: Some(41.0),
                status: Some(CapacityStatus::OverCapacity),
                total_records: Some(1),
            },
            StoredSummary {
                person_id: "ghost".into(),
                weekly_hours: Some(0.0),
                status: None,
                total_records: None,
            },
        ];
        let issues = audit(&[summary], &records, &cfg, &stored);
        assert_eq!(kinds(&issues), vec![IssueKind::StaleSummary, IssueKind::StaleSummary]);
        assert_eq!(issues[0].person_id.as_deref(), Some("ghost"));
        assert!(issues[1].detail.contains("status over_capacity (now available)"));
    }

    #[test]
    fn fresh_stored_summary_is_quiet() {
        let records = vec![record("a", "M", "Owner", "Active")];
        let cfg = config();
        let summary = aggregate_person("p1", &records, &cfg, 40.0).unwrap();
        let stored = vec![StoredSummary {
            person_id: "p1".into(),
            weekly_hours: Some(3.5),
            status: Some(CapacityStatus::Available),
            total_records: Some(1),
        }];
        assert!(audit(&[summary], &records, &cfg, &stored).is_empty());
    }
}
