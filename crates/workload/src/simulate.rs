//! What-if load balancing between two people.
//!
//! Simulations run the calculator and aggregator over in-memory copies; source records are
//! never written back.

use std::collections::HashSet;

use crate::aggregate::{aggregate_person, canonical_sum};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::hours::{calculate_hours, OTHER_CATEGORY};
use crate::model::{
    Disruption, MoveCandidate, MoveRequest, MoveSimulation, PersonCapacitySummary, RecordStatus,
    WorkRecord,
};

/// Allowed drift between total hours before and after a move (float summation only).
const CONSERVATION_EPSILON: f64 = 1e-9;

/// Project both people's summaries after moving `request.record_ids` from source to target.
///
/// Only records owned by each person are counted, so both slices may be the whole batch.
pub fn simulate_move(
    source_records: &[WorkRecord],
    target_records: &[WorkRecord],
    request: &MoveRequest,
    config: &EngineConfig,
) -> Result<MoveSimulation, EngineError> {
    let (source, target) = check_people(&request.source, &request.target)?;
    let source_records = owned_by(source_records, source);
    let target_records = owned_by(target_records, target);

    let mut seen = HashSet::new();
    let moved_ids: Vec<&str> = request
        .record_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| seen.insert(*id))
        .collect();

    for id in &moved_ids {
        if !source_records.iter().any(|r| r.id == *id) {
            return Err(EngineError::MoveIntegrity {
                record_id: id.to_string(),
                source_person: source.to_string(),
            });
        }
    }

    let source_available = config.available_hours_for(source);
    let target_available = config.available_hours_for(target);

    let source_before = aggregate_person(source, &source_records, config, source_available)?;
    let target_before = aggregate_person(target, &target_records, config, target_available)?;

    let (moving, staying): (Vec<WorkRecord>, Vec<WorkRecord>) = source_records
        .into_iter()
        .partition(|r| moved_ids.contains(&r.id.as_str()));

    let mut receiving = target_records;
    receiving.extend(moving.iter().cloned().map(|mut r| {
        r.person_id = target.to_string();
        r
    }));

    let source_after = aggregate_person(source, &staying, config, source_available)?;
    let target_after = aggregate_person(target, &receiving, config, target_available)?;

    let moved_hours = canonical_sum(
        moving
            .iter()
            .map(|r| calculate_hours(r, config))
            .filter(|h| h.is_active())
            .map(|h| h.weekly_hours)
            .collect(),
    );

    let before = source_before.weekly_hours() + target_before.weekly_hours();
    let after = source_after.weekly_hours() + target_after.weekly_hours();
    debug_assert!(
        (before - after).abs() <= CONSERVATION_EPSILON * before.abs().max(1.0),
        "move did not conserve hours: {before} before, {after} after"
    );

    tracing::debug!(
        source,
        target,
        moved = moving.len(),
        moved_hours,
        "simulated move"
    );

    Ok(MoveSimulation {
        source_before,
        target_before,
        source_after,
        target_after,
        moved_record_ids: moving.iter().map(|r| r.id.clone()).collect(),
        moved_hours,
    })
}

/// Advisory ranking of source records worth handing to the target.
///
/// Experience match first (the target already carries hours in that work type), then lower
/// disruption, then larger weekly hours, then record id.
pub fn rank_candidates(
    source: &str,
    source_records: &[WorkRecord],
    target: &str,
    target_records: &[WorkRecord],
    config: &EngineConfig,
) -> Result<Vec<MoveCandidate>, EngineError> {
    let (source, target) = check_people(source, target)?;
    let source_records = owned_by(source_records, source);
    let target_records = owned_by(target_records, target);

    let source_summary =
        aggregate_person(source, &source_records, config, config.available_hours_for(source))?;
    let target_summary =
        aggregate_person(target, &target_records, config, config.available_hours_for(target))?;

    let mut candidates: Vec<MoveCandidate> = source_records
        .iter()
        .filter(|r| !r.status().is_closed())
        .map(|r| candidate(r, config, &source_summary, &target_summary))
        .collect();

    candidates.sort_by(|a, b| {
        b.experience_match
            .cmp(&a.experience_match)
            .then_with(|| a.disruption.cmp(&b.disruption))
            .then_with(|| b.weekly_hours.total_cmp(&a.weekly_hours))
            .then_with(|| a.record_id.cmp(&b.record_id))
    });

    Ok(candidates)
}

fn owned_by(records: &[WorkRecord], person: &str) -> Vec<WorkRecord> {
    records
        .iter()
        .filter(|r| r.person_id.trim() == person)
        .cloned()
        .collect()
}

fn check_people<'a>(source: &'a str, target: &'a str) -> Result<(&'a str, &'a str), EngineError> {
    let (source, target) = (source.trim(), target.trim());
    if source.is_empty() || target.is_empty() {
        return Err(EngineError::MoveRequest("source and target people are required".into()));
    }
    if source == target {
        return Err(EngineError::MoveRequest(format!(
            "source and target are the same person '{source}'"
        )));
    }
    Ok((source, target))
}

fn candidate(
    record: &WorkRecord,
    config: &EngineConfig,
    source: &PersonCapacitySummary,
    target: &PersonCapacitySummary,
) -> MoveCandidate {
    let hours = calculate_hours(record, config);
    let moving = if hours.is_active() { hours.weekly_hours } else { 0.0 };

    let experience_match = hours.category != OTHER_CATEGORY
        && target
            .categories
            .get(&hours.category)
            .is_some_and(|c| c.weekly_hours > 0.0);

    MoveCandidate {
        record_id: record.id.clone(),
        name: record.name.clone(),
        category: hours.category.clone(),
        disruption: disruption(&hours.status),
        status: hours.status,
        weekly_hours: moving,
        experience_match,
        projected_source_utilization: (source.weekly_hours() - moving)
            / source.capacity.available_hours(),
        projected_target_utilization: (target.weekly_hours() + moving)
            / target.capacity.available_hours(),
    }
}

/// Work that has not started, or is paused, is cheaper to hand over than work in flight.
fn disruption(status: &RecordStatus) -> Disruption {
    match status {
        RecordStatus::Planning | RecordStatus::NotStarted | RecordStatus::OnHold => Disruption::Low,
        RecordStatus::InProgress => Disruption::High,
        _ => Disruption::Medium,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WeightConfig;

    fn config() -> EngineConfig {
        EngineConfig::with_weights(WeightConfig::standard())
    }

    fn record(id: &str, person: &str, effort: &str, work_type: &str, status: &str) -> WorkRecord {
        WorkRecord {
            id: id.into(),
            person_id: person.into(),
            name: Some(format!("Initiative {id}")),
            effort_label: Some(effort.into()),
            role_label: Some("Owner".into()),
            work_type_label: Some(work_type.into()),
            phase_label: Some("Design".into()),
            status: status.into(),
            direct_hours: None,
            prior_weekly_hours: None,
            logged_hours: None,
        }
    }

    fn people() -> (Vec<WorkRecord>, Vec<WorkRecord>) {
        let source = vec![
            record("s1", "ana", "XL", "System Initiative", "In Progress"),
            record("s2", "ana", "L", "Epic Gold", "Planning"),
            record("s3", "ana", "M", "Policy", "On Hold"),
            record("s4", "ana", "S", "System Initiative", "Completed"),
        ];
        let target = vec![record("t1", "ben", "M", "Epic Gold", "Active")];
        (source, target)
    }

    fn request(ids: &[&str]) -> MoveRequest {
        MoveRequest {
            source: "ana".into(),
            target: "ben".into(),
            record_ids: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn move_conserves_hours() {
        let (source, target) = people();
        let sim = simulate_move(&source, &target, &request(&["s1", "s2"]), &config()).unwrap();
        let before = sim.source_before.weekly_hours() + sim.target_before.weekly_hours();
        let after = sim.source_after.weekly_hours() + sim.target_after.weekly_hours();
        assert!((before - after).abs() < 1e-9);
        assert_eq!(sim.moved_hours, 15.0 + 7.5);
        assert_eq!(sim.source_after.weekly_hours(), 0.0);
        assert_eq!(sim.target_after.weekly_hours(), 3.5 + 22.5);
        assert_eq!(sim.target_after.total_records, 3);
        assert_eq!(sim.source_after.total_records, 2);
    }

    #[test]
    fn inputs_are_not_mutated() {
        let (source, target) = people();
        let (source_copy, target_copy) = (source.clone(), target.clone());
        simulate_move(&source, &target, &request(&["s1"]), &config()).unwrap();
        assert_eq!(source, source_copy);
        assert_eq!(target, target_copy);
    }

    #[test]
    fn foreign_record_is_rejected() {
        let (source, target) = people();
        let err = simulate_move(&source, &target, &request(&["s1", "t1"]), &config()).unwrap_err();
        match err {
            EngineError::MoveIntegrity { record_id, source_person } => {
                assert_eq!(record_id, "t1");
                assert_eq!(source_person, "ana");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn same_person_is_rejected() {
        let (source, _) = people();
        let req = MoveRequest {
            source: "ana".into(),
            target: "ana".into(),
            record_ids: vec!["s1".into()],
        };
        let err = simulate_move(&source, &source, &req, &config()).unwrap_err();
        assert!(matches!(err, EngineError::MoveRequest(_)));
    }

    #[test]
    fn duplicate_ids_move_once() {
        let (source, target) = people();
        let sim = simulate_move(&source, &target, &request(&["s2", "s2"]), &config()).unwrap();
        assert_eq!(sim.moved_record_ids, vec!["s2".to_string()]);
        assert_eq!(sim.moved_hours, 7.5);
    }

    #[test]
    fn moved_records_take_target_available_hours() {
        let (source, target) = people();
        let mut cfg = config();
        cfg.people.insert(
            "ben".into(),
            crate::config::PersonConfig { available_hours: Some(20.0) },
        );
        let sim = simulate_move(&source, &target, &request(&["s2"]), &cfg).unwrap();
        assert_eq!(sim.target_after.capacity.available_hours(), 20.0);
        assert_eq!(sim.target_after.utilization(), 11.0 / 20.0);
    }

    #[test]
    fn ranking_prefers_experience_then_low_disruption() {
        let (source, target) = people();
        let ranked = rank_candidates("ana", &source, "ben", &target, &config()).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.record_id.as_str()).collect();
        // s2 matches ben's Epic Gold work; s3 is on hold (low disruption, 0h); s1 is in flight.
        // s4 is completed and never offered.
        assert_eq!(ids, vec!["s2", "s3", "s1"]);
        assert!(ranked[0].experience_match);
        assert_eq!(ranked[0].disruption, Disruption::Low);
        assert_eq!(ranked[2].disruption, Disruption::High);
        assert_eq!(ranked[1].weekly_hours, 0.0);
    }

    #[test]
    fn mixed_record_lists_count_only_each_owner() {
        let (source, target) = people();
        let everyone: Vec<WorkRecord> = source.iter().chain(&target).cloned().collect();
        let split = simulate_move(&source, &target, &request(&["s2"]), &config()).unwrap();
        let mixed = simulate_move(&everyone, &everyone, &request(&["s2"]), &config()).unwrap();
        assert_eq!(mixed, split);
        assert_eq!(mixed.source_before.total_records, 4);
        assert_eq!(mixed.target_before.total_records, 1);
        assert_eq!(mixed.target_after.weekly_hours(), 3.5 + 7.5);

        let ranked = rank_candidates("ana", &everyone, "ben", &everyone, &config()).unwrap();
        assert!(ranked.iter().all(|c| c.record_id.starts_with('s')));
    }

    #[test]
    fn unrecognized_and_inactive_records_are_not_offered() {
        let (mut source, target) = people();
        source.push(record("s5", "ana", "M", "Epic Gold", "Inactive"));
        source.push(record("s6", "ana", "M", "Epic Gold", "Archived"));
        let ranked = rank_candidates("ana", &source, "ben", &target, &config()).unwrap();
        let ids: Vec<&str> = ranked.iter().map(|c| c.record_id.as_str()).collect();
        assert_eq!(ids, vec!["s2", "s3", "s1"]);
    }

    #[test]
    fn ranking_projects_utilization() {
        let (source, target) = people();
        let ranked = rank_candidates("ana", &source, "ben", &target, &config()).unwrap();
        let s1 = ranked.iter().find(|c| c.record_id == "s1").unwrap();
        assert_eq!(s1.projected_source_utilization, 7.5 / 40.0);
        assert_eq!(s1.projected_target_utilization, 18.5 / 40.0);
    }
}
