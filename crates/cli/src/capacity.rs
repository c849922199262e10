//! `loadscope compute | audit | simulate | candidates | validate`

use std::path::PathBuf;

use clap::Subcommand;
use serde::Serialize;

use loadscope_workload::config::{ConfigType, EngineConfig};
use loadscope_workload::model::{
    ComputeOutput, DataQualityIssue, MoveCandidate, MoveRequest, MoveSimulation,
    PersonCapacitySummary,
};
use loadscope_workload::{engine, rank_candidates, simulate_move};

use crate::exit_codes::EXIT_AUDIT_ISSUES;
use crate::util::{emit_json, load_config, load_records, load_stored};
use crate::CliError;

#[derive(Subcommand)]
pub enum CapacityCommands {
    /// Compute weekly hours and capacity status for every person
    #[command(after_help = "\
Examples:
  loadscope compute team.toml --records records.csv
  loadscope compute team.toml --records records.json --json
  loadscope compute team.toml --records records.csv --output capacity.json")]
    Compute {
        /// Path to the team config (.toml)
        config: PathBuf,

        /// Work records (.csv mapped by [columns], or .json)
        #[arg(long)]
        records: PathBuf,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Compute, then report data-quality issues (exit 3 when any are found)
    #[command(after_help = "\
Examples:
  loadscope audit team.toml --records records.csv
  loadscope audit team.toml --records records.csv --prior stored.json --json")]
    Audit {
        /// Path to the team config (.toml)
        config: PathBuf,

        /// Work records (.csv or .json)
        #[arg(long)]
        records: PathBuf,

        /// Summaries last written by external storage (.json), checked for staleness
        #[arg(long)]
        prior: Option<PathBuf>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,

        /// Write JSON output to file
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Project both people's capacity after moving records between them
    #[command(after_help = "\
Examples:
  loadscope simulate team.toml --records records.csv --from ben --to ana --move b1
  loadscope simulate team.toml --records records.csv --from ben --to ana --move b1,b2 --json")]
    Simulate {
        /// Path to the team config (.toml)
        config: PathBuf,

        /// Work records (.csv or .json)
        #[arg(long)]
        records: PathBuf,

        /// Person giving up the work
        #[arg(long)]
        from: String,

        /// Person receiving the work
        #[arg(long)]
        to: String,

        /// Record ids to move (comma-separated or repeated)
        #[arg(long = "move", value_delimiter = ',', required = true)]
        move_ids: Vec<String>,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,
    },

    /// Rank the source person's records as handover candidates for the target
    #[command(after_help = "\
Examples:
  loadscope candidates team.toml --records records.csv --from ben --to ana")]
    Candidates {
        /// Path to the team config (.toml)
        config: PathBuf,

        /// Work records (.csv or .json)
        #[arg(long)]
        records: PathBuf,

        /// Person giving up the work
        #[arg(long)]
        from: String,

        /// Person receiving the work
        #[arg(long)]
        to: String,

        /// Output JSON to stdout instead of human summary
        #[arg(long)]
        json: bool,
    },

    /// Validate a team config (and its weights file) without computing
    #[command(after_help = "\
Examples:
  loadscope validate team.toml")]
    Validate {
        /// Path to the team config (.toml)
        config: PathBuf,
    },
}

pub fn cmd_capacity(cmd: CapacityCommands) -> Result<(), CliError> {
    match cmd {
        CapacityCommands::Compute { config, records, json, output } => {
            cmd_compute(config, records, json, output)
        }
        CapacityCommands::Audit { config, records, prior, json, output } => {
            cmd_audit(config, records, prior, json, output)
        }
        CapacityCommands::Simulate { config, records, from, to, move_ids, json } => {
            cmd_simulate(config, records, from, to, move_ids, json)
        }
        CapacityCommands::Candidates { config, records, from, to, json } => {
            cmd_candidates(config, records, from, to, json)
        }
        CapacityCommands::Validate { config } => cmd_validate(config),
    }
}

// ---------------------------------------------------------------------------
// Report envelope
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ReportMeta {
    command: &'static str,
    config_name: String,
    engine_version: &'static str,
    run_at: String,
}

#[derive(Serialize)]
struct Report<'a, T: Serialize> {
    meta: ReportMeta,
    #[serde(flatten)]
    body: &'a T,
}

fn report<'a, T: Serialize>(command: &'static str, config: &EngineConfig, body: &'a T) -> Report<'a, T> {
    Report {
        meta: ReportMeta {
            command,
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION"),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        body,
    }
}

#[derive(Serialize)]
struct CandidateList<'a> {
    source: &'a str,
    target: &'a str,
    candidates: &'a [MoveCandidate],
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_compute(
    config_path: PathBuf,
    records_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let records = load_records(&records_path, &config)?;

    let result = engine::compute(&records, &config).map_err(CliError::engine)?;

    emit_json(&report("compute", &config, &result), json_output, output_file.as_ref())?;
    print_summaries(&result);
    print_issues(&result.issues);
    Ok(())
}

fn cmd_audit(
    config_path: PathBuf,
    records_path: PathBuf,
    prior_path: Option<PathBuf>,
    json_output: bool,
    output_file: Option<PathBuf>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let records = load_records(&records_path, &config)?;
    let stored = match prior_path {
        Some(ref path) => load_stored(path)?,
        None => Vec::new(),
    };

    let result = engine::run_audit(&records, &config, &stored).map_err(CliError::engine)?;

    emit_json(&report("audit", &config, &result), json_output, output_file.as_ref())?;
    print_summaries(&result);
    print_issues(&result.issues);

    if !result.issues.is_empty() {
        return Err(CliError::new(
            EXIT_AUDIT_ISSUES,
            format!("{} data-quality issue(s) found", result.issues.len()),
        )
        .with_hint("rerun with --json for the structured issue list"));
    }
    eprintln!("audit: no issues");
    Ok(())
}

fn cmd_simulate(
    config_path: PathBuf,
    records_path: PathBuf,
    from: String,
    to: String,
    move_ids: Vec<String>,
    json_output: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let records = load_records(&records_path, &config)?;

    let request = MoveRequest {
        source: from.clone(),
        target: to.clone(),
        record_ids: move_ids,
    };
    let sim = simulate_move(&records, &records, &request, &config).map_err(CliError::engine)?;

    emit_json(&report("simulate", &config, &sim), json_output, None)?;
    print_simulation(&sim);
    Ok(())
}

fn cmd_candidates(
    config_path: PathBuf,
    records_path: PathBuf,
    from: String,
    to: String,
    json_output: bool,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    let records = load_records(&records_path, &config)?;

    let candidates =
        rank_candidates(&from, &records, &to, &records, &config).map_err(CliError::engine)?;

    let list = CandidateList {
        source: from.trim(),
        target: to.trim(),
        candidates: &candidates,
    };
    emit_json(&report("candidates", &config, &list), json_output, None)?;

    eprintln!("{} candidate(s) to move from {} to {}:", candidates.len(), list.source, list.target);
    for c in &candidates {
        eprintln!(
            "  {:<12} {:>6.2} h  {:<8} {:<18} {:<6} -> {} {:.1}% / {} {:.1}%",
            c.record_id,
            c.weekly_hours,
            if c.experience_match { "match" } else { "-" },
            c.category,
            format!("{:?}", c.disruption).to_lowercase(),
            list.source,
            c.projected_source_utilization * 100.0,
            list.target,
            c.projected_target_utilization * 100.0,
        );
    }
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    let counts: Vec<String> = ConfigType::ALL
        .iter()
        .map(|t| format!("{t}={}", config.weights.table(*t).values.len()))
        .collect();
    eprintln!(
        "config OK: \"{}\", {} h/week default, {} person override(s), weights {}",
        config.name,
        config.available_hours,
        config.people.len(),
        counts.join(" "),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Human output (stderr)
// ---------------------------------------------------------------------------

fn print_summaries(result: &ComputeOutput) {
    let total: f64 = result.summaries.iter().map(|s| s.weekly_hours()).sum();
    eprintln!(
        "{} people, {:.2} h/week total",
        result.summaries.len(),
        total
    );
    for s in &result.summaries {
        eprintln!("  {}", summary_line(s));
    }
}

fn summary_line(s: &PersonCapacitySummary) -> String {
    let mut line = format!(
        "{:<12} {:>7.2} / {:<5} h  {:>6.1}%  {:<13} {} active / {} records",
        s.person_id,
        s.weekly_hours(),
        s.capacity.available_hours(),
        s.utilization() * 100.0,
        s.status().to_string(),
        s.active_records,
        s.total_records,
    );
    if s.hours_sources.logged_records > 0 {
        line.push_str(&format!(", {} logged", s.hours_sources.logged_records));
    }
    if s.data_quality.incomplete_records > 0 {
        line.push_str(&format!(", {} incomplete", s.data_quality.incomplete_records));
    }
    line
}

fn print_issues(issues: &[DataQualityIssue]) {
    for issue in issues {
        let scope = match (&issue.person_id, &issue.record_id) {
            (Some(p), Some(r)) => format!("{p}/{r}"),
            (Some(p), None) => p.clone(),
            (None, Some(r)) => format!("?/{r}"),
            (None, None) => "-".to_string(),
        };
        eprintln!("  [{}] {scope}: {}", issue.kind, issue.detail);
    }
}

fn print_simulation(sim: &MoveSimulation) {
    eprintln!(
        "moving {} record(s), {:.2} h/week: {}",
        sim.moved_record_ids.len(),
        sim.moved_hours,
        sim.moved_record_ids.join(", ")
    );
    eprintln!("  before  {}", summary_line(&sim.source_before));
    eprintln!("  after   {}", summary_line(&sim.source_after));
    eprintln!("  before  {}", summary_line(&sim.target_before));
    eprintln!("  after   {}", summary_line(&sim.target_after));
}
