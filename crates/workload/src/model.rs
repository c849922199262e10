use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::classify::Capacity;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// A single assignment or initiative as supplied by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkRecord {
    pub id: String,
    pub person_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "effort")]
    pub effort_label: Option<String>,
    #[serde(default, alias = "role")]
    pub role_label: Option<String>,
    #[serde(default, alias = "work_type")]
    pub work_type_label: Option<String>,
    #[serde(default, alias = "phase")]
    pub phase_label: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub direct_hours: Option<f64>,
    #[serde(default)]
    pub prior_weekly_hours: Option<f64>,
    /// Actual hours logged against the record for the week being computed.
    #[serde(default)]
    pub logged_hours: Option<f64>,
}

impl WorkRecord {
    pub fn status(&self) -> RecordStatus {
        RecordStatus::parse(&self.status)
    }

    /// Derived from status at read time; never stored.
    pub fn is_active(&self) -> bool {
        self.status().is_active()
    }

    pub fn effort(&self) -> Option<&str> {
        present(&self.effort_label)
    }

    pub fn role(&self) -> Option<&str> {
        present(&self.role_label)
    }

    pub fn work_type(&self) -> Option<&str> {
        present(&self.work_type_label)
    }

    pub fn phase(&self) -> Option<&str> {
        present(&self.phase_label)
    }
}

/// Blank labels count as absent.
fn present(label: &Option<String>) -> Option<&str> {
    label.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Work-record lifecycle status. Only the five active statuses consume capacity; terminal
/// and unrecognized statuses contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    InProgress,
    NotStarted,
    Planning,
    Scaling,
    OnHold,
    Completed,
    Cancelled,
    Deleted,
    Inactive,
    Unrecognized(String),
}

impl RecordStatus {
    pub fn parse(raw: &str) -> Self {
        let norm: String = raw
            .trim()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c.to_ascii_lowercase() })
            .collect();
        let norm = norm.split_whitespace().collect::<Vec<_>>().join(" ");
        match norm.as_str() {
            "active" => Self::Active,
            "in progress" => Self::InProgress,
            "not started" => Self::NotStarted,
            "planning" => Self::Planning,
            "scaling" => Self::Scaling,
            "on hold" => Self::OnHold,
            "completed" | "complete" => Self::Completed,
            "cancelled" | "canceled" => Self::Cancelled,
            "deleted" => Self::Deleted,
            "inactive" => Self::Inactive,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    /// Counts toward capacity. Everything else, including an unrecognized status, is zero.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Active | Self::InProgress | Self::NotStarted | Self::Planning | Self::Scaling
        )
    }

    /// Not active and not merely paused: nothing left to hand over.
    pub fn is_closed(&self) -> bool {
        !self.is_active() && *self != Self::OnHold
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "Active"),
            Self::InProgress => write!(f, "In Progress"),
            Self::NotStarted => write!(f, "Not Started"),
            Self::Planning => write!(f, "Planning"),
            Self::Scaling => write!(f, "Scaling"),
            Self::OnHold => write!(f, "On Hold"),
            Self::Completed => write!(f, "Completed"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Deleted => write!(f, "Deleted"),
            Self::Inactive => write!(f, "Inactive"),
            Self::Unrecognized(raw) if raw.is_empty() => write!(f, "(blank)"),
            Self::Unrecognized(raw) => write!(f, "{raw}"),
        }
    }
}

/// Canonical effort-size bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EffortSize {
    XS,
    S,
    M,
    L,
    XL,
}

impl EffortSize {
    pub const ALL: [EffortSize; 5] = [Self::XS, Self::S, Self::M, Self::L, Self::XL];

    pub fn token(&self) -> &'static str {
        match self {
            Self::XS => "XS",
            Self::S => "S",
            Self::M => "M",
            Self::L => "L",
            Self::XL => "XL",
        }
    }

    /// Exact canonical token (case-insensitive). Used for weight-table keys.
    pub fn from_token(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|s| s.token() == upper)
    }
}

impl std::fmt::Display for EffortSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------------------------------------------------
// Per-record hours
// ---------------------------------------------------------------------------

/// A required record field that feeds the hours formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Effort,
    Role,
    WorkType,
    Phase,
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Effort => write!(f, "effort"),
            Self::Role => write!(f, "role"),
            Self::WorkType => write!(f, "work_type"),
            Self::Phase => write!(f, "phase"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HoursMethod {
    /// base × role × work type × phase
    Formula,
    /// Hours entered directly on the record.
    Direct,
    /// Actual hours logged for the week; replaces the estimate.
    Logged,
    /// Status does not count toward capacity; contributes nothing.
    Terminal,
}

impl HoursMethod {
    /// Formula and direct hours are estimates; logged hours are actuals.
    pub fn is_estimate(&self) -> bool {
        matches!(self, Self::Formula | Self::Direct)
    }
}

/// The four multipliers actually applied to a record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Factors {
    pub base_hours: f64,
    pub role_weight: f64,
    pub work_type_weight: f64,
    pub phase_weight: f64,
}

impl Factors {
    pub fn product(&self) -> f64 {
        self.base_hours * self.role_weight * self.work_type_weight * self.phase_weight
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.base_hours, self.role_weight, self.work_type_weight, self.phase_weight]
    }
}

/// Weekly-hours contribution of one record plus its data-quality verdict.
///
/// `weekly_hours` is what counts toward capacity. `estimated_hours` is the formula or direct
/// figure, kept alongside logged hours so the two can be compared.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordHours {
    pub record_id: String,
    pub weekly_hours: f64,
    pub estimated_hours: f64,
    pub complete: bool,
    pub missing_fields: BTreeSet<RecordField>,
    pub defaulted_fields: BTreeSet<RecordField>,
    pub method: HoursMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<Factors>,
    /// Size named by the effort label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<EffortSize>,
    /// Size the counted hours actually amount to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_size: Option<EffortSize>,
    pub status: RecordStatus,
    pub category: String,
}

impl RecordHours {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

// ---------------------------------------------------------------------------
// Person summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityStatus {
    Available,
    NearCapacity,
    OverCapacity,
}

impl std::fmt::Display for CapacityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "available"),
            Self::NearCapacity => write!(f, "near_capacity"),
            Self::OverCapacity => write!(f, "over_capacity"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategoryBreakdown {
    pub records: usize,
    pub active_records: usize,
    pub weekly_hours: f64,
}

/// Counts of active records with missing inputs. Per-field counts include records whose
/// logged hours stand in for the estimate; `incomplete_records` does not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQualityCounts {
    pub incomplete_records: usize,
    pub missing_effort: usize,
    pub missing_role: usize,
    pub missing_work_type: usize,
    pub missing_phase: usize,
    /// Effort, role and work type all absent.
    pub needs_baseline: usize,
    pub defaulted_labels: usize,
}

/// Where a person's counted hours came from, over active records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoursSources {
    pub logged_records: usize,
    pub estimated_records: usize,
    pub logged_hours: f64,
    pub estimated_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonCapacitySummary {
    pub person_id: String,
    pub total_records: usize,
    pub active_records: usize,
    pub terminal_records: usize,
    #[serde(flatten)]
    pub capacity: Capacity,
    pub categories: BTreeMap<String, CategoryBreakdown>,
    pub hours_sources: HoursSources,
    pub data_quality: DataQualityCounts,
    pub records: Vec<RecordHours>,
}

impl PersonCapacitySummary {
    pub fn weekly_hours(&self) -> f64 {
        self.capacity.weekly_hours()
    }

    pub fn status(&self) -> CapacityStatus {
        self.capacity.status()
    }

    pub fn utilization(&self) -> f64 {
        self.capacity.utilization()
    }

    /// Fraction of active records that are incomplete (0 when there are none).
    pub fn incomplete_ratio(&self) -> f64 {
        if self.active_records == 0 {
            0.0
        } else {
            self.data_quality.incomplete_records as f64 / self.active_records as f64
        }
    }
}

// ---------------------------------------------------------------------------
// Data quality
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingFields,
    UnmappedLabel,
    UnrecognizedStatus,
    ImpossibleValue,
    DuplicateRecord,
    UnassignedRecord,
    UnreliableClassification,
    StaleRecordHours,
    StaleSummary,
    InvalidAvailableHours,
}

impl std::fmt::Display for IssueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingFields => write!(f, "missing_fields"),
            Self::UnmappedLabel => write!(f, "unmapped_label"),
            Self::UnrecognizedStatus => write!(f, "unrecognized_status"),
            Self::ImpossibleValue => write!(f, "impossible_value"),
            Self::DuplicateRecord => write!(f, "duplicate_record"),
            Self::UnassignedRecord => write!(f, "unassigned_record"),
            Self::UnreliableClassification => write!(f, "unreliable_classification"),
            Self::StaleRecordHours => write!(f, "stale_record_hours"),
            Self::StaleSummary => write!(f, "stale_summary"),
            Self::InvalidAvailableHours => write!(f, "invalid_available_hours"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub kind: IssueKind,
    pub detail: String,
}

impl DataQualityIssue {
    pub fn person(person_id: &str, kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            person_id: Some(person_id.to_string()),
            record_id: None,
            kind,
            detail: detail.into(),
        }
    }

    pub fn record(record: &WorkRecord, kind: IssueKind, detail: impl Into<String>) -> Self {
        let person_id = Some(record.person_id.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        Self {
            person_id,
            record_id: Some(record.id.clone()),
            kind,
            detail: detail.into(),
        }
    }
}

/// A person summary as last written to external storage. Only used to detect stale state.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredSummary {
    pub person_id: String,
    #[serde(default)]
    pub weekly_hours: Option<f64>,
    #[serde(default)]
    pub status: Option<CapacityStatus>,
    #[serde(default)]
    pub total_records: Option<usize>,
}

// ---------------------------------------------------------------------------
// Batch output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputeOutput {
    pub summaries: Vec<PersonCapacitySummary>,
    pub issues: Vec<DataQualityIssue>,
}

impl ComputeOutput {
    pub fn summary(&self, person_id: &str) -> Option<&PersonCapacitySummary> {
        self.summaries.iter().find(|s| s.person_id == person_id)
    }
}

// ---------------------------------------------------------------------------
// Load balancing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub source: String,
    pub target: String,
    pub record_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveSimulation {
    pub source_before: PersonCapacitySummary,
    pub target_before: PersonCapacitySummary,
    pub source_after: PersonCapacitySummary,
    pub target_after: PersonCapacitySummary,
    pub moved_record_ids: Vec<String>,
    pub moved_hours: f64,
}

/// How disruptive a handover is, cheapest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Disruption {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveCandidate {
    pub record_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub category: String,
    pub status: RecordStatus,
    pub weekly_hours: f64,
    pub experience_match: bool,
    pub disruption: Disruption,
    pub projected_source_utilization: f64,
    pub projected_target_utilization: f64,
}
