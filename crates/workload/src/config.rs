use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::EffortSize;

/// Weekly hours a person is assumed to have when no override is configured.
pub const DEFAULT_AVAILABLE_HOURS: f64 = 40.0;

/// Reserved key that designates a weight table's default entry.
pub const DEFAULT_KEY: &str = "default";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_available_hours")]
    pub available_hours: f64,
    #[serde(default)]
    pub people: BTreeMap<String, PersonConfig>,
    #[serde(default)]
    pub capacity: CapacityThresholds,
    #[serde(default)]
    pub audit: AuditConfig,
    /// Work types whose records may carry hours entered directly instead of the formula.
    #[serde(default)]
    pub direct_hours_work_types: Vec<String>,
    #[serde(default)]
    pub columns: ColumnMapping,
    /// CSV of `config_type,key,value` rows, relative to the config file.
    #[serde(default)]
    pub weights_file: Option<String>,
    #[serde(default)]
    pub weights: WeightConfig,
}

fn default_name() -> String {
    "workload".into()
}

fn default_available_hours() -> f64 {
    DEFAULT_AVAILABLE_HOURS
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersonConfig {
    pub available_hours: Option<f64>,
}

// ---------------------------------------------------------------------------
// Capacity + audit settings
// ---------------------------------------------------------------------------

/// Utilization band edges. Each band is closed on its lower edge.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct CapacityThresholds {
    #[serde(default = "default_near")]
    pub near: f64,
    #[serde(default = "default_over")]
    pub over: f64,
}

fn default_near() -> f64 {
    0.8
}

fn default_over() -> f64 {
    1.0
}

impl Default for CapacityThresholds {
    fn default() -> Self {
        Self {
            near: default_near(),
            over: default_over(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct AuditConfig {
    /// A near/over verdict is unreliable when more than this fraction of active records is incomplete.
    #[serde(default = "default_incomplete_threshold")]
    pub incomplete_threshold: f64,
}

fn default_incomplete_threshold() -> f64 {
    0.5
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            incomplete_threshold: default_incomplete_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// Column mapping (CSV record input)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub id: String,
    pub person_id: String,
    pub name: String,
    pub effort: String,
    pub role: String,
    pub work_type: String,
    pub phase: String,
    pub status: String,
    pub direct_hours: String,
    pub prior_weekly_hours: String,
    pub logged_hours: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            id: "id".into(),
            person_id: "person_id".into(),
            name: "name".into(),
            effort: "effort".into(),
            role: "role".into(),
            work_type: "work_type".into(),
            phase: "phase".into(),
            status: "status".into(),
            direct_hours: "direct_hours".into(),
            prior_weekly_hours: "prior_weekly_hours".into(),
            logged_hours: "logged_hours".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigType {
    EffortSize,
    RoleWeight,
    WorkTypeWeight,
    PhaseWeight,
}

impl ConfigType {
    pub const ALL: [ConfigType; 4] = [
        Self::EffortSize,
        Self::RoleWeight,
        Self::WorkTypeWeight,
        Self::PhaseWeight,
    ];
}

impl std::fmt::Display for ConfigType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EffortSize => write!(f, "effort_size"),
            Self::RoleWeight => write!(f, "role_weight"),
            Self::WorkTypeWeight => write!(f, "work_type_weight"),
            Self::PhaseWeight => write!(f, "phase_weight"),
        }
    }
}

/// One `(config_type, key) -> value` row from the configuration store.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WeightEntry {
    pub config_type: ConfigType,
    pub key: String,
    pub value: f64,
}

/// One lookup table. Labels match case-insensitively with whitespace collapsed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeightTable {
    #[serde(default)]
    pub default: Option<f64>,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
    /// Alternate spelling -> canonical key.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Result of resolving a present label against a table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Mapped { key: &'a str, value: f64 },
    /// Label present but unmapped; carries the table's default.
    Defaulted(f64),
}

impl Lookup<'_> {
    pub fn value(&self) -> f64 {
        match self {
            Self::Mapped { value, .. } => *value,
            Self::Defaulted(value) => *value,
        }
    }
}

pub(crate) fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl WeightTable {
    pub fn with_values<'a>(default: f64, values: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        Self {
            default: Some(default),
            values: values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            aliases: BTreeMap::new(),
        }
    }

    /// Canonical key + value for `label`, following aliases.
    pub fn find(&self, label: &str) -> Option<(&str, f64)> {
        let norm = normalize_label(label);
        let canonical = self
            .aliases
            .iter()
            .find(|(alias, _)| normalize_label(alias) == norm)
            .map(|(_, target)| normalize_label(target))
            .unwrap_or(norm);
        self.values
            .iter()
            .find(|(key, _)| normalize_label(key) == canonical)
            .map(|(key, value)| (key.as_str(), *value))
    }

    /// Resolve a present label; unmapped labels fall back to the default.
    /// Only call on a validated config.
    pub fn resolve(&self, label: &str) -> Lookup<'_> {
        match self.find(label) {
            Some((key, value)) => Lookup::Mapped { key, value },
            None => Lookup::Defaulted(self.default.unwrap_or(0.0)),
        }
    }

    fn validate(&self, config_type: ConfigType) -> Result<(), EngineError> {
        let default = self.default.ok_or(EngineError::MissingDefault { config_type })?;
        check_weight(config_type, DEFAULT_KEY, default)?;

        for (key, value) in &self.values {
            check_weight(config_type, key, *value)?;
            if config_type == ConfigType::EffortSize && EffortSize::from_token(key).is_none() {
                return Err(EngineError::ConfigValidation(format!(
                    "{config_type}: '{key}' is not an effort size (expected XS, S, M, L or XL)"
                )));
            }
        }

        let mut seen: HashMap<String, &str> = HashMap::new();
        for key in self.values.keys() {
            if let Some(prev) = seen.insert(normalize_label(key), key) {
                return Err(EngineError::ConfigValidation(format!(
                    "{config_type}: keys '{prev}' and '{key}' differ only in case or spacing"
                )));
            }
        }

        for (alias, target) in &self.aliases {
            if !seen.contains_key(&normalize_label(target)) {
                return Err(EngineError::ConfigValidation(format!(
                    "{config_type}: alias '{alias}' points at unknown key '{target}'"
                )));
            }
        }

        Ok(())
    }
}

fn check_weight(config_type: ConfigType, key: &str, value: f64) -> Result<(), EngineError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::ConfigValidation(format!(
            "{config_type}/{key}: weight must be a finite number >= 0, got {value}"
        )));
    }
    Ok(())
}

/// Immutable weight snapshot: effort -> base hours, and three multiplier tables.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeightConfig {
    #[serde(default)]
    pub effort_size: WeightTable,
    #[serde(default)]
    pub role_weight: WeightTable,
    #[serde(default)]
    pub work_type_weight: WeightTable,
    #[serde(default)]
    pub phase_weight: WeightTable,
}

impl WeightConfig {
    pub fn table(&self, config_type: ConfigType) -> &WeightTable {
        match config_type {
            ConfigType::EffortSize => &self.effort_size,
            ConfigType::RoleWeight => &self.role_weight,
            ConfigType::WorkTypeWeight => &self.work_type_weight,
            ConfigType::PhaseWeight => &self.phase_weight,
        }
    }

    fn table_mut(&mut self, config_type: ConfigType) -> &mut WeightTable {
        match config_type {
            ConfigType::EffortSize => &mut self.effort_size,
            ConfigType::RoleWeight => &mut self.role_weight,
            ConfigType::WorkTypeWeight => &mut self.work_type_weight,
            ConfigType::PhaseWeight => &mut self.phase_weight,
        }
    }

    /// Base hours for an effort bucket, or the effort default when the bucket is unmapped.
    pub fn base_hours(&self, size: EffortSize) -> Lookup<'_> {
        self.effort_size.resolve(size.token())
    }

    /// Build from flat configuration rows. The key `default` designates a table's default.
    pub fn from_entries(entries: &[WeightEntry]) -> Result<Self, EngineError> {
        let mut config = WeightConfig::default();
        for entry in entries {
            let table = config.table_mut(entry.config_type);
            let key = entry.key.trim();
            if key.eq_ignore_ascii_case(DEFAULT_KEY) {
                if table.default.replace(entry.value).is_some() {
                    return Err(EngineError::DuplicateWeight {
                        config_type: entry.config_type,
                        key: DEFAULT_KEY.into(),
                    });
                }
            } else if table.values.insert(key.to_string(), entry.value).is_some() {
                return Err(EngineError::DuplicateWeight {
                    config_type: entry.config_type,
                    key: key.to_string(),
                });
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        for config_type in ConfigType::ALL {
            self.table(config_type).validate(config_type)?;
        }
        Ok(())
    }

    /// Historical weights from the team workload spreadsheet.
    pub fn standard() -> Self {
        Self {
            effort_size: WeightTable::with_values(
                3.5,
                [("XS", 0.5), ("S", 1.5), ("M", 3.5), ("L", 7.5), ("XL", 15.0)],
            ),
            role_weight: WeightTable {
                aliases: [("Co-owner".to_string(), "Co-Owner".to_string())].into(),
                ..WeightTable::with_values(
                    1.0,
                    [("Owner", 1.0), ("Co-Owner", 1.0), ("Secondary", 0.5), ("Support", 0.5)],
                )
            },
            work_type_weight: WeightTable::with_values(
                1.0,
                [
                    ("System Initiative", 1.0),
                    ("System Project", 1.0),
                    ("Epic Gold", 1.0),
                    ("Governance", 0.7),
                    ("General Support", 1.0),
                    ("Policy", 0.5),
                    ("Market Project", 1.0),
                    ("Ticket", 1.0),
                ],
            ),
            phase_weight: WeightTable::with_values(
                1.0,
                [
                    ("Discovery/Define", 0.3),
                    ("Design", 1.0),
                    ("Build", 1.0),
                    ("Deploy", 1.0),
                    ("Did We Deliver", 0.25),
                    ("N/A", 1.0),
                ],
            ),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl EngineConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        // Weights loaded from `weights_file` are validated once the caller attaches them.
        if config.weights_file.is_none() {
            config.validate()?;
        } else {
            config.validate_settings()?;
        }
        Ok(config)
    }

    /// Config with the standard weight tables and default settings.
    pub fn with_weights(weights: WeightConfig) -> Self {
        Self {
            name: default_name(),
            available_hours: DEFAULT_AVAILABLE_HOURS,
            people: BTreeMap::new(),
            capacity: CapacityThresholds::default(),
            audit: AuditConfig::default(),
            direct_hours_work_types: Vec::new(),
            columns: ColumnMapping::default(),
            weights_file: None,
            weights,
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        self.validate_settings()?;
        self.weights.validate()
    }

    fn validate_settings(&self) -> Result<(), EngineError> {
        let CapacityThresholds { near, over } = self.capacity;
        if !(near.is_finite() && over.is_finite() && near > 0.0 && near < over) {
            return Err(EngineError::ConfigValidation(format!(
                "capacity thresholds must satisfy 0 < near < over, got near={near}, over={over}"
            )));
        }

        let threshold = self.audit.incomplete_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(EngineError::ConfigValidation(format!(
                "audit.incomplete_threshold must be within 0..=1, got {threshold}"
            )));
        }

        Ok(())
    }

    /// Available weekly hours for a person; per-person overrides win over the global figure.
    pub fn available_hours_for(&self, person_id: &str) -> f64 {
        self.people
            .get(person_id)
            .and_then(|p| p.available_hours)
            .unwrap_or(self.available_hours)
    }

    pub fn is_direct_hours_type(&self, work_type_key: &str) -> bool {
        let norm = normalize_label(work_type_key);
        self.direct_hours_work_types
            .iter()
            .any(|t| normalize_label(t) == norm)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "SCI team"
available_hours = 40

[people."p-dawn"]
available_hours = 32

[capacity]
near = 0.75
over = 0.95

[weights.effort_size]
default = 3.5
values = { XS = 0.5, S = 1.5, M = 3.5, L = 7.5, XL = 15.0 }

[weights.role_weight]
default = 1.0
values = { Owner = 1.0, "Co-Owner" = 1.0, Secondary = 0.5 }
aliases = { "Co-owner" = "Co-Owner" }

[weights.work_type_weight]
default = 1.0
values = { "System Initiative" = 1.0, Governance = 0.7 }

[weights.phase_weight]
default = 1.0
values = { Design = 1.0, "Did We Deliver" = 0.25 }
"#;

    #[test]
    fn parse_valid() {
        let config = EngineConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "SCI team");
        assert_eq!(config.capacity.near, 0.75);
        assert_eq!(config.audit.incomplete_threshold, 0.5);
        assert_eq!(config.available_hours_for("p-dawn"), 32.0);
        assert_eq!(config.available_hours_for("p-josh"), 40.0);
        assert_eq!(config.weights.effort_size.values["XL"], 15.0);
        assert_eq!(config.columns.work_type, "work_type");
    }

    #[test]
    fn lookup_is_case_and_space_insensitive() {
        let config = EngineConfig::from_toml(VALID).unwrap();
        let phase = &config.weights.phase_weight;
        assert_eq!(phase.find("did  we deliver"), Some(("Did We Deliver", 0.25)));
        assert_eq!(
            phase.resolve("Validate"),
            Lookup::Defaulted(1.0),
        );
    }

    #[test]
    fn alias_resolves_to_canonical_key() {
        let config = EngineConfig::from_toml(VALID).unwrap();
        let role = &config.weights.role_weight;
        assert_eq!(role.find("co-owner"), Some(("Co-Owner", 1.0)));
    }

    #[test]
    fn reject_missing_default() {
        let input = VALID.replace("[weights.phase_weight]\ndefault = 1.0\n", "[weights.phase_weight]\n");
        let err = EngineConfig::from_toml(&input).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingDefault { config_type: ConfigType::PhaseWeight }
        ));
        assert!(err.is_configuration());
    }

    #[test]
    fn reject_missing_table() {
        let input = r#"
[weights.effort_size]
default = 3.5
"#;
        let err = EngineConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("role_weight has no default entry"));
    }

    #[test]
    fn reject_non_canonical_effort_key() {
        let input = VALID.replace("XL = 15.0", "XXL = 25.0");
        let err = EngineConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'XXL' is not an effort size"));
    }

    #[test]
    fn reject_negative_weight() {
        let input = VALID.replace("Secondary = 0.5", "Secondary = -0.5");
        let err = EngineConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("role_weight/Secondary"));
    }

    #[test]
    fn reject_inverted_thresholds() {
        let input = VALID.replace("near = 0.75", "near = 1.2");
        let err = EngineConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("0 < near < over"));
    }

    #[test]
    fn reject_dangling_alias() {
        let input = VALID.replace("\"Co-owner\" = \"Co-Owner\"", "\"Co-owner\" = \"Coowner\"");
        let err = EngineConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("unknown key 'Coowner'"));
    }

    #[test]
    fn weights_file_defers_weight_validation() {
        let config = EngineConfig::from_toml("weights_file = \"weights.csv\"\n").unwrap();
        assert_eq!(config.weights_file.as_deref(), Some("weights.csv"));
        assert!(config.validate().is_err());
    }

    fn entry(config_type: ConfigType, key: &str, value: f64) -> WeightEntry {
        WeightEntry {
            config_type,
            key: key.into(),
            value,
        }
    }

    #[test]
    fn from_entries_builds_tables() {
        let entries = vec![
            entry(ConfigType::EffortSize, "default", 3.5),
            entry(ConfigType::EffortSize, "M", 3.5),
            entry(ConfigType::RoleWeight, "default", 1.0),
            entry(ConfigType::RoleWeight, "Owner", 1.0),
            entry(ConfigType::WorkTypeWeight, "default", 1.0),
            entry(ConfigType::PhaseWeight, "default", 1.0),
        ];
        let weights = WeightConfig::from_entries(&entries).unwrap();
        assert_eq!(weights.effort_size.default, Some(3.5));
        assert_eq!(weights.role_weight.values["Owner"], 1.0);
    }

    #[test]
    fn from_entries_rejects_duplicates() {
        let entries = vec![
            entry(ConfigType::RoleWeight, "Owner", 1.0),
            entry(ConfigType::RoleWeight, "Owner", 0.9),
        ];
        let err = WeightConfig::from_entries(&entries).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateWeight { .. }));
    }

    #[test]
    fn standard_weights_validate() {
        WeightConfig::standard().validate().unwrap();
    }
}
