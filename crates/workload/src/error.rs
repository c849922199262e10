use crate::config::ConfigType;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// TOML parse / deserialization error.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// Config validation error (bad threshold, unknown effort token, etc.).
    #[error("config validation error: {0}")]
    ConfigValidation(String),

    /// A weight table has no designated default entry. Fatal for the whole batch.
    #[error("configuration error: {config_type} has no default entry")]
    MissingDefault { config_type: ConfigType },

    /// The same (config_type, key) pair appears more than once in a weight entry list.
    #[error("configuration error: duplicate weight entry {config_type}/{key}")]
    DuplicateWeight { config_type: ConfigType, key: String },

    /// Available hours must be a positive, finite number.
    #[error("person '{person_id}': available hours must be > 0, got {hours}")]
    InvalidAvailableHours { person_id: String, hours: f64 },

    /// A requested move references a record the source person does not own.
    #[error("move rejected: record '{record_id}' does not belong to '{source_person}'")]
    MoveIntegrity { record_id: String, source_person: String },

    /// Malformed move request (same person on both sides, etc.).
    #[error("move rejected: {0}")]
    MoveRequest(String),

    /// Missing required column in input data.
    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },

    /// A cell could not be parsed into the expected type.
    #[error("{file}, line {line}: cannot parse {field} '{value}'")]
    ValueParse {
        file: String,
        line: usize,
        field: String,
        value: String,
    },

    /// IO / CSV / JSON reader error.
    #[error("IO error: {0}")]
    Io(String),
}

impl EngineError {
    /// Configuration problems halt a batch; everything else is scoped to one request.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ConfigParse(_)
                | Self::ConfigValidation(_)
                | Self::MissingDefault { .. }
                | Self::DuplicateWeight { .. }
        )
    }
}
