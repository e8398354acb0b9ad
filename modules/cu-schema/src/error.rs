use thiserror::Error;

pub type Result<T> = std::result::Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown DI version: {0}")]
    UnknownVersion(String),

    #[error("Unrecognized schema dialect: {0}")]
    UnknownDialect(String),

    #[error("Malformed field '{field}': {reason}")]
    Malformed { field: String, reason: String },

    #[error("Field '{field}' references missing definition '{definition}'")]
    UnresolvedDefinition { field: String, definition: String },

    #[error("Field '{field}' has unsupported type '{field_type}'")]
    UnsupportedType { field: String, field_type: String },

    #[error("Too many fields: {count} exceeds the maximum of {max}")]
    FieldCountExceeded { count: usize, max: usize },
}

impl SchemaError {
    pub(crate) fn malformed(field: &str, reason: impl Into<String>) -> Self {
        SchemaError::Malformed {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        SchemaError::Parse(err.to_string())
    }
}
