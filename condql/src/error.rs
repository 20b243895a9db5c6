use thiserror::Error;

/// Errors raised while converting a JSON where object into a [`crate::Where`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Where object must be a JSON object, got {0}")]
    NotAnObject(&'static str),
    #[error("Unrecognized condition for field {key}: {value}")]
    UnrecognizedCondition { key: String, value: String },
    #[error("Invalid {what} for field {key}: {reason}")]
    InvalidDescriptor { key: String, what: &'static str, reason: String },
    #[error("inSelectWithLevels requires at least one join level")]
    EmptyJoinLevels,
    #[error("Join level for table {0} has neither fkey nor inboundKey")]
    MissingJoinKey(String),
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),
    #[error("eq operands must be scalars, null or {{\"$raw\": ...}}, got {0}")]
    InvalidOperand(String),
}

impl ParseError {
    pub(crate) fn descriptor(key: &str, what: &'static str, reason: impl ToString) -> Self {
        ParseError::InvalidDescriptor { key: key.to_owned(), what, reason: reason.to_string() }
    }
}
