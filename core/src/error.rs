use thiserror::Error;

/// Errors raised while assembling or validating a [`crate::Command`] before
/// it ever reaches the wire encoder.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command on table '{table}' is missing a required field: {field}")]
    MissingField { table: String, field: &'static str },

    #[error("invalid value for {context}: {message}")]
    InvalidValue { context: String, message: String },
}

pub type CommandResult<T> = Result<T, CommandError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_context() {
        let err = CommandError::MissingField {
            table: "users".into(),
            field: "index_def",
        };
        assert!(err.to_string().contains("users"));
        assert!(err.to_string().contains("index_def"));
    }
}
