//! Domain error taxonomy.

use thiserror::Error;

/// Errors surfaced by duty roster operations.
///
/// Every mutating operation reports these synchronously; nothing is retried.
#[derive(Debug, Error)]
pub enum DutyError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    State(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl DutyError {
    /// Stable machine-readable code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DutyError::Validation(_) => "validation_error",
            DutyError::Conflict(_) => "conflict",
            DutyError::State(_) => "invalid_state",
            DutyError::Forbidden(_) => "forbidden",
            DutyError::NotFound(_) => "not_found",
            DutyError::Storage(_) => "storage_error",
        }
    }
}

impl From<sqlx::Error> for DutyError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DutyError::NotFound("Resource not found".into()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => DutyError::Conflict("Resource already exists".into()),
                        "23503" => DutyError::NotFound("Referenced resource not found".into()),
                        _ => DutyError::Storage(format!("Database error: {}", db_err)),
                    }
                } else {
                    DutyError::Storage(format!("Database error: {}", db_err))
                }
            }
            _ => DutyError::Storage(format!("Database error: {}", err)),
        }
    }
}

/// Schema-level (`#[validate(schema(...))]`) failures are reported under the
/// `__all__` field and surface through `field_errors` like any other field.
impl From<validator::ValidationErrors> for DutyError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| {
                    e.message
                        .clone()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
            })
            .collect();

        messages.sort();
        messages.dedup();

        let message = match messages.len() {
            0 => "Invalid input".to_string(),
            1 => messages.remove(0),
            n => format!("{} validation errors: {}", n, messages.join("; ")),
        };

        DutyError::Validation(message)
    }
}
