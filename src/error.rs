//! Error taxonomy shared by the ledger, the task state machine and the stores.
//!
//! Callers match on [`ErrorKind`] rather than on message text.

use serde::Serialize;

/// Coarse classification of a [`ChoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A required field is missing or non-positive
    Validation,
    /// A referenced id does not exist
    NotFound,
    /// Wrong claimant, blocked participant, under age, or gate rejected
    Permission,
    /// The record is not in the state the transition expects
    Conflict,
    /// Balance below the amount being debited
    InsufficientFunds,
    /// Underlying storage failure
    Persistence,
}

/// Error returned by every ledger operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChoreError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Not allowed: {0}")]
    Permission(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Insufficient points: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("Storage error: {0}")]
    Persistence(String),
}

impl ChoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChoreError::Validation(_) => ErrorKind::Validation,
            ChoreError::NotFound { .. } => ErrorKind::NotFound,
            ChoreError::Permission(_) => ErrorKind::Permission,
            ChoreError::Conflict(_) => ErrorKind::Conflict,
            ChoreError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            ChoreError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

impl From<rusqlite::Error> for ChoreError {
    fn from(err: rusqlite::Error) -> Self {
        // The only UNIQUE constraints guard "one outstanding task per template"
        // and primary keys, both of which mean the write lost a race.
        if let rusqlite::Error::SqliteFailure(ref code, ref msg) = err {
            if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
            {
                return ChoreError::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "unique constraint violated".to_string()),
                );
            }
        }
        ChoreError::Persistence(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ChoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        ChoreError::Persistence(format!("Task join error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            ChoreError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(ChoreError::not_found("Task", 7).kind(), ErrorKind::NotFound);
        assert_eq!(
            ChoreError::InsufficientFunds {
                needed: 5,
                available: 2
            }
            .kind(),
            ErrorKind::InsufficientFunds
        );
    }

    #[test]
    fn test_unique_violation_maps_to_conflict() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (k TEXT UNIQUE); INSERT INTO t VALUES ('a');")
            .unwrap();
        let err: ChoreError = conn
            .execute("INSERT INTO t VALUES ('a')", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn test_other_sqlite_errors_are_persistence() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let err: ChoreError = conn
            .execute("INSERT INTO missing_table VALUES (1)", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }
}
