use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

use crate::adapter::ResolveError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Record not found.
    #[error("Not found: {context}")]
    NotFound { context: String },

    /// Natural key conflict.
    #[error("Already exists: {context}")]
    Duplicate { context: String },

    /// Invalid input data.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A source URL could not be resolved.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl StoreError {
    /// Create a NotFound error for a UUID lookup.
    pub fn not_found_by_id(kind: &str, id: Uuid) -> Self {
        Self::NotFound {
            context: format!("{kind} id={id}"),
        }
    }

    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation may succeed (locked database,
    /// dropped connection).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(db_err) => is_transient_db_error(db_err),
            _ => false,
        }
    }
}

fn is_transient_db_error(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(_) | DbErr::Query(_) => {
            let err_str = err.to_string().to_lowercase();
            // SQLite: database is locked, busy
            // PostgreSQL: connection refused, too many connections
            err_str.contains("locked")
                || err_str.contains("busy")
                || err_str.contains("timeout")
                || err_str.contains("connection")
                || err_str.contains("temporarily unavailable")
        }
        _ => false,
    }
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use sea_orm::RuntimeErr;

    use super::*;

    #[test]
    fn not_found_by_id_names_kind_and_id() {
        let id = Uuid::new_v4();
        let msg = StoreError::not_found_by_id("source", id).to_string();
        assert!(msg.contains("Not found"));
        assert!(msg.contains("source"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn locked_database_is_transient() {
        let locked = StoreError::Database(DbErr::Exec(RuntimeErr::Internal(
            "database is locked".to_string(),
        )));
        assert!(locked.is_transient());

        let constraint = StoreError::Database(DbErr::Exec(RuntimeErr::Internal(
            "UNIQUE constraint failed: items.id".to_string(),
        )));
        assert!(!constraint.is_transient());

        assert!(!StoreError::invalid_input("empty name").is_transient());
        assert!(!StoreError::Database(DbErr::RecordNotFound("x".to_string())).is_transient());
    }
}
