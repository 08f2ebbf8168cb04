/// Errors that can occur within the storage layer.
///
/// # Migration note
///
/// The `Store` methods currently return `anyhow::Result` for backward
/// compatibility. This module defines the target error type to be used as
/// the codebase is progressively migrated away from `anyhow`. New code
/// should return `storage::error::Result<T>` where possible.
///
/// # Examples
///
/// ```rust
/// use vigia_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "alert",
///     id: "alert-99".to_string(),
/// };
/// assert!(err.to_string().contains("alert"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found in the database.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// A uniqueness constraint was violated (duplicate template name,
    /// concurrent open alert for the same dedup key).
    #[error("Storage: {entity} violates a unique constraint: {detail}")]
    Conflict {
        entity: &'static str,
        detail: String,
    },

    /// An underlying database error.
    #[error("Storage: database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    /// JSON serialization or deserialization failure (payload_json,
    /// variables_json, missing_documents columns).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored enum column holds a value the application no longer knows.
    #[error("Storage: invalid value in column '{column}': {value}")]
    InvalidColumnValue { column: &'static str, value: String },

    /// Generic storage error for cases not covered by other variants.
    #[error("Storage: {0}")]
    Other(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
