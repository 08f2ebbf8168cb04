/// Errors that can occur within the notification subsystem.
///
/// Channel delivery never surfaces these: transport failures collapse into
/// [`crate::DeliveryOutcome`]. What remains are the genuinely fatal cases —
/// a channel that cannot be constructed from its configuration, and the seam
/// traits hitting an unreachable data store.
///
/// # Examples
///
/// ```rust
/// use vigia_notify::error::NotifyError;
///
/// let err = NotifyError::InvalidConfig("missing smtp_host".to_string());
/// assert!(err.to_string().contains("smtp_host"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// Channel configuration is missing a required field or contains an
    /// invalid value.
    #[error("Notify: invalid channel configuration: {0}")]
    InvalidConfig(String),

    /// The recipient directory could not be queried.
    #[error("Notify: recipient directory error: {0}")]
    Directory(String),

    /// The in-app feed or subscription store could not be written.
    #[error("Notify: storage error: {0}")]
    Storage(String),

    /// SMTP transport could not be constructed.
    #[error("Notify: SMTP error: {0}")]
    Smtp(String),

    /// Push client could not be constructed.
    #[error("Notify: push error: {0}")]
    Push(String),

    /// Generic notification error for cases not covered by other variants.
    #[error("Notify: {0}")]
    Other(String),
}

/// Convenience `Result` alias for notification operations.
pub type Result<T> = std::result::Result<T, NotifyError>;
