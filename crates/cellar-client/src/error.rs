use cellar_types::ObjectId;

/// Errors from store client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The requested object was not found.
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    /// No object is bound to the requested name.
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// The object name is invalid.
    #[error("invalid object name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Names can only be bound to persistent objects.
    #[error("object {0} is not persistent")]
    NotPersisted(ObjectId),

    /// Persistent objects cannot be deleted.
    #[error("object {0} is persistent")]
    ObjectPersisted(ObjectId),

    /// Blob contents do not match the recorded signature (data corruption).
    #[error("signature mismatch for blob {0}")]
    SignatureMismatch(ObjectId),

    /// The allocation would exceed the configured memory limit.
    #[error("not enough memory: requested {requested} bytes, {available} available")]
    NotEnoughMemory { requested: u64, available: u64 },

    /// The metadata handle is malformed or references unknown members.
    #[error("invalid metadata: {0}")]
    InvalidMeta(String),

    /// Configuration could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error while reading configuration.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal lock poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
