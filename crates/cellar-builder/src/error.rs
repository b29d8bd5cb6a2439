use cellar_client::ClientError;
use cellar_types::TypeError;

/// Errors from building values into a store or resolving them back.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Neither the value's type nor any of its ancestors has a builder.
    /// A registry seeded with the default builders never raises this.
    #[error("no builder registered for {type_name} or any of its ancestors")]
    NoBuilder { type_name: &'static str },

    /// No resolver is registered for the object's typename.
    #[error("no resolver registered for typename {typename}")]
    NoResolver { typename: String },

    /// The parent lineages admit no consistent linearization.
    #[error("inconsistent lineage for {type_name}: {reason}")]
    InconsistentLineage {
        type_name: &'static str,
        reason: String,
    },

    /// The value has no byte encoding to fall back on.
    #[error("{type_name} cannot be encoded")]
    NotEncodable { type_name: &'static str },

    /// A typed builder was handed a value of another type.
    #[error("builder for {expected} received a {actual}")]
    UnexpectedType {
        expected: &'static str,
        actual: &'static str,
    },

    /// A resolved value could not be downcast to the requested type.
    #[error("resolved value is not a {expected}")]
    UnexpectedResolved { expected: &'static str },

    /// The object has a different typename than the operation requires.
    #[error("expected an object of type {expected}, found {actual}")]
    UnexpectedTypename { expected: String, actual: String },

    /// A member builder completed without producing an object.
    #[error("builder for member {type_name} produced no object")]
    EmptyMember { type_name: &'static str },

    /// Encoding or decoding of a value failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),

    /// Failure raised by a user-supplied builder or resolver.
    #[error(transparent)]
    Custom(Box<dyn std::error::Error + Send + Sync>),
}

impl BuildError {
    /// Wrap an arbitrary error raised inside a builder.
    pub fn custom(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Custom(err.into())
    }
}

/// Result alias for build and resolve operations.
pub type BuildResult<T> = Result<T, BuildError>;
