//! Type-directed builders for Cellar.
//!
//! Putting a value into a store means finding the builder registered for
//! its type, or for the closest ancestor that has one, and letting it create
//! the store objects. Resolving an object back is the same lookup in
//! reverse, keyed by the object's typename.
//!
//! ```
//! use cellar_builder::{ClientExt, PutOptions};
//! use cellar_client::{Client, InMemoryClient};
//!
//! let client = InMemoryClient::new();
//! let id = client
//!     .put(&42i64, PutOptions::new().persist(true).name("answer"))
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(client.get_name("answer").unwrap(), id);
//! assert_eq!(client.get_as::<i64>(&id).unwrap(), 42);
//! ```
//!
//! # Modules
//!
//! - [`lineage`]: type keys, ancestry and the [`Buildable`] trait
//! - [`builder`]: the [`Builder`] handle and what it receives and returns
//! - [`context`]: [`BuilderContext`], the builder registry
//! - [`scope`]: the per-thread active registry and scoped overrides
//! - [`put`]: the [`put`](fn@put) entry point
//! - [`resolver`]: [`ResolverContext`] and typed reads
//! - [`defaults`]: the builders and resolvers every registry starts from

pub mod builder;
pub mod context;
pub mod defaults;
pub mod error;
pub mod lineage;
pub mod put;
pub mod resolver;
pub mod scope;
pub mod values;

pub use builder::{BuildArgs, BuildCx, Builder, Built};
pub use context::{BuilderContext, Overrides};
pub use defaults::{
    register_default_builders, register_default_resolvers, ENCODED_TYPENAME, SCALAR_TYPENAME,
    SEQUENCE_TYPENAME,
};
pub use error::{BuildError, BuildResult};
pub use lineage::{AnyValue, Binary, Buildable, Lineage, Scalar, TypeKey};
pub use put::{put, ClientExt, PutOptions};
pub use resolver::{decode, get, get_as, ResolveCx, Resolved, Resolver, ResolverContext};
pub use scope::{
    builder_context, current_builders, current_resolvers, default_builders, default_resolvers,
    resolver_context, with_builders, with_resolvers, Frames, Scope, Scoped,
};
pub use values::Sequence;

#[doc(hidden)]
pub mod __private {
    pub use bincode;
}
