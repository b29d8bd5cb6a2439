//! Store client boundary for Cellar.
//!
//! The builder registry never talks to a store directly: it is handed a
//! [`Client`] and passes it through to whichever builder it selects. This
//! crate defines that capability set and ships an in-memory implementation.
//!
//! # Modules
//!
//! - [`error`]: Error types for client operations
//! - [`traits`]: The [`Client`] trait
//! - [`memory`]: [`InMemoryClient`] for tests, embedding and the CLI
//! - [`config`]: [`ClientConfig`] loaded from TOML or the environment
//! - [`names`]: Object name validation
//!
//! # Design Rules
//!
//! 1. Objects are immutable once sealed; only the persistent flag changes.
//! 2. Persisting an object persists every member it links, transitively.
//! 3. Names can only be bound to persistent objects.
//! 4. Blob contents are checksummed on write and verified on read.

pub mod config;
pub mod error;
pub mod memory;
pub mod names;
pub mod traits;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use memory::InMemoryClient;
pub use names::validate_object_name;
pub use traits::Client;
