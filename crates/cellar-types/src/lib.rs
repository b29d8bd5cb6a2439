//! Foundation types for Cellar.
//!
//! This crate provides the identifier and handle types shared by the store
//! client and the builder registry. Every other Cellar crate depends on
//! `cellar-types`.
//!
//! # Key Types
//!
//! - [`ObjectId`]: Opaque 64-bit object identifier, stable across processes
//! - [`Signature`]: Content checksum recorded on blob metadata
//! - [`InstanceId`]: The store instance that created an object
//! - [`ObjectMeta`]: Full metadata handle: typename, fields, and members
//! - [`Object`]: Lightweight handle to a sealed store object

pub mod error;
pub mod meta;
pub mod object;

pub use error::TypeError;
pub use meta::{Object, ObjectMeta, BLOB_TYPENAME};
pub use object::{InstanceId, ObjectId, Signature};
