use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::object::{InstanceId, ObjectId, Signature};

/// Typename stores give to raw blobs.
pub const BLOB_TYPENAME: &str = "cellar::Blob";

/// Metadata handle for a store object.
///
/// A metadata handle names its object (`id`), describes how to interpret it
/// (`typename`, `fields`) and links the sub-objects it is composed of
/// (`members`). Handles are created locally with a null `id` and receive
/// their identifier when the store seals them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub id: ObjectId,
    pub typename: String,
    pub nbytes: u64,
    pub instance_id: InstanceId,
    pub persistent: bool,
    pub signature: Option<Signature>,
    pub fields: BTreeMap<String, Value>,
    pub members: BTreeMap<String, ObjectId>,
}

impl ObjectMeta {
    /// Start an unsealed metadata handle of the given type.
    pub fn new(typename: impl Into<String>) -> Self {
        Self {
            id: ObjectId::null(),
            typename: typename.into(),
            nbytes: 0,
            instance_id: InstanceId::default(),
            persistent: false,
            signature: None,
            fields: BTreeMap::new(),
            members: BTreeMap::new(),
        }
    }

    /// Set a field, serializing `value` to JSON.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Link a member object under `name`.
    pub fn add_member(mut self, name: impl Into<String>, id: ObjectId) -> Self {
        self.members.insert(name.into(), id);
        self
    }

    pub fn with_nbytes(mut self, nbytes: u64) -> Self {
        self.nbytes = nbytes;
        self
    }

    /// Returns `true` once the store has assigned an identifier.
    pub fn is_sealed(&self) -> bool {
        !self.id.is_null()
    }

    /// Read a field and decode it as `T`.
    pub fn field<T: DeserializeOwned>(&self, key: &str) -> Result<T, TypeError> {
        let value = self.fields.get(key).ok_or_else(|| TypeError::MissingField {
            typename: self.typename.clone(),
            key: key.to_string(),
        })?;
        serde_json::from_value(value.clone()).map_err(|e| TypeError::FieldDecode {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Look up a member by name.
    pub fn member(&self, name: &str) -> Option<ObjectId> {
        self.members.get(name).copied()
    }
}

/// Lightweight handle to a sealed store object.
///
/// Handed back by operations that create raw buffers, where callers rarely
/// need more than the identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct Object {
    meta: ObjectMeta,
}

impl Object {
    pub fn new(meta: ObjectMeta) -> Self {
        Self { meta }
    }

    pub fn id(&self) -> ObjectId {
        self.meta.id
    }

    pub fn typename(&self) -> &str {
        &self.meta.typename
    }

    pub fn nbytes(&self) -> u64 {
        self.meta.nbytes
    }

    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    pub fn into_meta(self) -> ObjectMeta {
        self.meta
    }
}

impl From<ObjectMeta> for Object {
    fn from(meta: ObjectMeta) -> Self {
        Self::new(meta)
    }
}
