use cellar_types::{InstanceId, Object, ObjectId, ObjectMeta};

use crate::error::ClientResult;

/// The capability set a store client offers to builders and resolvers.
///
/// All implementations must satisfy these invariants:
/// - Sealed objects are immutable; only the persistent flag may change.
/// - `persist` is transitive over members and idempotent.
/// - `put_name` only binds names to persistent objects.
/// - Blob reads verify the signature recorded at write time.
pub trait Client: Send + Sync {
    /// The store instance this client is connected to.
    fn instance_id(&self) -> InstanceId;

    /// Copy `data` into a new sealed blob.
    fn create_blob(&self, data: &[u8]) -> ClientResult<Object>;

    /// Seal a metadata handle and return it with its assigned identifier.
    ///
    /// Every member referenced by `meta` must already exist.
    fn create_metadata(&self, meta: ObjectMeta) -> ClientResult<ObjectMeta>;

    /// Read the metadata of an object.
    fn get_meta(&self, id: &ObjectId) -> ClientResult<ObjectMeta>;

    /// Read the contents of a blob.
    fn get_blob(&self, id: &ObjectId) -> ClientResult<Vec<u8>>;

    /// Check whether an object exists.
    fn exists(&self, id: &ObjectId) -> ClientResult<bool>;

    /// Mark an object and all of its members persistent.
    fn persist(&self, id: &ObjectId) -> ClientResult<()>;

    /// Whether the object has been persisted.
    fn is_persistent(&self, id: &ObjectId) -> ClientResult<bool> {
        Ok(self.get_meta(id)?.persistent)
    }

    /// Associate `name` with a persistent object. Rebinding a name
    /// overwrites the previous association.
    fn put_name(&self, id: &ObjectId, name: &str) -> ClientResult<()>;

    /// Look up the object bound to `name`.
    fn get_name(&self, name: &str) -> ClientResult<ObjectId>;

    /// Remove a name. Returns `true` if the name was bound.
    fn drop_name(&self, name: &str) -> ClientResult<bool>;

    /// Delete a transient object. Returns `true` if the object existed.
    fn delete(&self, id: &ObjectId) -> ClientResult<bool>;
}
