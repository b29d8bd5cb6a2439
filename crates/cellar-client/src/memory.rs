use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cellar_types::{InstanceId, Object, ObjectId, ObjectMeta, Signature, BLOB_TYPENAME};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::names::validate_object_name;
use crate::traits::Client;

#[derive(Default)]
struct State {
    metas: HashMap<ObjectId, ObjectMeta>,
    blobs: HashMap<ObjectId, Vec<u8>>,
    names: HashMap<String, ObjectId>,
    used_bytes: u64,
}

/// In-memory store client.
///
/// Intended for tests, embedding and the CLI. Metadata, blob contents and
/// the name table live in one `RwLock` so that every operation observes a
/// consistent snapshot.
pub struct InMemoryClient {
    config: ClientConfig,
    state: RwLock<State>,
}

impl InMemoryClient {
    /// Create an empty store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Number of objects (blobs included) currently held.
    pub fn len(&self) -> ClientResult<usize> {
        Ok(self.read()?.metas.len())
    }

    pub fn is_empty(&self) -> ClientResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Bytes held by blobs.
    pub fn used_bytes(&self) -> ClientResult<u64> {
        Ok(self.read()?.used_bytes)
    }

    /// All bound names, sorted, without the configured prefix stripped.
    pub fn names(&self) -> ClientResult<Vec<String>> {
        let mut names: Vec<String> = self.read()?.names.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn read(&self) -> ClientResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| ClientError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> ClientResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| ClientError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Client for InMemoryClient {
    fn instance_id(&self) -> InstanceId {
        self.config.instance_id
    }

    fn create_blob(&self, data: &[u8]) -> ClientResult<Object> {
        let requested = data.len() as u64;
        let mut state = self.write()?;
        let available = self.config.memory_limit.saturating_sub(state.used_bytes);
        if requested > available {
            return Err(ClientError::NotEnoughMemory {
                requested,
                available,
            });
        }

        let mut meta = ObjectMeta::new(BLOB_TYPENAME).with_nbytes(requested);
        meta.id = ObjectId::generate_blob();
        meta.instance_id = self.config.instance_id;
        meta.signature = Some(Signature::of(data));

        state.used_bytes += requested;
        state.blobs.insert(meta.id, data.to_vec());
        state.metas.insert(meta.id, meta.clone());
        debug!(id = %meta.id, nbytes = requested, "created blob");
        Ok(Object::new(meta))
    }

    fn create_metadata(&self, mut meta: ObjectMeta) -> ClientResult<ObjectMeta> {
        if meta.typename.is_empty() {
            return Err(ClientError::InvalidMeta("typename must not be empty".into()));
        }
        let mut state = self.write()?;

        let mut member_bytes = 0u64;
        for (name, member) in &meta.members {
            let member_meta = state.metas.get(member).ok_or_else(|| {
                ClientError::InvalidMeta(format!("member {name} references unknown object {member}"))
            })?;
            member_bytes = member_bytes.saturating_add(member_meta.nbytes);
        }
        if meta.nbytes == 0 {
            meta.nbytes = member_bytes;
        }

        meta.id = ObjectId::generate();
        meta.instance_id = self.config.instance_id;
        meta.persistent = false;
        state.metas.insert(meta.id, meta.clone());
        debug!(id = %meta.id, typename = %meta.typename, "created metadata");
        Ok(meta)
    }

    fn get_meta(&self, id: &ObjectId) -> ClientResult<ObjectMeta> {
        self.read()?
            .metas
            .get(id)
            .cloned()
            .ok_or(ClientError::ObjectNotFound(*id))
    }

    fn get_blob(&self, id: &ObjectId) -> ClientResult<Vec<u8>> {
        let state = self.read()?;
        let data = state
            .blobs
            .get(id)
            .ok_or(ClientError::ObjectNotFound(*id))?;
        let signature = state.metas.get(id).and_then(|m| m.signature);
        match signature {
            Some(sig) if sig.verify(data) => Ok(data.clone()),
            _ => Err(ClientError::SignatureMismatch(*id)),
        }
    }

    fn exists(&self, id: &ObjectId) -> ClientResult<bool> {
        Ok(self.read()?.metas.contains_key(id))
    }

    fn persist(&self, id: &ObjectId) -> ClientResult<()> {
        let mut state = self.write()?;
        if !state.metas.contains_key(id) {
            return Err(ClientError::ObjectNotFound(*id));
        }

        let mut pending = vec![*id];
        let mut count = 0usize;
        while let Some(next) = pending.pop() {
            let Some(meta) = state.metas.get_mut(&next) else {
                continue;
            };
            if meta.persistent {
                continue;
            }
            meta.persistent = true;
            count += 1;
            pending.extend(meta.members.values().copied());
        }
        info!(id = %id, newly_persisted = count, "persisted object");
        Ok(())
    }

    fn put_name(&self, id: &ObjectId, name: &str) -> ClientResult<()> {
        validate_object_name(name)?;
        let mut state = self.write()?;
        let meta = state
            .metas
            .get(id)
            .ok_or(ClientError::ObjectNotFound(*id))?;
        if !meta.persistent {
            return Err(ClientError::NotPersisted(*id));
        }
        let qualified = self.config.qualify(name);
        debug!(id = %id, name = %qualified, "bound name");
        state.names.insert(qualified, *id);
        Ok(())
    }

    fn get_name(&self, name: &str) -> ClientResult<ObjectId> {
        self.read()?
            .names
            .get(&self.config.qualify(name))
            .copied()
            .ok_or_else(|| ClientError::NameNotFound(name.to_string()))
    }

    fn drop_name(&self, name: &str) -> ClientResult<bool> {
        let mut state = self.write()?;
        Ok(state.names.remove(&self.config.qualify(name)).is_some())
    }

    fn delete(&self, id: &ObjectId) -> ClientResult<bool> {
        let mut state = self.write()?;
        match state.metas.get(id) {
            None => return Ok(false),
            Some(meta) if meta.persistent => return Err(ClientError::ObjectPersisted(*id)),
            Some(_) => {}
        }
        state.metas.remove(id);
        if let Some(data) = state.blobs.remove(id) {
            state.used_bytes -= data.len() as u64;
        }
        Ok(true)
    }
}

impl std::fmt::Debug for InMemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.len().unwrap_or_default();
        f.debug_struct("InMemoryClient")
            .field("instance_id", &self.config.instance_id)
            .field("object_count", &count)
            .finish()
    }
}
