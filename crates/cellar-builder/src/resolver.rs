//! Resolvers: the inverse of builders.
//!
//! A resolver turns a store object back into an in-process value. Where
//! builders dispatch on the value's lineage, resolvers dispatch on the
//! object's `typename`. A typename with template arguments
//! (`cellar::Tensor<f64>`) falls back to its bare name (`cellar::Tensor`).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cellar_client::Client;
use cellar_types::{ObjectId, ObjectMeta, TypeError};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::defaults::ENCODED_TYPENAME;
use crate::error::{BuildError, BuildResult};
use crate::scope::current_resolvers;

/// A value reconstructed from a store object.
pub type Resolved = Box<dyn Any + Send>;

/// Everything a resolver receives besides the metadata.
pub struct ResolveCx<'a> {
    client: &'a dyn Client,
    resolvers: Option<&'a ResolverContext>,
}

impl<'a> ResolveCx<'a> {
    pub fn new(client: &'a dyn Client) -> Self {
        Self {
            client,
            resolvers: None,
        }
    }

    pub fn client(&self) -> &'a dyn Client {
        self.client
    }

    pub fn resolvers(&self) -> Option<&'a ResolverContext> {
        self.resolvers
    }

    /// Resolve a member object with the same rules as the enclosing call.
    pub fn resolve_member(&self, id: &ObjectId) -> BuildResult<Resolved> {
        match self.resolvers {
            Some(resolvers) => resolvers.get(self.client, id),
            None => current_resolvers().get(self.client, id),
        }
    }
}

type ResolveFn = dyn Fn(&ResolveCx<'_>, &ObjectMeta) -> BuildResult<Resolved> + Send + Sync;

#[derive(Clone)]
pub struct Resolver {
    func: Arc<ResolveFn>,
    wants_context: bool,
}

impl Resolver {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ResolveCx<'_>, &ObjectMeta) -> BuildResult<Resolved> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            wants_context: false,
        }
    }

    /// A resolver that receives the dispatching registry.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&ResolveCx<'_>, &ObjectMeta) -> BuildResult<Resolved> + Send + Sync + 'static,
    {
        let mut resolver = Self::new(f);
        resolver.wants_context = true;
        resolver
    }

    pub fn wants_context(&self) -> bool {
        self.wants_context
    }

    /// Invoke the resolver directly, without registry injection.
    pub fn call(&self, client: &dyn Client, meta: &ObjectMeta) -> BuildResult<Resolved> {
        (self.func)(&ResolveCx::new(client), meta)
    }

    pub fn ptr_eq(&self, other: &Resolver) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("wants_context", &self.wants_context)
            .finish_non_exhaustive()
    }
}

/// Registry mapping typenames to resolvers. Same handle and copy-on-extend
/// semantics as [`BuilderContext`](crate::BuilderContext).
#[derive(Clone, Default)]
pub struct ResolverContext {
    table: Arc<RwLock<HashMap<String, Resolver>>>,
}

impl ResolverContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, typename: impl Into<String>, resolver: Resolver) -> Option<Resolver> {
        self.write().insert(typename.into(), resolver)
    }

    pub fn unregister(&self, typename: &str) -> Option<Resolver> {
        self.write().remove(typename)
    }

    pub fn contains(&self, typename: &str) -> bool {
        self.read().contains_key(typename)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Select the resolver for `meta`: an exact typename match first, then
    /// the typename stripped of its template arguments.
    pub fn resolve(&self, meta: &ObjectMeta) -> BuildResult<Resolver> {
        let table = self.read();
        let bare = meta
            .typename
            .split_once('<')
            .map_or(meta.typename.as_str(), |(head, _)| head);
        table
            .get(&meta.typename)
            .or_else(|| table.get(bare))
            .cloned()
            .ok_or_else(|| BuildError::NoResolver {
                typename: meta.typename.clone(),
            })
    }

    pub fn run(&self, client: &dyn Client, meta: &ObjectMeta) -> BuildResult<Resolved> {
        let resolver = self.resolve(meta)?;
        debug!(id = %meta.id, typename = %meta.typename, "resolving object");
        let mut cx = ResolveCx::new(client);
        if resolver.wants_context() {
            cx.resolvers = Some(self);
        }
        (resolver.func)(&cx, meta)
    }

    /// Fetch the metadata of `id` and resolve it.
    pub fn get(&self, client: &dyn Client, id: &ObjectId) -> BuildResult<Resolved> {
        let meta = client.get_meta(id)?;
        self.run(client, &meta)
    }

    pub fn extend<I>(&self, overrides: I) -> ResolverContext
    where
        I: IntoIterator<Item = (String, Resolver)>,
    {
        let mut table = self.read().clone();
        table.extend(overrides);
        ResolverContext {
            table: Arc::new(RwLock::new(table)),
        }
    }

    pub fn typenames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Resolver>> {
        self.table.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Resolver>> {
        self.table.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for ResolverContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }
}

impl Eq for ResolverContext {}

impl fmt::Debug for ResolverContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverContext")
            .field("typenames", &self.typenames())
            .finish()
    }
}

/// Resolve `id` with the calling thread's active resolvers.
pub fn get(client: &dyn Client, id: &ObjectId) -> BuildResult<Resolved> {
    current_resolvers().get(client, id)
}

/// Resolve `id` and downcast the result to `T`.
pub fn get_as<T: Any>(client: &dyn Client, id: &ObjectId) -> BuildResult<T> {
    get(client, id)?
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| BuildError::UnexpectedResolved {
            expected: std::any::type_name::<T>(),
        })
}

/// Decode an object created by the universal fallback builder.
pub fn decode<T: DeserializeOwned>(client: &dyn Client, id: &ObjectId) -> BuildResult<T> {
    let meta = client.get_meta(id)?;
    if meta.typename != ENCODED_TYPENAME {
        return Err(BuildError::UnexpectedTypename {
            expected: ENCODED_TYPENAME.to_string(),
            actual: meta.typename,
        });
    }
    let buffer = meta.member("buffer_").ok_or_else(|| TypeError::MissingField {
        typename: meta.typename.clone(),
        key: "buffer_".into(),
    })?;
    let data = client.get_blob(&buffer)?;
    bincode::deserialize(&data).map_err(|e| BuildError::Encoding(e.to_string()))
}
