use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cellar_client::Client;
use tracing::debug;

use crate::builder::{BuildArgs, BuildCx, Builder, Built};
use crate::error::{BuildError, BuildResult};
use crate::lineage::{Buildable, TypeKey};

/// Builder entries to overlay on a registry, later entries winning.
#[derive(Clone, Debug, Default)]
pub struct Overrides(Vec<(TypeKey, Builder)>);

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the builder for `T`.
    pub fn with<T: ?Sized + 'static>(mut self, builder: Builder) -> Self {
        self.insert(TypeKey::of::<T>(), builder);
        self
    }

    pub fn insert(&mut self, key: TypeKey, builder: Builder) {
        self.0.push((key, builder));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(TypeKey, Builder)> for Overrides {
    fn from_iter<I: IntoIterator<Item = (TypeKey, Builder)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Overrides {
    type Item = (TypeKey, Builder);
    type IntoIter = std::vec::IntoIter<(TypeKey, Builder)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Registry mapping types to builders.
///
/// A `BuilderContext` is a handle: clones share the same table, and
/// equality means "same registry". [`extend`](Self::extend) is the only way
/// to derive a registry, and it always copies, so a derived registry never
/// observes later changes to its parent and vice versa.
///
/// Dispatch walks the value's [`Lineage`](crate::Lineage) and picks the
/// first type with a registered builder.
#[derive(Clone, Default)]
pub struct BuilderContext {
    factory: Arc<RwLock<HashMap<TypeKey, Builder>>>,
}

impl BuilderContext {
    /// An empty registry. Without a root entry, values whose lineage has no
    /// registered type fail with [`BuildError::NoBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the builder for `key`, returning the previous one.
    pub fn register(&self, key: TypeKey, builder: Builder) -> Option<Builder> {
        debug!(type_name = key.name(), "registered builder");
        self.write().insert(key, builder)
    }

    pub fn register_for<T: ?Sized + 'static>(&self, builder: Builder) -> Option<Builder> {
        self.register(TypeKey::of::<T>(), builder)
    }

    pub fn unregister(&self, key: &TypeKey) -> Option<Builder> {
        self.write().remove(key)
    }

    pub fn get(&self, key: &TypeKey) -> Option<Builder> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Select the builder for `value`: the entry of the first type in its
    /// lineage that has one.
    pub fn resolve(&self, value: &dyn Buildable) -> BuildResult<Builder> {
        let lineage = value.lineage();
        let factory = self.read();
        for key in lineage.iter() {
            if let Some(builder) = factory.get(key) {
                debug!(
                    type_name = lineage.key().name(),
                    matched = key.name(),
                    "resolved builder"
                );
                return Ok(builder.clone());
            }
        }
        Err(BuildError::NoBuilder {
            type_name: lineage.key().name(),
        })
    }

    /// Resolve and invoke the builder for `value`, injecting this registry
    /// into builders that asked for it.
    pub fn run(
        &self,
        client: &dyn Client,
        value: &dyn Buildable,
        args: &BuildArgs,
    ) -> BuildResult<Built> {
        let builder = self.resolve(value)?;
        let cx = BuildCx::new(client, args);
        let cx = if builder.wants_context() {
            cx.with_builders(self)
        } else {
            cx
        };
        builder.invoke(&cx, value)
    }

    /// A new registry holding this one's entries overlaid with `overrides`.
    pub fn extend<I>(&self, overrides: I) -> BuilderContext
    where
        I: IntoIterator<Item = (TypeKey, Builder)>,
    {
        let mut factory = self.read().clone();
        factory.extend(overrides);
        BuilderContext {
            factory: Arc::new(RwLock::new(factory)),
        }
    }

    /// Names of all registered types, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.read().keys().map(TypeKey::name).collect();
        names.sort_unstable();
        names
    }

    // Builders are cloned out before they run, so a panicking builder
    // cannot leave the table half-written.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeKey, Builder>> {
        self.factory.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeKey, Builder>> {
        self.factory.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PartialEq for BuilderContext {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.factory, &other.factory)
    }
}

impl Eq for BuilderContext {}

impl fmt::Display for BuilderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.type_names().join(", "))
    }
}

impl fmt::Debug for BuilderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderContext")
            .field("types", &self.type_names())
            .finish()
    }
}
