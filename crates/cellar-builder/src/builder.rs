use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use cellar_client::Client;
use cellar_types::{Object, ObjectId, ObjectMeta};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::BuilderContext;
use crate::error::{BuildError, BuildResult};
use crate::lineage::Buildable;
use crate::scope::current_builders;

/// What a builder hands back.
#[derive(Clone, Debug, PartialEq)]
pub enum Built {
    /// Full metadata handle of the created object.
    Meta(ObjectMeta),
    /// Lightweight handle, typically for a raw blob.
    Object(Object),
    /// Bare identifier.
    Id(ObjectId),
    /// The builder completed without creating an object.
    Nothing,
}

impl Built {
    /// Normalize to the identifier of the created object, if any.
    pub fn id(&self) -> Option<ObjectId> {
        match self {
            Self::Meta(meta) => Some(meta.id),
            Self::Object(object) => Some(object.id()),
            Self::Id(id) => Some(*id),
            Self::Nothing => None,
        }
    }
}

impl From<ObjectMeta> for Built {
    fn from(meta: ObjectMeta) -> Self {
        Self::Meta(meta)
    }
}

impl From<Object> for Built {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<ObjectId> for Built {
    fn from(id: ObjectId) -> Self {
        Self::Id(id)
    }
}

/// Extra keyword arguments passed through to builders.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildArgs(BTreeMap<String, Value>);

impl BuildArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Decode an argument as `T`. Absent keys yield `Ok(None)`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> BuildResult<Option<T>> {
        self.0
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(|e| BuildError::Encoding(format!("argument {key}: {e}")))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a builder receives besides the value itself.
pub struct BuildCx<'a> {
    client: &'a dyn Client,
    args: &'a BuildArgs,
    builders: Option<&'a BuilderContext>,
}

impl<'a> BuildCx<'a> {
    pub fn new(client: &'a dyn Client, args: &'a BuildArgs) -> Self {
        Self {
            client,
            args,
            builders: None,
        }
    }

    pub(crate) fn with_builders(mut self, builders: &'a BuilderContext) -> Self {
        self.builders = Some(builders);
        self
    }

    pub fn client(&self) -> &'a dyn Client {
        self.client
    }

    pub fn args(&self) -> &'a BuildArgs {
        self.args
    }

    /// The registry that dispatched this builder. Only injected into
    /// builders registered with [`Builder::with_context`].
    pub fn builders(&self) -> Option<&'a BuilderContext> {
        self.builders
    }

    /// Build a sub-value with the same dispatch rules as the enclosing call.
    ///
    /// Uses the injected registry, or the calling thread's active registry
    /// when none was injected.
    pub fn build_member(&self, value: &dyn Buildable) -> BuildResult<Built> {
        match self.builders {
            Some(builders) => builders.run(self.client, value, self.args),
            None => current_builders().run(self.client, value, self.args),
        }
    }

    /// Like [`build_member`](Self::build_member), requiring an object.
    pub fn build_member_id(&self, value: &dyn Buildable) -> BuildResult<ObjectId> {
        self.build_member(value)?
            .id()
            .ok_or(BuildError::EmptyMember {
                type_name: value.type_name(),
            })
    }
}

type BuildFn = dyn Fn(&BuildCx<'_>, &dyn Buildable) -> BuildResult<Built> + Send + Sync;

/// A registered conversion from a value into a store object.
///
/// Builders are cheap to clone and shared between registries. A builder
/// that needs to build sub-values opts in to receiving the dispatching
/// registry with [`Builder::with_context`] or [`Builder::inject_context`].
#[derive(Clone)]
pub struct Builder {
    func: Arc<BuildFn>,
    wants_context: bool,
}

impl Builder {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&BuildCx<'_>, &dyn Buildable) -> BuildResult<Built> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            wants_context: false,
        }
    }

    /// A builder that receives the dispatching registry.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&BuildCx<'_>, &dyn Buildable) -> BuildResult<Built> + Send + Sync + 'static,
    {
        Self::new(f).inject_context()
    }

    /// A builder for one concrete type. Values of other types are rejected
    /// with [`BuildError::UnexpectedType`].
    pub fn typed<T, F>(f: F) -> Self
    where
        T: Buildable,
        F: Fn(&BuildCx<'_>, &T) -> BuildResult<Built> + Send + Sync + 'static,
    {
        Self::new(move |cx, value| match value.as_any().downcast_ref::<T>() {
            Some(typed) => f(cx, typed),
            None => Err(BuildError::UnexpectedType {
                expected: std::any::type_name::<T>(),
                actual: value.type_name(),
            }),
        })
    }

    /// Request injection of the dispatching registry.
    pub fn inject_context(mut self) -> Self {
        self.wants_context = true;
        self
    }

    pub fn wants_context(&self) -> bool {
        self.wants_context
    }

    /// Invoke the builder directly, without registry injection.
    pub fn call(
        &self,
        client: &dyn Client,
        value: &dyn Buildable,
        args: &BuildArgs,
    ) -> BuildResult<Built> {
        self.invoke(&BuildCx::new(client, args), value)
    }

    pub(crate) fn invoke(&self, cx: &BuildCx<'_>, value: &dyn Buildable) -> BuildResult<Built> {
        (self.func)(cx, value)
    }

    /// Whether two handles share the same underlying function.
    pub fn ptr_eq(&self, other: &Builder) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("wants_context", &self.wants_context)
            .finish_non_exhaustive()
    }
}
