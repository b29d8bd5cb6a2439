//! The single entry point for putting values into a store.

use std::any::Any;

use cellar_client::Client;
use cellar_types::ObjectId;
use tracing::{debug, warn};

use crate::builder::{BuildArgs, Builder};
use crate::error::BuildResult;
use crate::lineage::Buildable;
use crate::resolver::{self, Resolved};
use crate::scope::current_builders;

/// Options for [`put`].
#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// Use this builder instead of dispatching on the value's type.
    pub builder: Option<Builder>,
    /// Mark the created object persistent.
    pub persist: bool,
    /// Bind this name to the created object if it is persistent.
    pub name: Option<String>,
    pub args: BuildArgs,
}

impl PutOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder(mut self, builder: Builder) -> Self {
        self.builder = Some(builder);
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn args(mut self, args: BuildArgs) -> Self {
        self.args = args;
        self
    }

    pub fn arg(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.args.insert(key, value);
        self
    }
}

/// Build `value` into the store behind `client`.
///
/// With an explicit builder the value is handed straight to it: the active
/// registry is not consulted, nothing is injected and `persist`/`name` are
/// not applied. Otherwise the builder is resolved from the calling thread's
/// active registry, after which the object is persisted if requested and
/// named if it is persistent. Naming a transient object is skipped with a
/// warning rather than failing.
///
/// Returns the identifier of the created object, or `None` when the builder
/// created nothing.
pub fn put(
    client: &dyn Client,
    value: &dyn Buildable,
    options: PutOptions,
) -> BuildResult<Option<ObjectId>> {
    let PutOptions {
        builder,
        persist,
        name,
        args,
    } = options;

    if let Some(builder) = builder {
        debug!(type_name = value.type_name(), "putting with explicit builder");
        return Ok(builder.call(client, value, &args)?.id());
    }

    let id = current_builders().run(client, value, &args)?.id();
    let Some(id) = id else {
        if let Some(name) = name {
            warn!(%name, type_name = value.type_name(), "builder created no object, not naming");
        }
        return Ok(None);
    };

    if persist {
        client.persist(&id)?;
    }

    if let Some(name) = name {
        if persist || client.is_persistent(&id)? {
            client.put_name(&id, &name)?;
        } else {
            warn!(
                %id,
                %name,
                "naming skipped: names can only be bound to persistent objects"
            );
        }
    }

    Ok(Some(id))
}

/// Put and get directly on a client.
pub trait ClientExt: Client {
    fn put(&self, value: &dyn Buildable, options: PutOptions) -> BuildResult<Option<ObjectId>>;

    fn get(&self, id: &ObjectId) -> BuildResult<Resolved>;

    fn get_as<T: Any>(&self, id: &ObjectId) -> BuildResult<T>;
}

impl<C: Client> ClientExt for C {
    fn put(&self, value: &dyn Buildable, options: PutOptions) -> BuildResult<Option<ObjectId>> {
        put(self, value, options)
    }

    fn get(&self, id: &ObjectId) -> BuildResult<Resolved> {
        resolver::get(self, id)
    }

    fn get_as<T: Any>(&self, id: &ObjectId) -> BuildResult<T> {
        resolver::get_as(self, id)
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use cellar_client::{ClientError, ClientResult, InMemoryClient};
    use cellar_types::{InstanceId, Object, ObjectMeta};

    use super::*;
    use crate::builder::Built;
    use crate::context::Overrides;
    use crate::error::BuildError;
    use crate::scope::builder_context;

    /// Delegates to an in-memory store and records name bindings.
    #[derive(Default)]
    struct RecordingClient {
        inner: InMemoryClient,
        named: Mutex<Vec<String>>,
    }

    impl RecordingClient {
        fn named(&self) -> Vec<String> {
            self.named.lock().unwrap().clone()
        }
    }

    impl Client for RecordingClient {
        fn instance_id(&self) -> InstanceId {
            self.inner.instance_id()
        }

        fn create_blob(&self, data: &[u8]) -> ClientResult<Object> {
            self.inner.create_blob(data)
        }

        fn create_metadata(&self, meta: ObjectMeta) -> ClientResult<ObjectMeta> {
            self.inner.create_metadata(meta)
        }

        fn get_meta(&self, id: &ObjectId) -> ClientResult<ObjectMeta> {
            self.inner.get_meta(id)
        }

        fn get_blob(&self, id: &ObjectId) -> ClientResult<Vec<u8>> {
            self.inner.get_blob(id)
        }

        fn exists(&self, id: &ObjectId) -> ClientResult<bool> {
            self.inner.exists(id)
        }

        fn persist(&self, id: &ObjectId) -> ClientResult<()> {
            self.inner.persist(id)
        }

        fn put_name(&self, id: &ObjectId, name: &str) -> ClientResult<()> {
            self.named.lock().unwrap().push(name.to_string());
            self.inner.put_name(id, name)
        }

        fn get_name(&self, name: &str) -> ClientResult<ObjectId> {
            self.inner.get_name(name)
        }

        fn drop_name(&self, name: &str) -> ClientResult<bool> {
            self.inner.drop_name(name)
        }

        fn delete(&self, id: &ObjectId) -> ClientResult<bool> {
            self.inner.delete(id)
        }
    }

    /// Log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Run `f` under a fmt subscriber and return the WARN lines it logged.
    fn warnings_during(f: impl FnOnce()) -> Vec<String> {
        let buffer = Captured::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .without_time()
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        text.lines()
            .filter(|line| line.contains("WARN"))
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn naming_a_transient_object_warns_once() {
        let client = RecordingClient::default();
        let warnings = warnings_during(|| {
            put(&client, &42i64, PutOptions::new().name("answer")).unwrap();
        });
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("naming skipped"));
        assert!(warnings[0].contains("answer"));
    }

    #[test]
    fn naming_when_nothing_was_built_warns() {
        let client = RecordingClient::default();
        let _scope = builder_context(
            Overrides::new().with::<u32>(Builder::new(|_, _| Ok(Built::Nothing))),
            None,
        );
        let warnings = warnings_during(|| {
            put(&client, &3u32, PutOptions::new().name("n")).unwrap();
        });
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("not naming"));
    }

    #[test]
    fn naming_a_persisted_object_does_not_warn() {
        let client = RecordingClient::default();
        let warnings = warnings_during(|| {
            put(&client, &42i64, PutOptions::new().persist(true).name("answer")).unwrap();
        });
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn naming_a_transient_object_is_skipped() {
        let client = RecordingClient::default();
        let id = put(&client, &42i64, PutOptions::new().name("answer"))
            .unwrap()
            .unwrap();

        assert!(client.exists(&id).unwrap());
        assert!(client.named().is_empty());
        assert!(matches!(
            client.get_name("answer"),
            Err(ClientError::NameNotFound(_))
        ));
    }

    #[test]
    fn persist_and_name_binds() {
        let client = RecordingClient::default();
        let id = put(
            &client,
            &String::from("hello"),
            PutOptions::new().persist(true).name("greeting"),
        )
        .unwrap()
        .unwrap();

        assert!(client.is_persistent(&id).unwrap());
        assert_eq!(client.get_name("greeting").unwrap(), id);
        assert_eq!(client.named(), vec!["greeting".to_string()]);
    }

    #[test]
    fn name_binds_to_object_persisted_earlier() {
        let client = RecordingClient::default();
        let blob = client.create_blob(b"abc").unwrap();
        client.persist(&blob.id()).unwrap();

        let explicit = Builder::new(move |_, _| Ok(Built::Object(blob.clone())));
        let scope = builder_context(Overrides::new().with::<u16>(explicit), None);
        let id = put(&client, &7u16, PutOptions::new().name("early")).unwrap();
        drop(scope);

        assert_eq!(client.get_name("early").unwrap(), id.unwrap());
    }

    #[test]
    fn explicit_builder_bypasses_dispatch() {
        let client = InMemoryClient::new();
        let _scope = builder_context(
            Overrides::new().with::<i64>(Builder::new(|_, _| {
                Err(BuildError::custom("registered builder must not run"))
            })),
            None,
        );

        let explicit = Builder::with_context(|cx, _| {
            assert!(cx.builders().is_none());
            Ok(Built::Id(ObjectId::from_raw(11)))
        });
        let id = put(&client, &1i64, PutOptions::new().builder(explicit)).unwrap();
        assert_eq!(id, Some(ObjectId::from_raw(11)));
    }

    #[test]
    fn explicit_builder_skips_persist_and_name() {
        let client = RecordingClient::default();
        let explicit = Builder::new(|cx, _| Ok(cx.client().create_blob(b"x")?.into()));
        let id = put(
            &client,
            &1i64,
            PutOptions::new().builder(explicit).persist(true).name("x"),
        )
        .unwrap()
        .unwrap();

        assert!(!client.is_persistent(&id).unwrap());
        assert!(client.named().is_empty());
    }

    #[test]
    fn nothing_built_yields_none() {
        let client = RecordingClient::default();
        let _scope = builder_context(
            Overrides::new().with::<u32>(Builder::new(|_, _| Ok(Built::Nothing))),
            None,
        );
        let id = put(&client, &3u32, PutOptions::new().persist(true).name("n")).unwrap();
        assert_eq!(id, None);
        assert!(client.named().is_empty());
    }

    #[test]
    fn builder_errors_propagate_unchanged() {
        #[derive(Debug, thiserror::Error)]
        #[error("bad shape")]
        struct BadShape;

        let client = InMemoryClient::new();
        let _scope = builder_context(
            Overrides::new().with::<u8>(Builder::new(|_, _| Err(BuildError::custom(BadShape)))),
            None,
        );
        let err = put(&client, &1u8, PutOptions::new()).unwrap_err();
        assert!(matches!(err, BuildError::Custom(ref inner) if inner.is::<BadShape>()));
        assert_eq!(err.to_string(), "bad shape");
    }

    #[test]
    fn args_reach_the_builder() {
        let client = InMemoryClient::new();
        let _scope = builder_context(
            Overrides::new().with::<u64>(Builder::new(|cx, _| {
                let raw = cx.args().get_as::<u64>("raw")?.unwrap_or_default();
                Ok(Built::Id(ObjectId::from_raw(raw)))
            })),
            None,
        );
        let id = put(&client, &0u64, PutOptions::new().arg("raw", 21)).unwrap();
        assert_eq!(id, Some(ObjectId::from_raw(21)));
    }

    #[test]
    fn client_ext_round_trips_through_defaults() {
        let client = InMemoryClient::new();
        let id = client
            .put(&vec![1u8, 2, 3], PutOptions::new())
            .unwrap()
            .unwrap();
        assert_eq!(client.get_as::<Vec<u8>>(&id).unwrap(), vec![1, 2, 3]);
    }
}
