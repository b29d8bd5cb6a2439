//! Builders and resolvers every registry starts from.
//!
//! | lineage entry | typename           | layout                                   |
//! |---------------|--------------------|------------------------------------------|
//! | `AnyValue`    | `cellar::Encoded`  | `type_name_` field, `buffer_` blob member |
//! | `Binary`      | `cellar::Blob`     | the bytes themselves                     |
//! | `Scalar`      | `cellar::Scalar`   | `value_` and `type_` fields              |
//! | `Sequence`    | `cellar::Sequence` | `__elements_-{i}` members, `__elements_-size` field |

use std::any::Any;

use cellar_types::{ObjectMeta, TypeError, BLOB_TYPENAME};
use serde::de::DeserializeOwned;
use serde_json::{Number, Value};

use crate::builder::{BuildCx, Builder, Built};
use crate::context::BuilderContext;
use crate::error::{BuildError, BuildResult};
use crate::lineage::{AnyValue, Binary, Buildable, Scalar};
use crate::resolver::{ResolveCx, Resolved, Resolver, ResolverContext};
use crate::values::Sequence;

pub const ENCODED_TYPENAME: &str = "cellar::Encoded";
pub const SCALAR_TYPENAME: &str = "cellar::Scalar";
pub const SEQUENCE_TYPENAME: &str = "cellar::Sequence";

const SIZE_FIELD: &str = "__elements_-size";

fn element_member(index: usize) -> String {
    format!("__elements_-{index}")
}

/// Seed `builders` with the default builders.
pub fn register_default_builders(builders: &BuilderContext) {
    builders.register_for::<AnyValue>(Builder::new(build_encoded));
    builders.register_for::<Binary>(Builder::new(build_blob));
    builders.register_for::<Scalar>(Builder::new(build_scalar));
    builders.register_for::<Sequence>(
        Builder::typed::<Sequence, _>(build_sequence).inject_context(),
    );
}

/// Seed `resolvers` with the default resolvers.
pub fn register_default_resolvers(resolvers: &ResolverContext) {
    resolvers.register(BLOB_TYPENAME, Resolver::new(resolve_blob));
    resolvers.register(ENCODED_TYPENAME, Resolver::new(resolve_encoded));
    resolvers.register(SCALAR_TYPENAME, Resolver::new(resolve_scalar));
    resolvers.register(SEQUENCE_TYPENAME, Resolver::with_context(resolve_sequence));
}

fn build_encoded(cx: &BuildCx<'_>, value: &dyn Buildable) -> BuildResult<Built> {
    let bytes = value.encode()?;
    let buffer = cx.client().create_blob(&bytes)?;
    let meta = ObjectMeta::new(ENCODED_TYPENAME)
        .with_field("type_name_", value.type_name())
        .add_member("buffer_", buffer.id());
    Ok(cx.client().create_metadata(meta)?.into())
}

fn build_blob(cx: &BuildCx<'_>, value: &dyn Buildable) -> BuildResult<Built> {
    let bytes = value.encode()?;
    Ok(cx.client().create_blob(&bytes)?.into())
}

fn build_scalar(cx: &BuildCx<'_>, value: &dyn Buildable) -> BuildResult<Built> {
    // Non-finite floats and foreign scalar types have no JSON form.
    let Some(json) = scalar_json(value.as_any()) else {
        return build_encoded(cx, value);
    };
    let meta = ObjectMeta::new(SCALAR_TYPENAME)
        .with_field("value_", json)
        .with_field("type_", value.type_name());
    Ok(cx.client().create_metadata(meta)?.into())
}

fn scalar_json(value: &dyn Any) -> Option<Value> {
    macro_rules! integral {
        ($($ty:ty),*) => {
            $(
                if let Some(v) = value.downcast_ref::<$ty>() {
                    return Some(Value::from(*v));
                }
            )*
        };
    }
    integral!(bool, i8, i16, i32, i64, u8, u16, u32, u64);

    if let Some(v) = value.downcast_ref::<f64>() {
        return Number::from_f64(*v).map(Value::Number);
    }
    if let Some(v) = value.downcast_ref::<f32>() {
        return Number::from_f64(f64::from(*v)).map(Value::Number);
    }
    if let Some(v) = value.downcast_ref::<char>() {
        return Some(Value::from(v.to_string()));
    }
    if let Some(v) = value.downcast_ref::<String>() {
        return Some(Value::from(v.as_str()));
    }
    value
        .downcast_ref::<&'static str>()
        .map(|v| Value::from(*v))
}

fn build_sequence(cx: &BuildCx<'_>, sequence: &Sequence) -> BuildResult<Built> {
    let mut meta = ObjectMeta::new(SEQUENCE_TYPENAME).with_field(SIZE_FIELD, sequence.len());
    for (index, item) in sequence.iter().enumerate() {
        let id = cx.build_member_id(item)?;
        meta = meta.add_member(element_member(index), id);
    }
    Ok(cx.client().create_metadata(meta)?.into())
}

fn resolve_blob(cx: &ResolveCx<'_>, meta: &ObjectMeta) -> BuildResult<Resolved> {
    Ok(Box::new(cx.client().get_blob(&meta.id)?))
}

/// Encoded objects resolve to their raw bytes; [`crate::decode`] turns
/// them back into a typed value.
fn resolve_encoded(cx: &ResolveCx<'_>, meta: &ObjectMeta) -> BuildResult<Resolved> {
    let buffer = meta.member("buffer_").ok_or_else(|| TypeError::MissingField {
        typename: meta.typename.clone(),
        key: "buffer_".into(),
    })?;
    Ok(Box::new(cx.client().get_blob(&buffer)?))
}

fn resolve_scalar(_: &ResolveCx<'_>, meta: &ObjectMeta) -> BuildResult<Resolved> {
    let value: Value = meta.field("value_")?;
    let type_name: String = meta.field("type_")?;

    fn typed<T: DeserializeOwned + Send + 'static>(value: Value) -> BuildResult<Resolved> {
        serde_json::from_value::<T>(value)
            .map(|v| Box::new(v) as Resolved)
            .map_err(|e| BuildError::Encoding(e.to_string()))
    }

    match type_name.as_str() {
        "bool" => typed::<bool>(value),
        "char" => typed::<char>(value),
        "i8" => typed::<i8>(value),
        "i16" => typed::<i16>(value),
        "i32" => typed::<i32>(value),
        "i64" => typed::<i64>(value),
        "u8" => typed::<u8>(value),
        "u16" => typed::<u16>(value),
        "u32" => typed::<u32>(value),
        "u64" => typed::<u64>(value),
        "f32" => typed::<f32>(value),
        "f64" => typed::<f64>(value),
        // Strings, borrowed or owned, come back owned.
        "alloc::string::String" | "&str" => typed::<String>(value),
        _ => Ok(Box::new(value)),
    }
}

fn resolve_sequence(cx: &ResolveCx<'_>, meta: &ObjectMeta) -> BuildResult<Resolved> {
    let size: usize = meta.field(SIZE_FIELD)?;
    let mut items: Vec<Resolved> = Vec::with_capacity(size);
    for index in 0..size {
        let name = element_member(index);
        let id = meta.member(&name).ok_or_else(|| TypeError::MissingField {
            typename: meta.typename.clone(),
            key: name,
        })?;
        items.push(cx.resolve_member(&id)?);
    }
    Ok(Box::new(items))
}
