//! Built-in buildable types.

use std::any::Any;
use std::fmt;

use crate::error::BuildResult;
use crate::lineage::{Binary, Buildable, Lineage, Scalar, TypeKey};

crate::buildable!(bool => [Scalar]);
crate::buildable!(char => [Scalar]);
crate::buildable!(i8 => [Scalar]);
crate::buildable!(i16 => [Scalar]);
crate::buildable!(i32 => [Scalar]);
crate::buildable!(i64 => [Scalar]);
crate::buildable!(u8 => [Scalar]);
crate::buildable!(u16 => [Scalar]);
crate::buildable!(u32 => [Scalar]);
crate::buildable!(u64 => [Scalar]);
crate::buildable!(f32 => [Scalar]);
crate::buildable!(f64 => [Scalar]);
crate::buildable!(String => [Scalar]);
crate::buildable!(&'static str => [Scalar]);

impl Buildable for Vec<u8> {
    fn lineage(&self) -> Lineage {
        Lineage::of::<Vec<u8>>(&[TypeKey::of::<Binary>()])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn encode(&self) -> BuildResult<Vec<u8>> {
        Ok(self.clone())
    }
}

impl Buildable for bytes::Bytes {
    fn lineage(&self) -> Lineage {
        Lineage::of::<bytes::Bytes>(&[TypeKey::of::<Binary>()])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn encode(&self) -> BuildResult<Vec<u8>> {
        Ok(self.to_vec())
    }
}

/// Heterogeneous list of buildable values.
///
/// A composite: its builder builds every element through the active
/// registry and links them as members.
#[derive(Default)]
pub struct Sequence {
    items: Vec<Box<dyn Buildable>>,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: impl Buildable) {
        self.items.push(Box::new(value));
    }

    /// Builder-style [`push`](Self::push).
    pub fn with(mut self, value: impl Buildable) -> Self {
        self.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Buildable> {
        self.items.iter().map(|item| item.as_ref())
    }
}

impl FromIterator<Box<dyn Buildable>> for Sequence {
    fn from_iter<I: IntoIterator<Item = Box<dyn Buildable>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|item| item.type_name()))
            .finish()
    }
}

impl Buildable for Sequence {
    fn lineage(&self) -> Lineage {
        Lineage::of::<Sequence>(&[])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
