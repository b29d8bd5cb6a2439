//! Type descriptors and their linearized ancestry.
//!
//! Rust has no runtime inheritance chain to walk, so every buildable type
//! states its ancestry up front as a [`Lineage`]: its own [`TypeKey`]
//! followed by its ancestors, most derived first, always ending at the
//! universal root [`AnyValue`]. The registry trusts this order and returns
//! the first entry it has a builder for.
//!
//! Ancestors are usually marker types (`enum Scalar {}`) standing in for a
//! family of values. Multiple ancestry is ordered with [`Lineage::merge`],
//! which computes the C3 linearization of the parent lineages.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{BuildError, BuildResult};

/// The universal root of every lineage.
///
/// The builder registered for this key is the fallback for values no other
/// entry matches.
pub enum AnyValue {}

/// Ancestor of the primitive scalar types.
pub enum Scalar {}

/// Ancestor of raw byte buffers.
pub enum Binary {}

/// Registry key for a type: its `TypeId` plus its name for diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The key of [`AnyValue`].
    pub fn root() -> Self {
        Self::of::<AnyValue>()
    }

    pub fn is_root(&self) -> bool {
        self.id == TypeId::of::<AnyValue>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.id
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Linearized ancestry of a type, most derived first, ending at the root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lineage(Vec<TypeKey>);

impl Lineage {
    /// Lineage of `T` given its ancestors in already-linearized order.
    ///
    /// Duplicates and explicit mentions of the root are dropped; the root is
    /// always appended last.
    pub fn of<T: ?Sized + 'static>(bases: &[TypeKey]) -> Self {
        let key = TypeKey::of::<T>();
        let mut keys = vec![key];
        for base in bases {
            if !base.is_root() && !keys.contains(base) {
                keys.push(*base);
            }
        }
        if !key.is_root() {
            keys.push(TypeKey::root());
        }
        Self(keys)
    }

    /// The lineage of [`AnyValue`] itself.
    pub fn root() -> Self {
        Self(vec![TypeKey::root()])
    }

    /// C3 linearization of `key` over its direct parents' lineages.
    ///
    /// Parents are listed in declaration order. Fails when the parents
    /// disagree on the relative order of two shared ancestors, or when `key`
    /// already appears among its own ancestors.
    pub fn merge(key: TypeKey, parents: &[Lineage]) -> BuildResult<Self> {
        if parents.iter().any(|p| p.contains(&key)) {
            return Err(BuildError::InconsistentLineage {
                type_name: key.name(),
                reason: "type appears among its own ancestors".into(),
            });
        }

        let mut sequences: Vec<Vec<TypeKey>> = parents.iter().map(|p| p.0.clone()).collect();
        sequences.push(parents.iter().map(Lineage::key).collect());

        let mut keys = vec![key];
        loop {
            sequences.retain(|s| !s.is_empty());
            if sequences.is_empty() {
                break;
            }

            let next = sequences
                .iter()
                .map(|s| s[0])
                .find(|head| !sequences.iter().any(|s| s[1..].contains(head)));

            let Some(next) = next else {
                let heads: Vec<&str> = sequences.iter().map(|s| s[0].name()).collect();
                return Err(BuildError::InconsistentLineage {
                    type_name: key.name(),
                    reason: format!("cannot order {}", heads.join(", ")),
                });
            };

            keys.push(next);
            for sequence in &mut sequences {
                if sequence[0] == next {
                    sequence.remove(0);
                }
            }
        }

        if !key.is_root() && keys.last().map_or(true, |last| !last.is_root()) {
            keys.push(TypeKey::root());
        }
        Ok(Self(keys))
    }

    /// The most derived type: the type this lineage describes.
    pub fn key(&self) -> TypeKey {
        self.0.first().copied().unwrap_or_else(TypeKey::root)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeKey> {
        self.0.iter()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.0.contains(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A value that can be dispatched to a builder.
///
/// Implement with the [`buildable!`](crate::buildable) macro for serde types,
/// or by hand when a type has no serde form or needs a custom encoding.
pub trait Buildable: Any + Send + Sync {
    /// The value's type followed by its linearized ancestors.
    fn lineage(&self) -> Lineage;

    fn as_any(&self) -> &dyn Any;

    /// Byte form used by the universal fallback builder.
    fn encode(&self) -> BuildResult<Vec<u8>> {
        Err(BuildError::NotEncodable {
            type_name: self.type_name(),
        })
    }

    fn type_name(&self) -> &'static str {
        self.lineage().key().name()
    }
}

/// Implement [`Buildable`] for a serde type, encoding it with bincode.
///
/// ```
/// use cellar_builder::{buildable, Buildable, Scalar, TypeKey};
///
/// #[derive(serde::Serialize)]
/// struct Celsius(f64);
///
/// buildable!(Celsius => [Scalar]);
///
/// let lineage = Celsius(21.5).lineage();
/// assert_eq!(lineage.key(), TypeKey::of::<Celsius>());
/// assert!(lineage.contains(&TypeKey::of::<Scalar>()));
/// ```
#[macro_export]
macro_rules! buildable {
    ($ty:ty => [$($base:ty),* $(,)?]) => {
        impl $crate::Buildable for $ty {
            fn lineage(&self) -> $crate::Lineage {
                $crate::Lineage::of::<$ty>(&[$($crate::TypeKey::of::<$base>()),*])
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn encode(&self) -> $crate::BuildResult<::std::vec::Vec<u8>> {
                $crate::__private::bincode::serialize(self)
                    .map_err(|e| $crate::BuildError::Encoding(e.to_string()))
            }
        }
    };
    ($ty:ty) => {
        $crate::buildable!($ty => []);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    enum Base {}
    enum Left {}
    enum Right {}
    enum Diamond {}
    enum Crossed {}

    fn lineage_of(key: TypeKey, parents: &[Lineage]) -> Lineage {
        Lineage::merge(key, parents).unwrap()
    }

    fn names(lineage: &Lineage) -> Vec<TypeKey> {
        lineage.iter().copied().collect()
    }

    #[test]
    fn leaf_lineage_ends_at_root() {
        let lineage = Lineage::of::<Base>(&[]);
        assert_eq!(names(&lineage), vec![TypeKey::of::<Base>(), TypeKey::root()]);
        assert_eq!(lineage.key(), TypeKey::of::<Base>());
    }

    #[test]
    fn explicit_bases_keep_order_and_drop_duplicates() {
        let lineage = Lineage::of::<Diamond>(&[
            TypeKey::of::<Left>(),
            TypeKey::root(),
            TypeKey::of::<Right>(),
            TypeKey::of::<Left>(),
        ]);
        assert_eq!(
            names(&lineage),
            vec![
                TypeKey::of::<Diamond>(),
                TypeKey::of::<Left>(),
                TypeKey::of::<Right>(),
                TypeKey::root(),
            ]
        );
    }

    #[test]
    fn root_lineage_is_just_root() {
        assert_eq!(Lineage::of::<AnyValue>(&[]), Lineage::root());
        assert_eq!(Lineage::root().len(), 1);
    }

    #[test]
    fn merge_without_parents_is_a_leaf() {
        let lineage = lineage_of(TypeKey::of::<Base>(), &[]);
        assert_eq!(lineage, Lineage::of::<Base>(&[]));
    }

    #[test]
    fn merge_linearizes_a_diamond() {
        let base = Lineage::of::<Base>(&[]);
        let left = lineage_of(TypeKey::of::<Left>(), &[base.clone()]);
        let right = lineage_of(TypeKey::of::<Right>(), &[base]);
        let diamond = lineage_of(TypeKey::of::<Diamond>(), &[left, right]);
        assert_eq!(
            names(&diamond),
            vec![
                TypeKey::of::<Diamond>(),
                TypeKey::of::<Left>(),
                TypeKey::of::<Right>(),
                TypeKey::of::<Base>(),
                TypeKey::root(),
            ]
        );
    }

    #[test]
    fn merge_rejects_conflicting_orders() {
        let left = Lineage::of::<Left>(&[]);
        let right = Lineage::of::<Right>(&[]);
        let lr = lineage_of(TypeKey::of::<Diamond>(), &[left.clone(), right.clone()]);
        let rl = lineage_of(TypeKey::of::<Base>(), &[right, left]);
        let err = Lineage::merge(TypeKey::of::<Crossed>(), &[lr, rl]).unwrap_err();
        assert!(matches!(err, BuildError::InconsistentLineage { .. }));
    }

    #[test]
    fn merge_rejects_self_ancestry() {
        let base = Lineage::of::<Base>(&[]);
        let err = Lineage::merge(TypeKey::of::<Base>(), &[base]).unwrap_err();
        assert!(matches!(err, BuildError::InconsistentLineage { .. }));
    }

    #[test]
    fn type_keys_compare_by_type_only() {
        assert_eq!(TypeKey::of::<Base>(), TypeKey::of::<Base>());
        assert_ne!(TypeKey::of::<Base>(), TypeKey::of::<Left>());
        assert!(TypeKey::root().is_root());
        assert!(TypeKey::of::<Left>().name().ends_with("Left"));
    }
}
