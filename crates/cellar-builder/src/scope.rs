//! The active registry of each thread and scoped overrides of it.
//!
//! Every thread has its own active [`BuilderContext`] and
//! [`ResolverContext`]. The first read on a thread installs a private
//! extension of the process-wide default, so registering on the active
//! registry never reaches the shared default or other threads.
//!
//! [`builder_context`] installs a derived registry for as long as the
//! returned [`Scope`] lives and restores the previous one when it drops,
//! whether the block returns normally, exits early through `?`, or unwinds.
//! Each scope owns one frame of a per-thread stack, so guards dropped out of
//! order remove only their own frame. `Scope` is `!Send`: it must be dropped
//! on the thread that created it.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::OnceLock;
use std::thread::LocalKey;

use tracing::{debug, warn};

use crate::builder::Builder;
use crate::context::BuilderContext;
use crate::defaults::{register_default_builders, register_default_resolvers};
use crate::lineage::TypeKey;
use crate::resolver::{Resolver, ResolverContext};

thread_local! {
    static ACTIVE_BUILDERS: RefCell<Frames<BuilderContext>> = const { RefCell::new(Frames::new()) };
    static ACTIVE_RESOLVERS: RefCell<Frames<ResolverContext>> = const { RefCell::new(Frames::new()) };
}

static DEFAULT_BUILDERS: OnceLock<BuilderContext> = OnceLock::new();
static DEFAULT_RESOLVERS: OnceLock<ResolverContext> = OnceLock::new();

/// Per-thread stack of active registries.
///
/// `root` is the thread's own registry, created on first read. Every live
/// [`Scope`] owns one frame, tagged with a token unique on the thread.
pub struct Frames<C> {
    root: Option<C>,
    stack: Vec<(u64, C)>,
    next_token: u64,
}

impl<C> Frames<C> {
    pub const fn new() -> Self {
        Self {
            root: None,
            stack: Vec::new(),
            next_token: 0,
        }
    }

    fn push(&mut self, active: C) -> u64 {
        let token = self.next_token;
        self.next_token += 1;
        self.stack.push((token, active));
        token
    }

    /// Remove the frame tagged `token`. Returns whether it was the top one.
    fn remove(&mut self, token: u64) -> bool {
        match self.stack.iter().rposition(|(t, _)| *t == token) {
            Some(at) => {
                let top = at + 1 == self.stack.len();
                self.stack.remove(at);
                top
            }
            None => true,
        }
    }
}

impl<C> Default for Frames<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// A registry that can be made active per thread.
pub trait Scoped: Clone + 'static {
    /// The thread-local stack holding the active registry.
    fn slot() -> &'static LocalKey<RefCell<Frames<Self>>>;

    /// The registry a thread starts with.
    fn initial() -> Self;
}

impl Scoped for BuilderContext {
    fn slot() -> &'static LocalKey<RefCell<Frames<Self>>> {
        &ACTIVE_BUILDERS
    }

    fn initial() -> Self {
        default_builders().extend(Vec::new())
    }
}

impl Scoped for ResolverContext {
    fn slot() -> &'static LocalKey<RefCell<Frames<Self>>> {
        &ACTIVE_RESOLVERS
    }

    fn initial() -> Self {
        default_resolvers().extend(Vec::new())
    }
}

/// The process-wide default builders, seeded on first use.
///
/// Registering here is configuration: do it before other threads start
/// reading their active registries, since each thread copies the default
/// when it first needs one.
pub fn default_builders() -> &'static BuilderContext {
    DEFAULT_BUILDERS.get_or_init(|| {
        let builders = BuilderContext::new();
        register_default_builders(&builders);
        builders
    })
}

/// The process-wide default resolvers, seeded on first use.
pub fn default_resolvers() -> &'static ResolverContext {
    DEFAULT_RESOLVERS.get_or_init(|| {
        let resolvers = ResolverContext::new();
        register_default_resolvers(&resolvers);
        resolvers
    })
}

/// The active registry of the calling thread.
pub fn current<C: Scoped>() -> C {
    C::slot().with(|cell| {
        let mut frames = cell.borrow_mut();
        if let Some((_, top)) = frames.stack.last() {
            return top.clone();
        }
        frames.root.get_or_insert_with(C::initial).clone()
    })
}

pub fn current_builders() -> BuilderContext {
    current::<BuilderContext>()
}

pub fn current_resolvers() -> ResolverContext {
    current::<ResolverContext>()
}

/// Guard keeping a registry active on the current thread.
#[must_use = "the registry is deactivated as soon as the scope is dropped"]
pub struct Scope<C: Scoped> {
    active: C,
    token: u64,
    _not_send: PhantomData<*const ()>,
}

impl<C: Scoped> Scope<C> {
    /// Make `active` the thread's registry until the guard drops.
    pub fn enter(active: C) -> Self {
        let token = C::slot().with(|cell| cell.borrow_mut().push(active.clone()));
        debug!(registry = std::any::type_name::<C>(), token, "entered scope");
        Self {
            active,
            token,
            _not_send: PhantomData,
        }
    }

    pub fn context(&self) -> &C {
        &self.active
    }
}

impl<C: Scoped> Deref for Scope<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.active
    }
}

impl<C: Scoped> Drop for Scope<C> {
    fn drop(&mut self) {
        let token = self.token;
        // The slot is already gone if the thread is tearing down.
        let Ok(was_top) = C::slot().try_with(|cell| cell.borrow_mut().remove(token)) else {
            return;
        };
        if was_top {
            debug!(registry = std::any::type_name::<C>(), token, "left scope");
        } else {
            warn!(
                registry = std::any::type_name::<C>(),
                token, "scope dropped out of order; inner scopes stay active"
            );
        }
    }
}

/// Activate `base` (default: the current registry) extended with
/// `overrides` until the returned scope drops.
pub fn builder_context<I>(overrides: I, base: Option<&BuilderContext>) -> Scope<BuilderContext>
where
    I: IntoIterator<Item = (TypeKey, Builder)>,
{
    let current = current_builders();
    let local = base.unwrap_or(&current).extend(overrides);
    Scope::enter(local)
}

/// Resolver counterpart of [`builder_context`].
pub fn resolver_context<I>(overrides: I, base: Option<&ResolverContext>) -> Scope<ResolverContext>
where
    I: IntoIterator<Item = (String, Resolver)>,
{
    let current = current_resolvers();
    let local = base.unwrap_or(&current).extend(overrides);
    Scope::enter(local)
}

/// Run `f` with `overrides` active, restoring the previous builders after.
pub fn with_builders<I, R>(overrides: I, f: impl FnOnce(&BuilderContext) -> R) -> R
where
    I: IntoIterator<Item = (TypeKey, Builder)>,
{
    let scope = builder_context(overrides, None);
    f(&scope)
}

pub fn with_resolvers<I, R>(overrides: I, f: impl FnOnce(&ResolverContext) -> R) -> R
where
    I: IntoIterator<Item = (String, Resolver)>,
{
    let scope = resolver_context(overrides, None);
    f(&scope)
}

#[cfg(test)]
mod tests {
    use std::panic::{self, AssertUnwindSafe};

    use cellar_types::ObjectId;

    use super::*;
    use crate::builder::Built;
    use crate::context::Overrides;
    use crate::error::{BuildError, BuildResult};
    use crate::lineage::AnyValue;

    fn tag(raw: u64) -> Builder {
        Builder::new(move |_, _| Ok(Built::Id(ObjectId::from_raw(raw))))
    }

    #[test]
    fn current_is_stable_and_private() {
        let first = current_builders();
        assert_eq!(first, current_builders());
        assert_ne!(&first, default_builders());

        enum OnlyHere {}
        first.register_for::<OnlyHere>(tag(1));
        assert!(!default_builders().contains(&TypeKey::of::<OnlyHere>()));
    }

    #[test]
    fn scope_installs_and_restores() {
        let before = current_builders();
        {
            let scope = builder_context(Overrides::new().with::<AnyValue>(tag(1)), None);
            assert_eq!(current_builders(), *scope.context());
            assert_ne!(current_builders(), before);
        }
        assert_eq!(current_builders(), before);
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let outer_before = current_builders();
        let a = builder_context(Overrides::new(), None);
        let a_ctx = a.context().clone();
        {
            let b = builder_context(Overrides::new(), None);
            assert_eq!(current_builders(), *b);
        }
        assert_eq!(current_builders(), a_ctx);
        drop(a);
        assert_eq!(current_builders(), outer_before);
    }

    #[test]
    fn out_of_order_drops_do_not_leak_overrides() {
        let before = current_builders();
        let a = builder_context(Overrides::new().with::<u128>(tag(1)), None);
        let b = builder_context(Overrides::new(), None);
        let b_ctx = b.context().clone();

        drop(a);
        assert_eq!(current_builders(), b_ctx);
        drop(b);
        assert_eq!(current_builders(), before);
        assert!(!current_builders().contains(&TypeKey::of::<u128>()));
    }

    #[test]
    fn middle_drop_keeps_later_scopes_active() {
        let before = current_builders();
        let outer = builder_context(Overrides::new(), None);
        let outer_ctx = outer.context().clone();
        let inner = builder_context(Overrides::new(), None);
        let inner_ctx = inner.context().clone();
        let third = builder_context(Overrides::new(), None);
        let third_ctx = third.context().clone();

        drop(inner);
        assert_eq!(current_builders(), third_ctx);
        drop(third);
        assert_eq!(current_builders(), outer_ctx);
        assert_ne!(current_builders(), inner_ctx);
        drop(outer);
        assert_eq!(current_builders(), before);
    }

    #[test]
    fn nested_scope_extends_the_enclosing_one() {
        let _outer = builder_context(Overrides::new().with::<u128>(tag(5)), None);
        let inner = builder_context(Overrides::new(), None);
        assert!(inner.contains(&TypeKey::of::<u128>()));
    }

    #[test]
    fn explicit_base_replaces_current() {
        let base = BuilderContext::new();
        let _scope = builder_context(Overrides::new(), Some(&base));
        let active = current_builders();
        assert_ne!(active, base);
        assert!(active.is_empty());
    }

    #[test]
    fn scope_restored_after_error() {
        fn failing() -> BuildResult<()> {
            let _scope = builder_context(Overrides::new(), None);
            Err(BuildError::NotEncodable { type_name: "x" })?;
            Ok(())
        }

        let before = current_builders();
        assert!(failing().is_err());
        assert_eq!(current_builders(), before);
    }

    #[test]
    fn scope_restored_after_panic() {
        let before = current_builders();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _scope = builder_context(Overrides::new(), None);
            panic!("builder blew up");
        }));
        assert!(result.is_err());
        assert_eq!(current_builders(), before);
    }

    #[test]
    fn with_builders_scopes_the_closure() {
        let before = current_builders();
        let inside = with_builders(Overrides::new(), |ctx| {
            assert_eq!(current_builders(), *ctx);
            ctx.clone()
        });
        assert_ne!(inside, before);
        assert_eq!(current_builders(), before);
    }

    #[test]
    fn threads_do_not_see_each_other() {
        let _scope = builder_context(Overrides::new().with::<u128>(tag(1)), None);
        let mine = current_builders();

        let seen_elsewhere = std::thread::spawn(|| {
            let _theirs = builder_context(Overrides::new().with::<i128>(tag(2)), None);
            let active = current_builders();
            (
                active.contains(&TypeKey::of::<u128>()),
                active.contains(&TypeKey::of::<i128>()),
            )
        })
        .join()
        .unwrap();

        assert_eq!(seen_elsewhere, (false, true));
        assert_eq!(current_builders(), mine);
        assert!(!mine.contains(&TypeKey::of::<i128>()));
    }

    #[test]
    fn resolver_scopes_restore_too() {
        let before = current_resolvers();
        {
            let scope = resolver_context(Vec::new(), None);
            assert_eq!(current_resolvers(), *scope);
        }
        assert_eq!(current_resolvers(), before);
    }
}
