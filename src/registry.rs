//! # Wrapper Registry
//!
//! Explicit, injectable table mapping native ids back to managed wrapper
//! instances for native→managed lookup.
//!
//! The registry has a defined lifecycle (created when the runtime
//! initializes, cleared at shutdown) and tests create a fresh one per test
//! instead of sharing hidden process state. Entries are weak: the registry
//! never keeps a wrapper alive, it only answers "which wrapper currently
//! fronts this native id".
//!
//! It is also where the shared-resource policy is enforced: at most one
//! wrapper may hold `owns = true` over a native id. Other references to the
//! same object are borrowed views.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::native::RawId;
use crate::proxy::Proxy;

struct Entry {
    wrapper: Weak<Proxy>,
    owner: bool,
}

impl Entry {
    /// Live owning entries block a second owner; everything else is
    /// replaceable.
    fn is_live_owner(&self) -> bool {
        self.owner
            && self
                .wrapper
                .upgrade()
                .map(|proxy| proxy.handle().owns() && !proxy.is_disposed())
                .unwrap_or(false)
    }
}

/// Table of live wrappers keyed by native id
pub struct WrapperRegistry {
    entries: Mutex<HashMap<RawId, Entry>>,
}

impl WrapperRegistry {
    /// Create an empty registry
    pub fn new() -> Arc<Self> {
        Arc::new(WrapperRegistry {
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Record `wrapper` as fronting `id`
    ///
    /// An owning registration fails with [`Error::DuplicateOwner`] while
    /// another live owner exists, and otherwise becomes the canonical entry
    /// for the id. A borrowed registration only fills a vacant slot.
    pub fn register(&self, id: RawId, wrapper: &Arc<Proxy>, owner: bool) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&id) {
            if existing.is_live_owner() {
                if owner {
                    return Err(Error::DuplicateOwner(id));
                }
                // Owner stays canonical; the borrowed view is not recorded.
                return Ok(());
            }
            if !owner && existing.wrapper.strong_count() > 0 {
                return Ok(());
            }
        }
        entries.insert(
            id,
            Entry {
                wrapper: Arc::downgrade(wrapper),
                owner,
            },
        );
        Ok(())
    }

    /// Find the live wrapper fronting `id`, pruning dead entries
    pub fn lookup(&self, id: RawId) -> Option<Arc<Proxy>> {
        let mut entries = self.entries.lock();
        match entries.get(&id) {
            Some(entry) => match entry.wrapper.upgrade() {
                Some(proxy) => Some(proxy),
                None => {
                    entries.remove(&id);
                    None
                }
            },
            None => None,
        }
    }

    /// Remove the entry for `id` if it points at `wrapper`
    ///
    /// Called on dispose; a different wrapper that has since become
    /// canonical for the id is left alone.
    pub(crate) fn remove(&self, id: RawId, wrapper: &Weak<Proxy>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&id) {
            if entry.wrapper.ptr_eq(wrapper) {
                entries.remove(&id);
            }
        }
    }

    /// Number of recorded entries, dead or alive
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop every entry; part of runtime shutdown
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UiContext;
    use crate::handle::Ownership;
    use crate::native::fake::FakeNative;
    use crate::native::NativeInterface;
    use crate::proxy::{Affinity, Proxy};

    fn fixture() -> (
        Arc<FakeNative>,
        Arc<UiContext>,
        Arc<WrapperRegistry>,
    ) {
        (FakeNative::new(), UiContext::new(), WrapperRegistry::new())
    }

    fn attach(
        native: &Arc<FakeNative>,
        ctx: &Arc<UiContext>,
        registry: &Arc<WrapperRegistry>,
        raw: u64,
        ownership: Ownership,
    ) -> crate::error::Result<Arc<Proxy>> {
        let id = RawId::new(raw);
        native.add_object(id);
        Proxy::attach(
            native.clone() as Arc<dyn NativeInterface>,
            ctx.clone(),
            registry.clone(),
            id,
            ownership,
            Affinity::UiThread,
        )
    }

    #[test]
    fn test_lookup_finds_registered_wrapper() {
        let (native, ctx, registry) = fixture();
        let proxy = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap();

        let found = registry.lookup(RawId::new(0x1)).expect("registered");
        assert!(Arc::ptr_eq(&found, &proxy));
        assert!(registry.lookup(RawId::new(0x2)).is_none());
    }

    #[test]
    fn test_second_owner_is_rejected() {
        let (native, ctx, registry) = fixture();
        let _first = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap();

        let err = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap_err();
        assert_eq!(err, Error::DuplicateOwner(RawId::new(0x1)));
        // The rejected wrapper must not have destroyed the object on drop.
        assert_eq!(native.destroy_count(RawId::new(0x1)), 0);
    }

    #[test]
    fn test_borrowed_view_coexists_with_owner() {
        let (native, ctx, registry) = fixture();
        let owner = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap();
        let _view = attach(&native, &ctx, &registry, 0x1, Ownership::Borrowed).unwrap();

        // Owner stays canonical for lookup.
        let found = registry.lookup(RawId::new(0x1)).unwrap();
        assert!(Arc::ptr_eq(&found, &owner));
    }

    #[test]
    fn test_owner_slot_reusable_after_dispose() {
        let (native, ctx, registry) = fixture();
        let first = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap();
        first.dispose().unwrap();
        drop(first);

        // The object was destroyed; hand the id out again as a fresh native
        // object and claim it.
        native.add_object(RawId::new(0x1));
        let second = attach(&native, &ctx, &registry, 0x1, Ownership::Owned);
        assert!(second.is_ok());
    }

    #[test]
    fn test_dead_entries_are_pruned_on_lookup() {
        let (native, ctx, registry) = fixture();
        let proxy = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap();
        proxy.dispose().unwrap();
        drop(proxy);

        assert!(registry.lookup(RawId::new(0x1)).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_clear_empties_the_table() {
        let (native, ctx, registry) = fixture();
        let _a = attach(&native, &ctx, &registry, 0x1, Ownership::Owned).unwrap();
        let _b = attach(&native, &ctx, &registry, 0x2, Ownership::Owned).unwrap();
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
    }
}
