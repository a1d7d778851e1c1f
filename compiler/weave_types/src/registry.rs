//! Sharded, memoizing class registry.
//!
//! # Design
//!
//! Descriptors are stored in `NUM_SHARDS` maps, each behind its own
//! `parking_lot::RwLock`. Lookups take the shard's read lock (fast path);
//! first-time registration takes the write lock and re-checks the map before
//! inserting (slow path), so two threads describing the same class at once
//! both end up holding the descriptor that was inserted first.
//!
//! Mixin → target edges live in a separate, unsharded table: they are
//! written once per mixin discovery and read on every hierarchy walk.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};
use weave_ir::{internal_name, ClassNode};

use crate::info::{ClassInfo, MemberInfo};
use crate::provider::ClassProvider;

const NUM_SHARDS: usize = 16;

struct RegistryShard {
    classes: FxHashMap<String, Arc<ClassInfo>>,
}

/// Process-wide class metadata registry.
pub struct ClassRegistry {
    shards: [RwLock<RegistryShard>; NUM_SHARDS],
    /// Target name → names of mixins targeting it, in registration order.
    mixins_by_target: RwLock<FxHashMap<String, Vec<String>>>,
    provider: Option<Arc<dyn ClassProvider>>,
    total_count: AtomicUsize,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    /// A registry that only knows classes handed to [`describe`](Self::describe).
    pub fn new() -> Self {
        ClassRegistry {
            shards: std::array::from_fn(|_| {
                RwLock::new(RegistryShard {
                    classes: FxHashMap::default(),
                })
            }),
            mixins_by_target: RwLock::new(FxHashMap::default()),
            provider: None,
            total_count: AtomicUsize::new(0),
        }
    }

    /// A registry that fetches unknown classes from `provider`.
    pub fn with_provider(provider: Arc<dyn ClassProvider>) -> Self {
        ClassRegistry {
            provider: Some(provider),
            ..Self::new()
        }
    }

    #[inline]
    fn shard_for(name: &str) -> usize {
        let mut hash = 0u32;
        for byte in name.bytes().rev().take(12) {
            hash = hash.wrapping_mul(31).wrapping_add(u32::from(byte));
        }
        (hash as usize) % NUM_SHARDS
    }

    fn cached(&self, name: &str) -> Option<Arc<ClassInfo>> {
        self.shards[Self::shard_for(name)]
            .read()
            .classes
            .get(name)
            .cloned()
    }

    /// Insert `info` unless another descriptor for the same name got there
    /// first; returns whichever is registered.
    fn insert(&self, info: ClassInfo) -> Arc<ClassInfo> {
        let shard = &self.shards[Self::shard_for(info.name())];

        // Fast path: already registered
        if let Some(existing) = shard.read().classes.get(info.name()) {
            return Arc::clone(existing);
        }

        // Slow path: double-check under the write lock
        let mut guard = shard.write();
        if let Some(existing) = guard.classes.get(info.name()) {
            return Arc::clone(existing);
        }
        let name = info.name().to_owned();
        let info = Arc::new(info);
        guard.classes.insert(name, Arc::clone(&info));
        self.total_count.fetch_add(1, Ordering::Relaxed);
        debug!(class = %info.name(), "described class");
        info
    }

    /// Describe a class tree. The first description of a name wins; later
    /// calls return the cached descriptor.
    pub fn describe(&self, class: &ClassNode) -> Arc<ClassInfo> {
        if let Some(existing) = self.cached(&class.name) {
            return existing;
        }
        self.insert(ClassInfo::from_class(class))
    }

    /// Look up a class by reference name (dot- or slash-qualified), fetching
    /// and describing it through the provider if it is not cached yet.
    pub fn for_name(&self, name: &str) -> Option<Arc<ClassInfo>> {
        let name = internal_name(name);
        if let Some(existing) = self.cached(&name) {
            return Some(existing);
        }
        if name == weave_ir::OBJECT {
            return Some(self.insert(ClassInfo::object()));
        }

        let Some(bytes) = self.provider.as_ref().and_then(|p| p.class_bytes(&name)) else {
            warn!(class = %name, "class not found, treating as unresolvable");
            return None;
        };
        match ClassNode::from_bytes(&bytes) {
            Ok(class) if class.name == name => Some(self.describe(&class)),
            Ok(class) => {
                warn!(class = %name, found = %class.name, "provider returned a different class");
                None
            }
            Err(err) => {
                warn!(class = %name, error = %err, "could not decode class");
                None
            }
        }
    }

    /// Whether `name` is already described (no provider lookup).
    pub fn contains(&self, name: &str) -> bool {
        self.cached(&internal_name(name)).is_some()
    }

    /// Number of described classes.
    pub fn len(&self) -> usize {
        self.total_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Mixin widening ──────────────────────────────────────────────

    /// Record that `mixin` targets each of `targets`.
    pub fn register_mixin(&self, mixin: &str, targets: &[String]) {
        let mixin = internal_name(mixin);
        let mut table = self.mixins_by_target.write();
        for target in targets {
            let entry = table.entry(internal_name(target)).or_default();
            if !entry.contains(&mixin) {
                entry.push(mixin.clone());
            }
        }
    }

    /// Names of the mixins registered against `target`.
    pub fn mixins_for(&self, target: &str) -> Vec<String> {
        self.mixins_by_target
            .read()
            .get(&internal_name(target))
            .cloned()
            .unwrap_or_default()
    }

    /// Supertypes of `info` including those widened in by its mixins.
    fn widened_supertypes(&self, info: &ClassInfo) -> Vec<String> {
        let mut out: Vec<String> = info.supertypes().map(str::to_owned).collect();
        for mixin in self.mixins_for(info.name()) {
            if let Some(mixin_info) = self.for_name(&mixin) {
                // An interface mixin is itself implemented by the target
                if mixin_info.is_interface() {
                    out.push(mixin_info.name().to_owned());
                }
                out.extend(mixin_info.supertypes().map(str::to_owned));
            }
        }
        out
    }

    /// Breadth-first walk over `start` and its widened supertypes.
    ///
    /// `visit` returns `Some` to stop the walk with a result.
    fn walk<T>(&self, start: &str, mut visit: impl FnMut(&ClassInfo) -> Option<T>) -> Option<T> {
        let mut visited = FxHashSet::default();
        let mut queue = VecDeque::new();
        queue.push_back(internal_name(start));

        while let Some(name) = queue.pop_front() {
            if !visited.insert(name.clone()) {
                continue;
            }
            let Some(info) = self.for_name(&name) else {
                continue;
            };
            if let Some(found) = visit(&info) {
                return Some(found);
            }
            for parent in self.widened_supertypes(&info) {
                if !visited.contains(&parent) {
                    queue.push_back(parent);
                }
            }
        }
        None
    }

    // ── Hierarchy queries ───────────────────────────────────────────

    /// Whether a value of type `sub` is assignable to `sup`.
    ///
    /// Unresolvable classes contribute no edges, so an unknown `sub` is only
    /// assignable to itself.
    pub fn is_assignable(&self, sub: &str, sup: &str) -> bool {
        let sub = internal_name(sub);
        let sup = internal_name(sup);
        if sub == sup {
            return true;
        }
        self.walk(&sub, |info| {
            let widened = self.widened_supertypes(info);
            widened.iter().any(|parent| *parent == sup).then_some(())
        })
        .is_some()
    }

    /// Find a method on `owner` or any of its widened supertypes. Returns the
    /// declaring class name alongside the member.
    pub fn find_method_in_hierarchy(
        &self,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Option<(String, MemberInfo)> {
        self.walk(owner, |info| {
            info.find_method(name, desc)
                .map(|m| (info.name().to_owned(), m))
        })
    }

    /// Find a field on `owner` or any of its widened supertypes.
    pub fn find_field_in_hierarchy(
        &self,
        owner: &str,
        name: &str,
        desc: &str,
    ) -> Option<(String, MemberInfo)> {
        self.walk(owner, |info| {
            info.find_field(name, desc)
                .map(|f| (info.name().to_owned(), f))
        })
    }
}
