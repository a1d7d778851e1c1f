//! The engine entry point.
//!
//! # Design
//!
//! `MixinTransformer` is shared by every class-load event of the host, so it
//! is `Send + Sync`: the mixin table sits behind a `parking_lot::RwLock`,
//! the registry is internally sharded and the original-bytecode store is a
//! `DashMap`. Each call to [`MixinTransformer::transform`] builds its own
//! [`TargetClassContext`], which is never shared.
//!
//! Loading a class can trigger loading another one on the same thread (the
//! registry's provider may need a supertype). A transform that re-enters on
//! a thread already inside `transform` returns [`Transformed::Deferred`]
//! without touching any state.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashSet;
use tracing::{debug, info};
use weave_ir::{internal_name, ClassNode};
use weave_types::ClassRegistry;

use crate::context::TargetClassContext;
use crate::error::{MixinError, ReloadError, TransformError};
use crate::ext::{Extension, Extensions};
use crate::hotswap::OriginalBytecodeStore;
use crate::info::MixinInfo;
use crate::options::{MixinConfig, Options};

/// Outcome of one transform request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transformed {
    /// No mixin targets the class.
    Unchanged,
    Modified(Vec<u8>),
    /// Re-entrant request on a thread already transforming; the host should
    /// load the class as is.
    Deferred,
}

pub struct MixinTransformer {
    registry: Arc<ClassRegistry>,
    options: Options,
    mixins: RwLock<Vec<Arc<MixinInfo>>>,
    next_order: AtomicU32,
    extensions: Extensions,
    originals: Option<Arc<OriginalBytecodeStore>>,
    transformed: RwLock<BTreeSet<String>>,
    active: Mutex<FxHashSet<ThreadId>>,
}

impl MixinTransformer {
    pub fn new(registry: Arc<ClassRegistry>, options: Options) -> Self {
        let extensions = Extensions::from_options(&options);
        let originals = options
            .hot_swap
            .then(|| Arc::new(OriginalBytecodeStore::new()));
        debug!(
            extensions = ?extensions.names(),
            hot_swap = options.hot_swap,
            "created mixin transformer"
        );
        MixinTransformer {
            registry,
            options,
            mixins: RwLock::new(Vec::new()),
            next_order: AtomicU32::new(0),
            extensions,
            originals,
            transformed: RwLock::new(BTreeSet::new()),
            active: Mutex::new(FxHashSet::default()),
        }
    }

    /// Add `extension` if the options activate it.
    #[must_use]
    pub fn with_extension(mut self, extension: Box<dyn Extension>) -> Self {
        self.extensions.register(extension, &self.options);
        self
    }

    pub fn registry(&self) -> &Arc<ClassRegistry> {
        &self.registry
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The original-bytecode store, present when hot swap is enabled.
    pub fn originals(&self) -> Option<&Arc<OriginalBytecodeStore>> {
        self.originals.as_ref()
    }

    // ── Mixins ──────────────────────────────────────────────────────

    /// Register a mixin of `config`. Discovery order follows registration
    /// order.
    pub fn add_mixin(
        &self,
        config: &Arc<MixinConfig>,
        class: ClassNode,
    ) -> Result<Arc<MixinInfo>, MixinError> {
        if self.mixin(&class.name).is_some() {
            return Err(MixinError::invalid(&class.name, "mixin is already registered"));
        }
        let order = self.next_order.fetch_add(1, Ordering::Relaxed);
        let info = Arc::new(MixinInfo::parse(
            class,
            Arc::clone(config),
            order,
            &self.registry,
        )?);
        self.mixins.write().push(Arc::clone(&info));
        debug!(mixin = %info.name(), config = %config.name, order, "registered mixin");
        Ok(info)
    }

    /// Register a mixin from its binary form.
    pub fn add_mixin_bytes(
        &self,
        config: &Arc<MixinConfig>,
        bytes: &[u8],
    ) -> Result<Arc<MixinInfo>, MixinError> {
        self.add_mixin(config, ClassNode::from_bytes(bytes)?)
    }

    pub fn mixin(&self, name: &str) -> Option<Arc<MixinInfo>> {
        let name = internal_name(name);
        self.mixins
            .read()
            .iter()
            .find(|m| m.name() == name)
            .cloned()
    }

    /// Mixins targeting `target`, in registration order.
    pub fn mixins_for(&self, target: &str) -> Vec<Arc<MixinInfo>> {
        self.mixins
            .read()
            .iter()
            .filter(|m| m.targets_class(target))
            .cloned()
            .collect()
    }

    /// Names of the classes transformed so far.
    pub fn transformed_classes(&self) -> Vec<String> {
        self.transformed.read().iter().cloned().collect()
    }

    // ── Transformation ──────────────────────────────────────────────

    /// Transform class `name` from its binary form.
    pub fn transform(&self, name: &str, bytes: &[u8]) -> Result<Transformed, TransformError> {
        let name = internal_name(name);
        let Some(_guard) = ReentranceGuard::enter(&self.active) else {
            debug!(target = %name, "re-entrant transform, deferring");
            return Ok(Transformed::Deferred);
        };

        let mixins = self.mixins_for(&name);
        if mixins.is_empty() {
            return Ok(Transformed::Unchanged);
        }
        if let Some(store) = &self.originals {
            store.preserve(&name, bytes);
        }
        let bytes = self.apply(&name, bytes, mixins)?;
        self.transformed.write().insert(name);
        Ok(Transformed::Modified(bytes))
    }

    /// Transform `original` through a fresh context, as after a reload.
    /// Returns `original` unchanged when no mixin targets the class anymore,
    /// or when called from within a transformation on the same thread.
    pub fn retransform(&self, name: &str, original: &[u8]) -> Result<Vec<u8>, TransformError> {
        let name = internal_name(name);
        let Some(_guard) = ReentranceGuard::enter(&self.active) else {
            debug!(target = %name, "re-entrant retransform, returning original");
            return Ok(original.to_vec());
        };

        let mixins = self.mixins_for(&name);
        if mixins.is_empty() {
            return Ok(original.to_vec());
        }
        self.apply(&name, original, mixins)
    }

    fn apply(
        &self,
        name: &str,
        bytes: &[u8],
        mixins: Vec<Arc<MixinInfo>>,
    ) -> Result<Vec<u8>, TransformError> {
        let fail = |source: MixinError| TransformError::new(name, None, source);
        let class = ClassNode::from_bytes(bytes).map_err(|e| fail(e.into()))?;
        if class.name != name {
            return Err(fail(MixinError::ValidationFailed {
                class: name.to_owned(),
                reason: format!("bytes describe {}", class.name),
            }));
        }

        let mut ctx = TargetClassContext::new(
            class,
            mixins,
            Arc::clone(&self.registry),
            &self.options,
        );
        self.extensions.pre_apply(&ctx);
        ctx.apply_mixins()?;
        self.extensions.post_apply(&ctx).map_err(fail)?;

        let force = ctx.force_export();
        let class = ctx.into_class();
        self.extensions.export(name, force, &class);
        class.to_bytes().map_err(|e| fail(e.into()))
    }

    // ── Reload ──────────────────────────────────────────────────────

    /// Replace the definition of mixin `name` with `bytes`.
    ///
    /// The new definition keeps the configuration and discovery order of the
    /// old one and must declare the same targets. Returns the already
    /// transformed targets that need to be re-transformed.
    pub fn reload(&self, name: &str, bytes: &[u8]) -> Result<Vec<String>, ReloadError> {
        let name = internal_name(name);
        let existing = self
            .mixin(&name)
            .ok_or_else(|| ReloadError::UnknownMixin(name.clone()))?;
        let class = ClassNode::from_bytes(bytes).map_err(|source| ReloadError::InvalidBytes {
            mixin: name.clone(),
            source,
        })?;
        if class.name != name {
            return Err(MixinError::invalid(
                &name,
                format!("new definition is named {}", class.name),
            )
            .into());
        }

        let info = MixinInfo::parse(
            class,
            Arc::clone(existing.config()),
            existing.order(),
            &self.registry,
        )?;
        if info.targets() != existing.targets() {
            return Err(ReloadError::TargetsChanged {
                mixin: name,
                old: existing.targets().to_vec(),
                new: info.targets().to_vec(),
            });
        }
        if let Some(target) = info
            .targets()
            .iter()
            .find(|t| !existing.is_virtual_target(t) && self.registry.for_name(t).is_none())
        {
            return Err(ReloadError::UnresolvableTarget {
                mixin: name,
                target: target.clone(),
            });
        }

        let info = Arc::new(info);
        {
            let mut mixins = self.mixins.write();
            if let Some(slot) = mixins.iter_mut().find(|m| m.name() == name) {
                *slot = Arc::clone(&info);
            }
        }
        let affected: Vec<String> = self
            .transformed
            .read()
            .iter()
            .filter(|t| info.targets_class(t))
            .cloned()
            .collect();
        info!(mixin = %name, affected = affected.len(), "reloaded mixin");
        Ok(affected)
    }
}

/// Marks the current thread as transforming until dropped.
struct ReentranceGuard<'a> {
    threads: &'a Mutex<FxHashSet<ThreadId>>,
    id: ThreadId,
}

impl<'a> ReentranceGuard<'a> {
    fn enter(threads: &'a Mutex<FxHashSet<ThreadId>>) -> Option<Self> {
        let id = thread::current().id();
        if !threads.lock().insert(id) {
            return None;
        }
        Some(ReentranceGuard { threads, id })
    }
}

impl Drop for ReentranceGuard<'_> {
    fn drop(&mut self) {
        self.threads.lock().remove(&self.id);
    }
}
