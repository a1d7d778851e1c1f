//! Per-target application state.
//!
//! # Design
//!
//! A `TargetClassContext` exclusively owns the mutable tree of one target
//! class for the duration of one transformation. Mixins are applied in two
//! passes over the sorted mixin list (priority ascending, then discovery
//! order):
//!
//! 1. **Merge**: each mixin is validated and its members are merged into the
//!    tree.
//! 2. **Inject**: accessors are generated and injectors rewrite target
//!    methods, so every injector sees the fully merged tree.
//!
//! Before each mixin's merge the context takes a [`Checkpoint`]. A merge
//! failure of an optional mixin restores it. A later failure of an optional
//! mixin rewinds to the state before the first mixin and replays both passes
//! without it. Either way the mixin is recorded as suppressed and leaves no
//! trace in the tree; any other failure aborts the transformation.
//!
//! # Lifecycle
//!
//! `apply_mixins` runs at most once, even when the first call fails. A second
//! call is an `AlreadyApplied` usage error and leaves the tree untouched. Re-application after a reload
//! always builds a fresh context from the pristine original.

use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};
use weave_inject::Target;
use weave_ir::annotation::known;
use weave_ir::textify::textify_class;
use weave_ir::{ClassNode, ClassSignature, MemberKey};
use weave_types::{ClassInfo, ClassRegistry, MemberInfo};

use crate::apply::Applicator;
use crate::error::{MixinError, TransformError};
use crate::info::MixinInfo;
use crate::options::Options;

/// An error raised by an optional mixin and suppressed.
#[derive(Debug)]
pub struct Suppressed {
    pub mixin: String,
    pub error: MixinError,
}

/// A member merged into the target, recorded in its `ClassInfo` once the
/// pass completes.
#[derive(Clone, Debug)]
pub(crate) enum MergedMember {
    Method(MemberInfo),
    Field(MemberInfo),
}

/// Everything a failed optional mixin may have touched.
pub(crate) struct Checkpoint {
    class: ClassNode,
    signature: ClassSignature,
    generic: bool,
    pending: BTreeSet<MemberKey>,
    handler_counter: u32,
    handler_names: FxHashMap<(String, MemberKey), String>,
    targets: FxHashMap<MemberKey, Rc<Target>>,
    merged: Vec<MergedMember>,
}

pub struct TargetClassContext {
    pub(crate) class: ClassNode,
    info: Arc<ClassInfo>,
    pub(crate) registry: Arc<ClassRegistry>,
    pub(crate) signature: ClassSignature,
    /// Whether the written-back class carries a generic signature.
    pub(crate) generic: bool,
    mixins: Vec<Arc<MixinInfo>>,
    targets: FxHashMap<MemberKey, Rc<Target>>,
    pub(crate) pending: BTreeSet<MemberKey>,
    suppressed: Vec<Suppressed>,
    pub(crate) handler_counter: u32,
    /// Unique merged names of injector handlers, by (mixin, handler key).
    pub(crate) handler_names: FxHashMap<(String, MemberKey), String>,
    pub(crate) merged: Vec<MergedMember>,
    applied: Vec<String>,
    is_applied: bool,
    force_export: bool,
    verbose: bool,
    pub(crate) default_priority: i32,
}

impl TargetClassContext {
    /// Build a context for `class` with the mixins that target it.
    pub fn new(
        class: ClassNode,
        mut mixins: Vec<Arc<MixinInfo>>,
        registry: Arc<ClassRegistry>,
        options: &Options,
    ) -> Self {
        mixins.sort_by_key(|m| (m.priority(), m.order()));
        let info = registry.describe(&class);
        let signature = ClassSignature::of_class(&class);
        let generic = class.signature.is_some();
        TargetClassContext {
            class,
            info,
            registry,
            signature,
            generic,
            mixins,
            targets: FxHashMap::default(),
            pending: BTreeSet::new(),
            suppressed: Vec::new(),
            handler_counter: 0,
            handler_names: FxHashMap::default(),
            merged: Vec::new(),
            applied: Vec::new(),
            is_applied: false,
            force_export: false,
            verbose: options.debug_verbose,
            default_priority: options.default_priority,
        }
    }

    pub fn name(&self) -> &str {
        &self.class.name
    }

    pub fn class(&self) -> &ClassNode {
        &self.class
    }

    pub fn info(&self) -> &Arc<ClassInfo> {
        &self.info
    }

    /// Mixins in application order.
    pub fn mixins(&self) -> &[Arc<MixinInfo>] {
        &self.mixins
    }

    /// Names of the mixins applied successfully, in application order.
    pub fn applied_mixins(&self) -> &[String] {
        &self.applied
    }

    pub fn suppressed(&self) -> &[Suppressed] {
        &self.suppressed
    }

    pub fn is_applied(&self) -> bool {
        self.is_applied
    }

    /// Whether a mixin requested this class be exported regardless of the
    /// export options.
    pub fn force_export(&self) -> bool {
        self.force_export
    }

    /// Methods registered by mixins but not merged yet.
    pub fn pending(&self) -> impl Iterator<Item = &MemberKey> {
        self.pending.iter()
    }

    /// Hand back the transformed tree.
    pub fn into_class(self) -> ClassNode {
        self.class
    }

    /// The cached handle for target method `key`, created on first use.
    pub fn target_for(&mut self, key: &MemberKey) -> Result<Rc<Target>, MixinError> {
        if let Some(target) = self.targets.get(key) {
            return Ok(Rc::clone(target));
        }
        let method = self.class.method(&key.name, &key.desc).ok_or_else(|| {
            MixinError::UnknownTargetMethod {
                target: self.class.name.clone(),
                member: key.to_string(),
            }
        })?;
        let target =
            Rc::new(Target::new(&self.class.name, method).map_err(|e| {
                MixinError::ValidationFailed {
                    class: self.class.name.clone(),
                    reason: format!("{key}: {e}"),
                }
            })?);
        self.targets.insert(key.clone(), Rc::clone(&target));
        Ok(target)
    }

    /// Number of cached target handles.
    pub fn cached_targets(&self) -> usize {
        self.targets.len()
    }

    // ── Checkpoints ─────────────────────────────────────────────────

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            class: self.class.clone(),
            signature: self.signature.clone(),
            generic: self.generic,
            pending: self.pending.clone(),
            handler_counter: self.handler_counter,
            handler_names: self.handler_names.clone(),
            targets: self
                .targets
                .iter()
                .map(|(k, t)| (k.clone(), Rc::new(Target::clone(t))))
                .collect(),
            merged: self.merged.clone(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        self.class = checkpoint.class;
        self.signature = checkpoint.signature;
        self.generic = checkpoint.generic;
        self.pending = checkpoint.pending;
        self.handler_counter = checkpoint.handler_counter;
        self.handler_names = checkpoint.handler_names;
        self.targets = checkpoint.targets;
        self.merged = checkpoint.merged;
    }

    /// Restore and suppress if `mixin` is optional, otherwise surface the
    /// error. Returns `Ok(())` when the error was suppressed.
    fn fail(
        &mut self,
        mixin: &MixinInfo,
        error: MixinError,
        checkpoint: Checkpoint,
    ) -> Result<(), TransformError> {
        let suppressed = self.suppress(mixin, error)?;
        self.restore(checkpoint);
        self.suppressed.push(suppressed);
        Ok(())
    }

    /// Surface `error` unless `mixin` is optional.
    fn suppress(&self, mixin: &MixinInfo, error: MixinError) -> Result<Suppressed, TransformError> {
        if !mixin.is_optional() {
            return Err(TransformError::new(&self.class.name, Some(mixin.name()), error));
        }
        warn!(
            target = %self.class.name,
            mixin = %mixin.name(),
            error = %error,
            "optional mixin failed, skipping it"
        );
        Ok(Suppressed {
            mixin: mixin.name().to_owned(),
            error,
        })
    }

    // ── Application ─────────────────────────────────────────────────

    /// Apply every mixin to the tree. Runs at most once, even when the first
    /// attempt fails.
    ///
    /// An optional mixin failing after its merge rewinds the tree to its
    /// state before any mixin ran and replays the passes without it.
    pub fn apply_mixins(&mut self) -> Result<(), TransformError> {
        if self.is_applied {
            return Err(TransformError::new(
                &self.class.name,
                None,
                MixinError::AlreadyApplied(self.class.name.clone()),
            ));
        }
        self.is_applied = true;
        let applicator = Applicator::for_target(&self.class);
        let mixins = self.mixins.clone();
        debug!(
            target = %self.class.name,
            ?applicator,
            mixins = mixins.len(),
            "applying mixins"
        );

        let mut pristine = self.checkpoint();
        let mut skipped: Vec<Suppressed> = Vec::new();
        while let Some(failed) = self.run_passes(applicator, &mixins, &skipped)? {
            debug!(
                target = %self.class.name,
                mixin = %failed.mixin,
                "replaying passes without failed mixin"
            );
            self.restore(pristine);
            pristine = self.checkpoint();
            skipped.push(failed);
        }
        self.suppressed.extend(skipped);

        for mixin in &mixins {
            if !self.applied.iter().any(|name| name == mixin.name()) {
                continue;
            }
            if self.verbose {
                info!(target = %self.class.name, mixin = %mixin.name(), "applied mixin");
            }
            self.run_debug_tasks(mixin);
        }

        self.finish();
        Ok(())
    }

    /// One merge, inject and post-apply pass over `mixins` minus `skipped`.
    ///
    /// Returns the first optional mixin that failed after its merge; the
    /// tree is then in an intermediate state and must be restored.
    fn run_passes(
        &mut self,
        applicator: Applicator,
        mixins: &[Arc<MixinInfo>],
        skipped: &[Suppressed],
    ) -> Result<Option<Suppressed>, TransformError> {
        self.suppressed.clear();
        self.applied.clear();

        let mut active: Vec<&Arc<MixinInfo>> = Vec::with_capacity(mixins.len());
        for mixin in mixins {
            if skipped.iter().any(|s| s.mixin == mixin.name()) {
                continue;
            }
            if let Some(plugin) = mixin.plugin() {
                if !plugin.should_apply(&self.class.name, mixin.name()) {
                    debug!(
                        target = %self.class.name,
                        mixin = %mixin.name(),
                        plugin = plugin.name(),
                        "companion plugin vetoed mixin"
                    );
                    continue;
                }
            }
            let checkpoint = self.checkpoint();
            match self.merge_one(applicator, mixin) {
                Ok(()) => active.push(mixin),
                Err(error) => self.fail(mixin, error, checkpoint)?,
            }
        }

        for &mixin in &active {
            if let Err(error) = applicator.inject(self, mixin) {
                return self.suppress(mixin, error).map(Some);
            }
        }

        for mixin in active {
            if let Some(plugin) = mixin.plugin() {
                if let Err(error) = plugin.post_apply(&self.class.name.clone(), &mut self.class, mixin) {
                    return self.suppress(mixin, error).map(Some);
                }
            }
            self.applied.push(mixin.name().to_owned());
        }
        Ok(None)
    }

    fn merge_one(&mut self, applicator: Applicator, mixin: &MixinInfo) -> Result<(), MixinError> {
        if let Some(plugin) = mixin.plugin() {
            let name = self.class.name.clone();
            plugin.pre_apply(&name, &mut self.class, mixin)?;
        }
        applicator.validate(self, mixin)?;
        applicator.merge(self, mixin)
    }

    fn run_debug_tasks(&mut self, mixin: &MixinInfo) {
        let Some(debug) = mixin.class().annotation(known::DEBUG) else {
            return;
        };
        if debug.get_bool("export").unwrap_or(false) {
            self.force_export = true;
        }
        if debug.get_bool("print").unwrap_or(false) {
            info!(
                target = %self.class.name,
                mixin = %mixin.name(),
                "\n{}",
                textify_class(&self.class)
            );
        }
    }

    /// Post-conditions of a completed pass.
    fn finish(&mut self) {
        if self.generic {
            self.class.signature = Some(self.signature.to_string());
        }
        for member in self.merged.drain(..) {
            match member {
                MergedMember::Method(m) => self.info.add_merged_method(m),
                MergedMember::Field(f) => self.info.add_merged_field(f),
            };
        }
        for key in &self.pending {
            if !key.name.starts_with('<') {
                warn!(
                    target = %self.class.name,
                    method = %key,
                    "mixin method was registered but never merged"
                );
            }
        }
        debug!(
            target = %self.class.name,
            applied = self.applied.len(),
            suppressed = self.suppressed.len(),
            "mixins applied"
        );
    }
}

#[cfg(test)]
mod tests;
