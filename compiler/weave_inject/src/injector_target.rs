//! Injector-scoped view of a target method.
//!
//! # Design
//!
//! An `InjectorTarget` lives for one injector's pass over one method. It
//! caches resolved slice views by id. Views hold indices into the mutable
//! instruction list, so each cached view is checked against the list's
//! generation before it is served and re-resolved if the list moved on.
//! `dispose` (also run on drop) releases the cache; a disposed target
//! refuses further slice requests.

use std::rc::Rc;

use rustc_hash::FxHashMap;
use weave_ir::annotation::known;
use weave_ir::MethodNode;

use crate::error::InjectionError;
use crate::slice::{SliceView, Slices};
use crate::target::Target;

pub struct InjectorTarget<'a> {
    target: Rc<Target>,
    slices: &'a Slices,
    cache: FxHashMap<String, SliceView>,
    merged_by: Option<String>,
    merged_priority: i32,
    disposed: bool,
}

impl<'a> InjectorTarget<'a> {
    /// Couple `target` to an injector's declared `slices`, reading the
    /// merged-by marker from `method`.
    pub fn new(
        target: Rc<Target>,
        method: &MethodNode,
        slices: &'a Slices,
        default_priority: i32,
    ) -> Self {
        let marker = method.annotation(known::MIXIN_MERGED);
        let merged_by = marker.and_then(|m| m.get_str("mixin")).map(str::to_owned);
        let merged_priority = marker
            .and_then(|m| m.get_int("priority"))
            .and_then(|p| i32::try_from(p).ok())
            .unwrap_or(default_priority);
        InjectorTarget {
            target,
            slices,
            cache: FxHashMap::default(),
            merged_by,
            merged_priority,
            disposed: false,
        }
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// The mixin whose merge produced this method, if any.
    pub fn merged_by(&self) -> Option<&str> {
        self.merged_by.as_deref()
    }

    /// Priority recorded in the merged-by marker, or the default priority.
    pub fn merged_priority(&self) -> i32 {
        self.merged_priority
    }

    /// Resolve (or fetch from cache) the view for slice `id`.
    ///
    /// An id the injector never declared yields a view of the whole body.
    pub fn get_slice(&mut self, method: &MethodNode, id: &str) -> Result<SliceView, InjectionError> {
        if self.disposed {
            return Err(InjectionError::Disposed(self.target.key().to_string()));
        }
        if let Some(view) = self.cache.get(id) {
            if view.is_current(&method.insns) {
                return Ok(*view);
            }
            tracing::debug!(slice = %id, method = %self.target.key(), "slice is stale, re-resolving");
        }

        let view = match self.slices.get(id) {
            Some(slice) => slice.resolve(&method.insns)?,
            None => SliceView::whole(&method.insns),
        };
        self.cache.insert(id.to_owned(), view);
        Ok(view)
    }

    /// Number of cached slice views.
    pub fn cached_slices(&self) -> usize {
        self.cache.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release every cached slice.
    pub fn dispose(&mut self) {
        self.cache.clear();
        self.disposed = true;
    }
}

impl Drop for InjectorTarget<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}
