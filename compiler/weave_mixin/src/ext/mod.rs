//! Extensions run around every transformation.
//!
//! An extension observes the target class context before and after mixins
//! are applied, and receives the final tree for export. Extensions are
//! chosen once from the engine options; inactive ones are never called.

mod check_class;
mod exporter;

pub use check_class::{check_class, CheckClass};
pub use exporter::ClassExporter;

use weave_ir::ClassNode;

use crate::context::TargetClassContext;
use crate::error::MixinError;
use crate::options::Options;

pub trait Extension: Send + Sync {
    fn name(&self) -> &str;

    fn is_active(&self, options: &Options) -> bool;

    fn pre_apply(&self, _ctx: &TargetClassContext) {}

    /// Inspect the merged tree. An error fails the target.
    fn post_apply(&self, _ctx: &TargetClassContext) -> Result<(), MixinError> {
        Ok(())
    }

    /// Receive the final tree of `name`. `force` is set when a mixin
    /// requested export regardless of the options.
    fn export(&self, _name: &str, _force: bool, _class: &ClassNode) {}
}

/// The active extensions, in registration order.
#[derive(Default)]
pub struct Extensions {
    active: Vec<Box<dyn Extension>>,
}

impl Extensions {
    /// The built-in extensions that `options` activates.
    pub fn from_options(options: &Options) -> Self {
        let mut extensions = Extensions::default();
        extensions.register(Box::new(CheckClass), options);
        extensions.register(Box::new(ClassExporter::new(options)), options);
        extensions
    }

    /// Add `extension` if `options` activate it. Returns whether it was added.
    pub fn register(&mut self, extension: Box<dyn Extension>, options: &Options) -> bool {
        if !extension.is_active(options) {
            tracing::debug!(extension = extension.name(), "extension inactive");
            return false;
        }
        self.active.push(extension);
        true
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.active.iter().map(|e| e.name()).collect()
    }

    pub(crate) fn pre_apply(&self, ctx: &TargetClassContext) {
        for extension in &self.active {
            extension.pre_apply(ctx);
        }
    }

    pub(crate) fn post_apply(&self, ctx: &TargetClassContext) -> Result<(), MixinError> {
        self.active.iter().try_for_each(|e| e.post_apply(ctx))
    }

    pub(crate) fn export(&self, name: &str, force: bool, class: &ClassNode) {
        for extension in &self.active {
            extension.export(name, force, class);
        }
    }
}
