//! Companion plugins and their compatibility handle.
//!
//! A mixin configuration may carry a companion plugin that is consulted
//! around every application of its mixins.
//!
//! # Compatibility modes
//!
//! The handle starts in [`CompatibilityMode::Normal`] and only ever moves
//! forward:
//!
//! ```text
//! Normal ──Incompatible──▶ Compatible ──any error──▶ Failed
//! ```
//!
//! - In normal mode the full callbacks run. An [`PluginError::Incompatible`]
//!   switches to compatible mode and retries the call with the legacy
//!   callback. Other errors are logged and ignored.
//! - In compatible mode only the legacy callbacks run, on a copy of the
//!   class. Any error switches to failed mode and is fatal.
//! - In failed mode every callback is fatal.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;
use weave_ir::ClassNode;

use crate::error::MixinError;
use crate::info::MixinInfo;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PluginError {
    /// The plugin cannot work with this engine's full callback contract.
    #[error("incompatible: {0}")]
    Incompatible(String),
    #[error("{0}")]
    Failed(String),
}

/// Callbacks a companion plugin may implement. Every callback defaults to a
/// no-op.
pub trait CompanionPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `mixin` should be applied to `target`. A veto skips the mixin
    /// for this target only.
    fn should_apply(&self, _target: &str, _mixin: &str) -> bool {
        true
    }

    fn pre_apply(
        &self,
        _target: &str,
        _class: &mut ClassNode,
        _mixin: &str,
        _info: &MixinInfo,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn post_apply(
        &self,
        _target: &str,
        _class: &mut ClassNode,
        _mixin: &str,
        _info: &MixinInfo,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    /// Reduced-capability variant of [`pre_apply`](Self::pre_apply) that
    /// only sees a copy of the class.
    fn pre_apply_legacy(
        &self,
        _target: &str,
        _class: &ClassNode,
        _mixin: &str,
    ) -> Result<(), PluginError> {
        Ok(())
    }

    fn post_apply_legacy(
        &self,
        _target: &str,
        _class: &ClassNode,
        _mixin: &str,
    ) -> Result<(), PluginError> {
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompatibilityMode {
    Normal,
    Compatible,
    Failed,
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Pre,
    Post,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Pre => "pre_apply",
            Phase::Post => "post_apply",
        }
    }
}

/// A companion plugin plus its compatibility state. Shared by every mixin of
/// the owning configuration.
pub struct PluginHandle {
    plugin: Arc<dyn CompanionPlugin>,
    mode: Mutex<CompatibilityMode>,
}

impl PluginHandle {
    pub fn new(plugin: Arc<dyn CompanionPlugin>) -> Self {
        PluginHandle {
            plugin,
            mode: Mutex::new(CompatibilityMode::Normal),
        }
    }

    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    pub fn mode(&self) -> CompatibilityMode {
        *self.mode.lock()
    }

    pub fn should_apply(&self, target: &str, mixin: &str) -> bool {
        self.plugin.should_apply(target, mixin)
    }

    pub fn pre_apply(
        &self,
        target: &str,
        class: &mut ClassNode,
        info: &MixinInfo,
    ) -> Result<(), MixinError> {
        self.dispatch(Phase::Pre, target, class, info)
    }

    pub fn post_apply(
        &self,
        target: &str,
        class: &mut ClassNode,
        info: &MixinInfo,
    ) -> Result<(), MixinError> {
        self.dispatch(Phase::Post, target, class, info)
    }

    fn dispatch(
        &self,
        phase: Phase,
        target: &str,
        class: &mut ClassNode,
        info: &MixinInfo,
    ) -> Result<(), MixinError> {
        let mixin = info.name();
        match self.mode() {
            CompatibilityMode::Failed => Err(self.fatal(phase, "plugin is in failed mode")),
            CompatibilityMode::Compatible => self.legacy(phase, target, class, mixin),
            CompatibilityMode::Normal => {
                let result = match phase {
                    Phase::Pre => self.plugin.pre_apply(target, class, mixin, info),
                    Phase::Post => self.plugin.post_apply(target, class, mixin, info),
                };
                match result {
                    Ok(()) => Ok(()),
                    Err(PluginError::Incompatible(reason)) => {
                        warn!(
                            plugin = self.name(),
                            %reason,
                            "companion plugin is incompatible, switching to compatible mode"
                        );
                        *self.mode.lock() = CompatibilityMode::Compatible;
                        self.legacy(phase, target, class, mixin)
                    }
                    Err(PluginError::Failed(message)) => {
                        warn!(
                            plugin = self.name(),
                            target,
                            mixin,
                            phase = phase.as_str(),
                            %message,
                            "companion plugin failed"
                        );
                        Ok(())
                    }
                }
            }
        }
    }

    fn legacy(
        &self,
        phase: Phase,
        target: &str,
        class: &ClassNode,
        mixin: &str,
    ) -> Result<(), MixinError> {
        let copy = class.clone();
        let result = match phase {
            Phase::Pre => self.plugin.pre_apply_legacy(target, &copy, mixin),
            Phase::Post => self.plugin.post_apply_legacy(target, &copy, mixin),
        };
        result.map_err(|err| {
            *self.mode.lock() = CompatibilityMode::Failed;
            self.fatal(phase, &err.to_string())
        })
    }

    fn fatal(&self, phase: Phase, message: &str) -> MixinError {
        MixinError::CompanionPlugin {
            plugin: self.name().to_owned(),
            message: format!("{}: {message}", phase.as_str()),
        }
    }
}
