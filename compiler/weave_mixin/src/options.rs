//! Engine options and mixin configurations.
//!
//! Options are read once and passed explicitly to the transformer. They can
//! be built in code (`Options::default()` plus `with_*` methods) or read from
//! the `WEAVE_*` environment variables:
//!
//! | variable | option |
//! |---|---|
//! | `WEAVE_HOTSWAP` | `hot_swap` |
//! | `WEAVE_DEBUG_EXPORT` | `debug_export` |
//! | `WEAVE_DEBUG_EXPORT_FILTER` | `debug_export_filter` |
//! | `WEAVE_DEBUG_VERIFY` | `debug_verify` |
//! | `WEAVE_DEBUG_VERBOSE` | `debug_verbose` |
//! | `WEAVE_EXPORT_DIR` | `export_dir` |
//! | `WEAVE_DEFAULT_PRIORITY` | `default_priority` |

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::plugin::{CompanionPlugin, PluginHandle};

/// Priority of mixins that do not declare one.
pub const DEFAULT_PRIORITY: i32 = 1000;

const DEFAULT_EXPORT_DIR: &str = ".weave.out";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// Preserve original target bytes so mixins can be reloaded.
    pub hot_swap: bool,
    /// Export every transformed class.
    pub debug_export: bool,
    /// Glob restricting which classes are exported (`**`, `*`, `?`).
    pub debug_export_filter: Option<String>,
    /// Structurally check every transformed class.
    pub debug_verify: bool,
    /// Log each applied mixin at info level.
    pub debug_verbose: bool,
    pub export_dir: PathBuf,
    pub default_priority: i32,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            hot_swap: false,
            debug_export: false,
            debug_export_filter: None,
            debug_verify: false,
            debug_verbose: false,
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            default_priority: DEFAULT_PRIORITY,
        }
    }
}

impl Options {
    /// Read options from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read options through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).is_some_and(|v| parse_bool(&v));
        let mut options = Options {
            hot_swap: flag("WEAVE_HOTSWAP"),
            debug_export: flag("WEAVE_DEBUG_EXPORT"),
            debug_export_filter: lookup("WEAVE_DEBUG_EXPORT_FILTER").filter(|f| !f.is_empty()),
            debug_verify: flag("WEAVE_DEBUG_VERIFY"),
            debug_verbose: flag("WEAVE_DEBUG_VERBOSE"),
            ..Options::default()
        };
        if let Some(dir) = lookup("WEAVE_EXPORT_DIR").filter(|d| !d.is_empty()) {
            options.export_dir = PathBuf::from(dir);
        }
        if let Some(priority) = lookup("WEAVE_DEFAULT_PRIORITY").and_then(|p| p.trim().parse().ok()) {
            options.default_priority = priority;
        }
        options
    }

    #[must_use]
    pub fn with_hot_swap(mut self, enabled: bool) -> Self {
        self.hot_swap = enabled;
        self
    }

    #[must_use]
    pub fn with_debug_export(mut self, enabled: bool) -> Self {
        self.debug_export = enabled;
        self
    }

    #[must_use]
    pub fn with_debug_export_filter(mut self, filter: &str) -> Self {
        self.debug_export_filter = Some(filter.to_owned());
        self
    }

    #[must_use]
    pub fn with_debug_verify(mut self, enabled: bool) -> Self {
        self.debug_verify = enabled;
        self
    }

    #[must_use]
    pub fn with_debug_verbose(mut self, enabled: bool) -> Self {
        self.debug_verbose = enabled;
        self
    }

    #[must_use]
    pub fn with_export_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

// ── Mixin configurations ────────────────────────────────────────────

/// A named group of mixins sharing a default priority, a required flag and
/// an optional companion plugin.
///
/// Mixins from a non-required configuration are optional: a failure to apply
/// one is suppressed instead of failing the target.
#[derive(Clone)]
pub struct MixinConfig {
    pub name: String,
    pub priority: i32,
    pub required: bool,
    pub plugin: Option<Arc<PluginHandle>>,
}

impl MixinConfig {
    pub fn new(name: &str) -> Self {
        MixinConfig {
            name: name.to_owned(),
            priority: DEFAULT_PRIORITY,
            required: true,
            plugin: None,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Mark every mixin of this configuration optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn CompanionPlugin>) -> Self {
        self.plugin = Some(Arc::new(PluginHandle::new(plugin)));
        self
    }
}

impl fmt::Debug for MixinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MixinConfig")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("required", &self.required)
            .field("plugin", &self.plugin.as_ref().map(|p| p.name().to_owned()))
            .finish()
    }
}
