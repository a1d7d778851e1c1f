//! Mixin application engine.
//!
//! Merges independently authored partial class definitions ("mixins") into
//! target classes at load time. The result is the deterministic composition
//! of every applicable mixin, ordered by priority and discovery order.
//!
//! # Architecture
//!
//! - **[`MixinTransformer`]**: the entry point. Holds the registered
//!   mixins, transforms class bytes and coordinates reloads.
//! - **[`MixinInfo`]**: a parsed mixin: targets, priority and one
//!   [`MemberHandler`] per member.
//! - **[`TargetClassContext`]**: exclusive owner of one target's tree during
//!   one transformation; runs the merge and injection passes.
//! - **[`Applicator`]**: the standard and interface merge rules.
//! - **[`HotSwap`]**: re-applies a reloaded mixin to the pristine originals
//!   of its targets and hands the results to the host.
//! - **[`Extension`]**: hooks around every transformation: structural
//!   checks ([`CheckClass`]) and debug export ([`ClassExporter`]).
//!
//! # Data Flow
//!
//! ```text
//! bytes ─▶ ClassNode ─▶ TargetClassContext ──merge──▶ inject ──▶ extensions ─▶ bytes
//!                            ▲                           │
//!                     ClassRegistry ◀── InjectorTarget ──┘
//! ```
//!
//! # Tracing
//!
//! Every step logs through `tracing`. Call [`init_tracing`] once at startup
//! and set `RUST_LOG` (e.g. `RUST_LOG=weave_mixin=debug`) to see the output.

mod apply;
mod context;
mod error;
mod ext;
mod hotswap;
mod info;
mod options;
mod plugin;
mod transformer;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use apply::Applicator;
pub use context::{Suppressed, TargetClassContext};
pub use error::{MixinError, ReloadError, TransformError};
pub use ext::{check_class, CheckClass, ClassExporter, Extension, Extensions};
pub use hotswap::{HotSwap, HotSwapTransport, OriginalBytecodeStore, ReloadFailure, ReloadReport};
pub use info::{AccessorKind, AccessorSpec, InterfaceSpec, MemberHandler, MixinInfo};
pub use options::{MixinConfig, Options, DEFAULT_PRIORITY};
pub use plugin::{CompanionPlugin, CompatibilityMode, PluginError, PluginHandle};
pub use transformer::{MixinTransformer, Transformed};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=weave_mixin=debug` or `RUST_LOG=weave_mixin=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
