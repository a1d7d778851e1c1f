//! Error taxonomy for mixin application and reload.

use std::fmt;

use thiserror::Error;
use weave_inject::InjectionError;
use weave_ir::CodecError;

/// A failure while applying mixins to one target class.
#[derive(Debug, Error)]
pub enum MixinError {
    // ── Invalid definitions ─────────────────────────────────────────
    #[error("invalid mixin {mixin}: {reason}")]
    InvalidMixin { mixin: String, reason: String },

    #[error("invalid injection in {mixin}: {reason}")]
    InvalidInjection { mixin: String, reason: String },

    #[error("invalid slice `{id}` in {mixin}: {reason}")]
    InvalidSlice {
        mixin: String,
        id: String,
        reason: String,
    },

    #[error("invalid interface mixin {mixin}: {reason}")]
    InvalidInterfaceMixin { mixin: String, reason: String },

    #[error("invalid accessor {accessor} in {mixin}: {reason}")]
    InvalidAccessor {
        mixin: String,
        accessor: String,
        reason: String,
    },

    // ── Merge conflicts ─────────────────────────────────────────────
    #[error(
        "{target}::{member} is owned by {existing} (priority {existing_priority}) \
         and cannot be claimed by {incoming} (priority {incoming_priority})"
    )]
    Conflict {
        target: String,
        member: String,
        existing: String,
        existing_priority: i32,
        incoming: String,
        incoming_priority: i32,
    },

    // ── Usage and state ─────────────────────────────────────────────
    #[error("mixins were already applied to {0}")]
    AlreadyApplied(String),

    #[error("{target} has no method {member}")]
    UnknownTargetMethod { target: String, member: String },

    // ── Collaborators ───────────────────────────────────────────────
    #[error("companion plugin {plugin} failed: {message}")]
    CompanionPlugin { plugin: String, message: String },

    #[error("{class} failed validation: {reason}")]
    ValidationFailed { class: String, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl MixinError {
    /// Whether this is a structural problem with a mixin's definition, as
    /// opposed to a conflict, a usage error or a collaborator failure.
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            MixinError::InvalidMixin { .. }
                | MixinError::InvalidInjection { .. }
                | MixinError::InvalidSlice { .. }
                | MixinError::InvalidInterfaceMixin { .. }
                | MixinError::InvalidAccessor { .. }
        )
    }

    pub(crate) fn invalid(mixin: &str, reason: impl Into<String>) -> Self {
        MixinError::InvalidMixin {
            mixin: mixin.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn interface(mixin: &str, reason: impl Into<String>) -> Self {
        MixinError::InvalidInterfaceMixin {
            mixin: mixin.to_owned(),
            reason: reason.into(),
        }
    }

    /// Attribute an injector failure to `mixin` applying to `target`.
    pub(crate) fn from_injection(mixin: &str, target: &str, err: InjectionError) -> Self {
        match err {
            InjectionError::InvalidInjection(reason) => MixinError::InvalidInjection {
                mixin: mixin.to_owned(),
                reason,
            },
            InjectionError::InvalidSlice { id, reason } => MixinError::InvalidSlice {
                mixin: mixin.to_owned(),
                id,
                reason,
            },
            InjectionError::Conflict {
                method,
                merged_by,
                merged_priority,
                mixin: incoming,
                priority,
            } => MixinError::Conflict {
                target: target.to_owned(),
                member: method
                    .rsplit_once("::")
                    .map_or(method.clone(), |(_, m)| m.to_owned()),
                existing: merged_by,
                existing_priority: merged_priority,
                incoming,
                incoming_priority: priority,
            },
            err @ InjectionError::Disposed(_) => MixinError::InvalidInjection {
                mixin: mixin.to_owned(),
                reason: err.to_string(),
            },
        }
    }
}

/// A fatal failure transforming one target class.
#[derive(Debug)]
pub struct TransformError {
    pub target: String,
    /// The mixin being applied when the failure happened, if any.
    pub mixin: Option<String>,
    pub source: MixinError,
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.mixin {
            Some(mixin) => write!(
                f,
                "failed to apply {mixin} to {}: {}",
                self.target, self.source
            ),
            None => write!(f, "failed to transform {}: {}", self.target, self.source),
        }
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl TransformError {
    pub fn new(target: &str, mixin: Option<&str>, source: MixinError) -> Self {
        TransformError {
            target: target.to_owned(),
            mixin: mixin.map(str::to_owned),
            source,
        }
    }
}

/// A failure reloading a mixin definition.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("no mixin named {0} is registered")]
    UnknownMixin(String),

    #[error(
        "targets of {mixin} changed from {old:?} to {new:?}; a restart is needed for this \
         change to take effect"
    )]
    TargetsChanged {
        mixin: String,
        old: Vec<String>,
        new: Vec<String>,
    },

    #[error("target {target} of {mixin} cannot be resolved")]
    UnresolvableTarget { mixin: String, target: String },

    #[error("new definition of {mixin} could not be decoded: {source}")]
    InvalidBytes {
        mixin: String,
        #[source]
        source: CodecError,
    },

    #[error("new definition is invalid: {0}")]
    Invalid(#[from] MixinError),
}
