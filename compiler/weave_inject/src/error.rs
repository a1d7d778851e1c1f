use thiserror::Error;

/// Errors raised while parsing or applying injectors.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InjectionError {
    /// The injector declaration or its handler is malformed, or the injector
    /// could not be applied as declared.
    #[error("invalid injection: {0}")]
    InvalidInjection(String),
    /// A slice could not be resolved, or resolved to an inverted range.
    #[error("invalid slice `{id}`: {reason}")]
    InvalidSlice { id: String, reason: String },
    /// The target method is owned by a mixin of strictly higher priority.
    #[error(
        "{method} is merged by {merged_by} (priority {merged_priority}); \
         {mixin} (priority {priority}) cannot rewrite it"
    )]
    Conflict {
        method: String,
        merged_by: String,
        merged_priority: i32,
        mixin: String,
        priority: i32,
    },
    /// A slice was requested from a disposed injector target.
    #[error("injector target for {0} was already disposed")]
    Disposed(String),
}

impl InjectionError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        InjectionError::InvalidInjection(msg.into())
    }

    pub(crate) fn slice(id: &str, reason: impl Into<String>) -> Self {
        InjectionError::InvalidSlice {
            id: id.to_owned(),
            reason: reason.into(),
        }
    }
}
