//! Injection points, method slices and injectors.
//!
//! This crate turns declarative locators into concrete instruction positions
//! and rewrites target method bodies at those positions.
//!
//! # Architecture
//!
//! - **[`InjectionPoint`]**: a parsed `Lweave/At;` locator with selector, match
//!   arguments, ordinal and optional slice id.
//! - **[`MethodSlice`] / [`SliceView`]**: a declared `from`/`to` sub-range
//!   and its resolved, read-only view over a method body.
//! - **[`Target`]**: handle for one method of one target class.
//! - **[`InjectorTarget`]**: a `Target` coupled to one injector's slices,
//!   with the slice cache and merged-by marker.
//! - **[`InjectorSpec`]**: a parsed injector handler (`Lweave/Inject;`,
//!   `Lweave/Redirect;`, `Lweave/ModifyConstant;`) and its code generation.
//!
//! # Lifecycle
//!
//! Slice views record the instruction-list generation they were resolved at.
//! An `InjectorTarget` re-resolves a cached view once the generation moves
//! and drops every cached view when disposed.

mod error;
mod injector;
mod injector_target;
mod point;
mod slice;
mod target;

pub use error::InjectionError;
pub use injector::{HandlerRef, InjectorKind, InjectorSpec, MergeSite, TargetSelector};
pub use injector_target::InjectorTarget;
pub use point::{InjectionPoint, MemberRef, Selector};
pub use slice::{MethodSlice, SliceView, Slices};
pub use target::Target;

#[cfg(test)]
mod test_helpers;
