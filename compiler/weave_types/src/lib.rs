//! Type metadata registry for the weave mixin engine.
//!
//! Every class the engine encounters is described once into a [`ClassInfo`]:
//! its name, supertypes and member signatures. Descriptors are memoized in a
//! sharded [`ClassRegistry`] and shared as `Arc<ClassInfo>`.
//!
//! # Hierarchy Widening
//!
//! Mixins widen the apparent hierarchy of their targets. When mixin `M`
//! extends `Base` and targets `T`, then `T` is treated as assignable to `Base`
//! even though `T`'s own bytes never mention it. [`ClassRegistry::register_mixin`]
//! records the mixin → target edges that hierarchy walks consult.
//!
//! # Failure Mode
//!
//! Absence of information is never a positive match. Classes that cannot be
//! fetched or decoded resolve to `None` and contribute nothing to hierarchy
//! queries.

mod info;
mod provider;
mod registry;

pub use info::{ClassInfo, MemberInfo};
pub use provider::{ClassProvider, InMemoryProvider};
pub use registry::ClassRegistry;
