//! Binary class tree model for the weave mixin engine.
//!
//! This crate provides:
//!
//! - **Class tree** ([`ClassNode`], [`MethodNode`], [`FieldNode`]): the
//!   mutable, tree-form representation of one class that the engine merges
//!   mixins into. Trees are mutated in place by every merge phase.
//!
//! - **Instructions** ([`Insn`], [`InsnList`]): an opaque, ordered
//!   instruction stream. The list carries a generation counter so read-only
//!   views taken earlier can detect that the stream has moved on.
//!
//! - **Metadata** ([`Annotation`], [`MemberKey`], [`TypeDesc`],
//!   [`MethodDesc`], [`ClassSignature`]): the declarative side: mixin
//!   declarations and merged-by markers are annotations, member identity is
//!   name + descriptor.
//!
//! - **Codec** ([`ClassNode::to_bytes`], [`ClassNode::from_bytes`]): the
//!   binary form exchanged with the loading environment. Encoding is
//!   deterministic: equal trees always produce equal bytes.
//!
//! # Crate Dependencies
//!
//! `weave_ir` is the leaf of the workspace. Every other crate depends on it;
//! it depends on nothing internal.

mod access;
pub mod annotation;
pub mod builder;
pub mod codec;
pub mod desc;
pub mod insn;
mod node;
pub mod signature;
pub mod textify;

pub use access::AccessFlags;
pub use annotation::{Annotation, AnnotationValue};
pub use builder::{ClassBuilder, FieldBuilder, MethodBuilder};
pub use codec::CodecError;
pub use desc::{DescError, MethodDesc, TypeDesc, ValueKind};
pub use insn::{Constant, FieldOp, Insn, InsnList, InvokeOp, JumpOp, Label, SimpleOp, VarOp};
pub use node::{ClassNode, FieldNode, MemberKey, MethodNode};
pub use signature::ClassSignature;

/// Internal name of the root class every hierarchy walk ends at.
pub const OBJECT: &str = "java/lang/Object";

/// Name of instance initializers.
pub const CTOR: &str = "<init>";

/// Name of static initializers.
pub const CLINIT: &str = "<clinit>";

/// Normalize a class reference to its internal (slash-qualified) form.
///
/// Accepts `a.b.C`, `a/b/C` and descriptor form `La/b/C;`.
pub fn internal_name(name: &str) -> String {
    let trimmed = name
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .filter(|inner| inner.contains('/') || !name.contains('.'))
        .unwrap_or(name);
    trimmed.replace('.', "/")
}

/// Convert an internal name to its dotted (binary) form.
pub fn dotted_name(name: &str) -> String {
    name.replace('/', ".")
}
