//! Fluent builders for class trees.
//!
//! Used by hosts to hand classes to the engine, by tests, and by the engine
//! itself when it synthesizes accessor and invoker bodies.
//!
//! ```text
//! ClassBuilder::new("a/Target")
//!     .method(AccessFlags::PUBLIC, "foo", "()V", |m| m.insn(...).ret())
//!     .build()
//! ```

use crate::access::AccessFlags;
use crate::annotation::Annotation;
use crate::desc::{MethodDesc, ValueKind};
use crate::insn::{Insn, InsnList, VarOp};
use crate::node::{ClassNode, FieldNode, MethodNode};

/// Shorthand for [`Annotation::new`].
pub fn annotation(desc: &str) -> Annotation {
    Annotation::new(desc)
}

// ── Classes ─────────────────────────────────────────────────────────

#[must_use]
pub struct ClassBuilder {
    node: ClassNode,
}

impl ClassBuilder {
    /// A public class extending `java/lang/Object`.
    pub fn new(name: &str) -> Self {
        ClassBuilder {
            node: ClassNode::new(AccessFlags::PUBLIC | AccessFlags::SUPER, name),
        }
    }

    /// A public interface.
    pub fn new_interface(name: &str) -> Self {
        ClassBuilder {
            node: ClassNode::new(
                AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
                name,
            ),
        }
    }

    pub fn access(mut self, access: AccessFlags) -> Self {
        self.node.access = access;
        self
    }

    pub fn super_name(mut self, name: &str) -> Self {
        self.node.super_name = Some(name.to_owned());
        self
    }

    pub fn interface(mut self, name: &str) -> Self {
        self.node.add_interface(name);
        self
    }

    pub fn signature(mut self, sig: &str) -> Self {
        self.node.signature = Some(sig.to_owned());
        self
    }

    pub fn source_file(mut self, file: &str) -> Self {
        self.node.source_file = Some(file.to_owned());
        self
    }

    pub fn annotate(mut self, ann: Annotation) -> Self {
        self.node.annotations.push(ann);
        self
    }

    /// Add a plain field.
    pub fn field(self, access: AccessFlags, name: &str, desc: &str) -> Self {
        self.field_with(FieldBuilder::new(access, name, desc))
    }

    pub fn field_with(mut self, field: FieldBuilder) -> Self {
        self.node.fields.push(field.build());
        self
    }

    /// Add a method whose body is filled in by `body`.
    pub fn method(
        mut self,
        access: AccessFlags,
        name: &str,
        desc: &str,
        body: impl FnOnce(MethodBuilder) -> MethodBuilder,
    ) -> Self {
        self.node
            .methods
            .push(body(MethodBuilder::new(access, name, desc)).build());
        self
    }

    pub fn build(self) -> ClassNode {
        self.node
    }
}

// ── Fields ──────────────────────────────────────────────────────────

#[must_use]
pub struct FieldBuilder {
    node: FieldNode,
}

impl FieldBuilder {
    pub fn new(access: AccessFlags, name: &str, desc: &str) -> Self {
        FieldBuilder {
            node: FieldNode::new(access, name, desc),
        }
    }

    pub fn signature(mut self, sig: &str) -> Self {
        self.node.signature = Some(sig.to_owned());
        self
    }

    pub fn annotate(mut self, ann: Annotation) -> Self {
        self.node.annotations.push(ann);
        self
    }

    pub fn build(self) -> FieldNode {
        self.node
    }
}

// ── Methods ─────────────────────────────────────────────────────────

/// Builds a [`MethodNode`], computing `max_locals` from the descriptor, the
/// receiver and every local slot the body touches.
#[must_use]
pub struct MethodBuilder {
    node: MethodNode,
    insns: Vec<Insn>,
    max_stack: Option<u16>,
}

impl MethodBuilder {
    pub fn new(access: AccessFlags, name: &str, desc: &str) -> Self {
        MethodBuilder {
            node: MethodNode::new(access, name, desc),
            insns: Vec::new(),
            max_stack: None,
        }
    }

    pub fn signature(mut self, sig: &str) -> Self {
        self.node.signature = Some(sig.to_owned());
        self
    }

    pub fn annotate(mut self, ann: Annotation) -> Self {
        self.node.annotations.push(ann);
        self
    }

    pub fn insn(mut self, insn: Insn) -> Self {
        self.insns.push(insn);
        self
    }

    pub fn insns(mut self, insns: impl IntoIterator<Item = Insn>) -> Self {
        self.insns.extend(insns);
        self
    }

    /// Append the return instruction matching the descriptor's return type.
    pub fn ret(self) -> Self {
        let kind = MethodDesc::parse(&self.node.desc).map_or(ValueKind::Void, |d| d.ret.kind());
        self.insn(Insn::Return { kind })
    }

    pub fn max_stack(mut self, max_stack: u16) -> Self {
        self.max_stack = Some(max_stack);
        self
    }

    pub fn build(mut self) -> MethodNode {
        let receiver = u16::from(!self.node.is_static());
        let arg_slots = MethodDesc::parse(&self.node.desc).map_or(0, |d| d.arg_slots());
        let touched = self
            .insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Var { kind, slot, .. } => Some(slot + kind.slots()),
                _ => None,
            })
            .max()
            .unwrap_or(0);

        self.node.max_locals = touched.max(receiver + arg_slots);
        self.node.max_stack = self.max_stack.unwrap_or(receiver + arg_slots + 2);
        self.node.insns = InsnList::from(self.insns);
        self.node
    }
}

/// Load every argument of `desc` in order, starting at `first_slot`.
///
/// Helper for synthesized bodies that forward their arguments.
pub fn load_args(desc: &MethodDesc, first_slot: u16) -> Vec<Insn> {
    let mut slot = first_slot;
    desc.args
        .iter()
        .map(|arg| {
            let kind = arg.kind();
            let insn = Insn::Var {
                op: VarOp::Load,
                kind,
                slot,
            };
            slot += kind.slots();
            insn
        })
        .collect()
}
