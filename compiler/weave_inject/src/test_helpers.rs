//! Shared test helpers for building target methods and locators.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::rc::Rc;

use weave_ir::annotation::known;
use weave_ir::{
    AccessFlags, Annotation, Constant, Insn, InvokeOp, Label, MethodBuilder, MethodNode, SimpleOp,
    ValueKind,
};

use crate::target::Target;

pub const OWNER: &str = "a/Target";

/// `void run()`:
///
/// ```text
/// 0  L0:
/// 1  LINE 10
/// 2  ALOAD 0
/// 3  INVOKEVIRTUAL a/Target.bar()V
/// 4  LDC 5
/// 5  POP
/// 6  ALOAD 0
/// 7  INVOKEVIRTUAL a/Target.bar()V
/// 8  RETURN
/// ```
pub fn two_bar_calls() -> MethodNode {
    MethodBuilder::new(AccessFlags::PUBLIC, "run", "()V")
        .insn(Insn::Label(Label::new(0)))
        .insn(Insn::Line(10))
        .insn(Insn::load(ValueKind::Ref, 0))
        .insn(bar())
        .insn(Insn::Const(Constant::Int(5)))
        .insn(Insn::Op(SimpleOp::Pop))
        .insn(Insn::load(ValueKind::Ref, 0))
        .insn(bar())
        .ret()
        .build()
}

pub fn bar() -> Insn {
    Insn::invoke(InvokeOp::Virtual, OWNER, "bar", "()V")
}

pub fn target_for(method: &MethodNode) -> Rc<Target> {
    Rc::new(Target::new(OWNER, method).unwrap())
}

/// An `Lweave/At;` annotation with `value` and optional `target`.
pub fn at(selector: &str, target: Option<&str>) -> Annotation {
    let ann = Annotation::new(known::AT).with("value", selector);
    match target {
        Some(t) => ann.with("target", t),
        None => ann,
    }
}
