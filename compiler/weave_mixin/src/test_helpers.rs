//! Shared factories for target classes, mixins and contexts.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use weave_ir::annotation::known;
use weave_ir::{
    AccessFlags, Annotation, ClassBuilder, ClassNode, Constant, Insn, InvokeOp, Label, SimpleOp,
    ValueKind,
};
use weave_types::ClassRegistry;

use crate::context::TargetClassContext;
use crate::info::MixinInfo;
use crate::options::{MixinConfig, Options};

pub const TARGET: &str = "a/Target";

/// `a/Target` with field `count:I`, `foo()V`, `bar()V` and `run()V`, where
/// `run` calls `bar` twice around `LDC 5`.
pub fn target_class() -> ClassNode {
    ClassBuilder::new(TARGET)
        .field(AccessFlags::PRIVATE, "count", "I")
        .method(AccessFlags::PUBLIC, "foo", "()V", |m| {
            m.insn(Insn::Const(Constant::Int(0)))
                .insn(Insn::Op(SimpleOp::Pop))
                .ret()
        })
        .method(AccessFlags::PUBLIC, "bar", "()V", |m| m.ret())
        .method(AccessFlags::PUBLIC, "run", "()V", |m| {
            m.insn(Insn::Label(Label::new(0)))
                .insn(Insn::load(ValueKind::Ref, 0))
                .insn(bar_call())
                .insn(Insn::Const(Constant::Int(5)))
                .insn(Insn::Op(SimpleOp::Pop))
                .insn(Insn::load(ValueKind::Ref, 0))
                .insn(bar_call())
                .ret()
        })
        .build()
}

pub fn bar_call() -> Insn {
    Insn::invoke(InvokeOp::Virtual, TARGET, "bar", "()V")
}

/// A mixin class builder targeting [`TARGET`].
pub fn mixin(name: &str, priority: Option<i32>) -> ClassBuilder {
    let mut ann = Annotation::new(known::MIXIN).with("targets", TARGET);
    if let Some(p) = priority {
        ann = ann.with("priority", p);
    }
    ClassBuilder::new(name).annotate(ann)
}

/// Add `@Overwrite foo()V` pushing `tag` so the winner is identifiable.
pub fn overwrite_foo(builder: ClassBuilder, tag: i32) -> ClassBuilder {
    builder.method(AccessFlags::PUBLIC, "foo", "()V", |m| {
        m.annotate(Annotation::new(known::OVERWRITE))
            .insn(Insn::Const(Constant::Int(tag)))
            .insn(Insn::Op(SimpleOp::Pop))
            .ret()
    })
}

/// The tag pushed by the body of `foo()V`.
pub fn foo_tag(class: &ClassNode) -> i32 {
    let foo = class.method("foo", "()V").unwrap();
    match foo.insns.get(0) {
        Some(Insn::Const(Constant::Int(tag))) => *tag,
        other => panic!("unexpected first instruction {other:?}"),
    }
}

pub fn registry_with_target() -> Arc<ClassRegistry> {
    let registry = Arc::new(ClassRegistry::new());
    registry.describe(&target_class());
    registry
}

pub fn required() -> Arc<MixinConfig> {
    Arc::new(MixinConfig::new("test"))
}

pub fn optional() -> Arc<MixinConfig> {
    Arc::new(MixinConfig::new("test-optional").optional())
}

pub fn parse(
    registry: &ClassRegistry,
    config: &Arc<MixinConfig>,
    class: ClassNode,
    order: u32,
) -> Arc<MixinInfo> {
    Arc::new(MixinInfo::parse(class, Arc::clone(config), order, registry).unwrap())
}

/// A context for [`target_class`] with `mixins` parsed in order.
pub fn context_with(mixins: Vec<ClassNode>) -> TargetClassContext {
    context_in(&required(), mixins)
}

pub fn context_in(config: &Arc<MixinConfig>, mixins: Vec<ClassNode>) -> TargetClassContext {
    let registry = registry_with_target();
    let infos = mixins
        .into_iter()
        .zip(0u32..)
        .map(|(class, order)| parse(&registry, config, class, order))
        .collect();
    TargetClassContext::new(target_class(), infos, registry, &Options::default())
}
