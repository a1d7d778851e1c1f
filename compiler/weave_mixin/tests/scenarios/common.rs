//! Fixtures shared by the scenario tests.

use std::sync::Arc;

use weave_ir::annotation::known;
use weave_ir::{
    AccessFlags, Annotation, ClassBuilder, ClassNode, Constant, Insn, InvokeOp, SimpleOp,
    ValueKind,
};
use weave_mixin::{MixinConfig, MixinTransformer, Options, Transformed};
use weave_types::ClassRegistry;

pub const TARGET: &str = "a/Target";

/// Class `name` with field `count:I`, `foo()V`, `bar()V` and `run()V`,
/// where `run` calls `bar` twice around `LDC 5`.
pub fn target_named(name: &str) -> ClassNode {
    let bar = Insn::invoke(InvokeOp::Virtual, name, "bar", "()V");
    ClassBuilder::new(name)
        .field(AccessFlags::PRIVATE, "count", "I")
        .method(AccessFlags::PUBLIC, "foo", "()V", |m| {
            m.insn(Insn::Const(Constant::Int(0)))
                .insn(Insn::Op(SimpleOp::Pop))
                .ret()
        })
        .method(AccessFlags::PUBLIC, "bar", "()V", |m| m.ret())
        .method(AccessFlags::PUBLIC, "run", "()V", |m| {
            m.insn(Insn::load(ValueKind::Ref, 0))
                .insn(bar.clone())
                .insn(Insn::Const(Constant::Int(5)))
                .insn(Insn::Op(SimpleOp::Pop))
                .insn(Insn::load(ValueKind::Ref, 0))
                .insn(bar)
                .ret()
        })
        .build()
}

pub fn target_bytes(name: &str) -> Vec<u8> {
    target_named(name).to_bytes().unwrap()
}

/// A mixin targeting every class in `targets`.
pub fn mixin_for(name: &str, targets: &[&str], priority: Option<i32>) -> ClassBuilder {
    let mut ann = Annotation::new(known::MIXIN).with("targets", targets.to_vec());
    if let Some(p) = priority {
        ann = ann.with("priority", p);
    }
    ClassBuilder::new(name).annotate(ann)
}

pub fn mixin(name: &str, priority: Option<i32>) -> ClassBuilder {
    mixin_for(name, &[TARGET], priority)
}

/// Add `@Overwrite foo()V` pushing `tag`.
pub fn overwrite_foo(builder: ClassBuilder, tag: i32) -> ClassBuilder {
    builder.method(AccessFlags::PUBLIC, "foo", "()V", |m| {
        m.annotate(Annotation::new(known::OVERWRITE))
            .insn(Insn::Const(Constant::Int(tag)))
            .insn(Insn::Op(SimpleOp::Pop))
            .ret()
    })
}

pub fn foo_tag(class: &ClassNode) -> i32 {
    match class.method("foo", "()V").and_then(|m| m.insns.get(0)) {
        Some(Insn::Const(Constant::Int(tag))) => *tag,
        other => panic!("unexpected body of foo: {other:?}"),
    }
}

/// A registry that already knows every class in `targets`.
pub fn registry(targets: &[&str]) -> Arc<ClassRegistry> {
    weave_mixin::init_tracing();
    let registry = Arc::new(ClassRegistry::new());
    for name in targets {
        registry.describe(&target_named(name));
    }
    registry
}

pub fn transformer(options: Options) -> MixinTransformer {
    MixinTransformer::new(registry(&[TARGET]), options)
}

pub fn config() -> Arc<MixinConfig> {
    Arc::new(MixinConfig::new("scenarios"))
}

pub fn modified(result: Transformed) -> ClassNode {
    match result {
        Transformed::Modified(bytes) => ClassNode::from_bytes(&bytes).unwrap(),
        other => panic!("expected a modified class, got {other:?}"),
    }
}

/// Names of the methods `method` invokes, in order.
pub fn calls(class: &ClassNode, method: &str) -> Vec<String> {
    class
        .method(method, "()V")
        .unwrap()
        .insns
        .iter()
        .filter_map(|insn| match insn {
            Insn::Invoke { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect()
}
