#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use weave_ir::{AccessFlags, Annotation, ClassBuilder, MethodBuilder};

use super::*;
use crate::options::MixinConfig;
use crate::plugin::{CompanionPlugin, PluginError};
use crate::test_helpers::{
    context_in, context_with, foo_tag, mixin, optional, overwrite_foo, parse,
    registry_with_target, required, target_class, TARGET,
};

#[test]
fn sorts_mixins_by_priority_then_order() {
    let ctx = context_with(vec![
        mixin("m/C", Some(2000)).build(),
        mixin("m/A", Some(1000)).build(),
        mixin("m/B", Some(1000)).build(),
    ]);
    let names: Vec<&str> = ctx.mixins().iter().map(|m| m.name()).collect();
    assert_eq!(names, ["m/A", "m/B", "m/C"]);
}

#[test]
fn second_apply_is_a_usage_error() {
    let mut ctx = context_with(vec![overwrite_foo(mixin("m/M", None), 7).build()]);
    ctx.apply_mixins().unwrap();
    let after_first = ctx.class().clone();

    let err = ctx.apply_mixins().unwrap_err();
    assert!(matches!(err.source, MixinError::AlreadyApplied(ref t) if t == TARGET));
    assert_eq!(ctx.class(), &after_first);
    assert!(ctx.is_applied());
}

#[test]
fn failed_apply_still_counts_as_applied() {
    let broken = mixin("m/Broken", Some(2000))
        .method(AccessFlags::PUBLIC, "missing", "()V", |m| {
            m.annotate(Annotation::new(known::OVERWRITE)).ret()
        })
        .build();
    let mut ctx = context_with(vec![overwrite_foo(mixin("m/A", Some(1000)), 7).build(), broken]);
    let err = ctx.apply_mixins().unwrap_err();
    assert_eq!(err.mixin.as_deref(), Some("m/Broken"));
    assert!(ctx.is_applied());
    let after_first = ctx.class().clone();

    let err = ctx.apply_mixins().unwrap_err();
    assert!(matches!(err.source, MixinError::AlreadyApplied(ref t) if t == TARGET));
    assert_eq!(err.mixin, None);
    assert_eq!(ctx.class(), &after_first);
}

#[test]
fn target_handles_are_cached() {
    let mut ctx = context_with(vec![]);
    let key = MemberKey::new("run", "()V");
    let first = ctx.target_for(&key).unwrap();
    let second = ctx.target_for(&key).unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(ctx.cached_targets(), 1);

    let err = ctx.target_for(&MemberKey::new("missing", "()V")).unwrap_err();
    assert!(matches!(err, MixinError::UnknownTargetMethod { .. }));
}

#[test]
fn restore_rewinds_everything() {
    let mut ctx = context_with(vec![]);
    let checkpoint = ctx.checkpoint();
    ctx.class.methods.clear();
    ctx.pending.insert(MemberKey::new("x", "()V"));
    ctx.handler_counter = 9;
    ctx.restore(checkpoint);

    assert_eq!(ctx.class(), &target_class());
    assert_eq!(ctx.pending().count(), 0);
    assert_eq!(ctx.handler_counter, 0);
}

#[test]
fn optional_failures_are_suppressed_and_rolled_back() {
    // Overwrites a method the target does not have
    let broken = mixin("m/Broken", None)
        .method(AccessFlags::PUBLIC, "extra", "()V", |m| m.ret())
        .method(AccessFlags::PUBLIC, "missing", "()V", |m| {
            m.annotate(Annotation::new(known::OVERWRITE)).ret()
        })
        .build();
    let fine = overwrite_foo(mixin("m/Fine", Some(1500)), 3).build();
    let mut ctx = context_in(&optional(), vec![broken, fine]);

    ctx.apply_mixins().unwrap();
    assert_eq!(ctx.applied_mixins(), ["m/Fine".to_owned()]);
    assert_eq!(ctx.suppressed().len(), 1);
    assert_eq!(ctx.suppressed()[0].mixin, "m/Broken");
    assert!(ctx.suppressed()[0].error.is_definition_error());
    // The merge of `extra` was rolled back with the rest of m/Broken
    assert!(ctx.class().method("extra", "()V").is_none());
    assert_eq!(foo_tag(ctx.class()), 3);
}

/// `@Inject` into `run()V` that must match at least once but never can.
fn unmet_injector() -> weave_ir::MethodNode {
    let at = Annotation::new(known::AT)
        .with("value", "INVOKE")
        .with("target", "a/Target.missing()V");
    MethodBuilder::new(AccessFlags::PRIVATE, "onRun", "()V")
        .annotate(
            Annotation::new(known::INJECT)
                .with("method", "run()V")
                .with("at", at)
                .with("require", 1),
        )
        .ret()
        .build()
}

fn no_handlers(class: &ClassNode) -> bool {
    class.methods.iter().all(|m| !m.name.starts_with("handler$"))
}

#[test]
fn optional_injection_failure_leaves_no_trace() {
    let mut late = overwrite_foo(mixin("m/Late", Some(2000)), 42)
        .method(AccessFlags::PUBLIC, "extra", "()V", |m| m.ret())
        .build();
    late.methods.push(unmet_injector());
    let fine = overwrite_foo(mixin("m/Fine", Some(1000)), 3)
        .method(AccessFlags::PUBLIC, "added", "()V", |m| m.ret())
        .build();
    let mut ctx = context_in(&optional(), vec![late, fine]);

    ctx.apply_mixins().unwrap();
    assert_eq!(ctx.applied_mixins(), ["m/Fine".to_owned()]);
    assert_eq!(ctx.suppressed().len(), 1);
    assert_eq!(ctx.suppressed()[0].mixin, "m/Late");
    assert!(matches!(ctx.suppressed()[0].error, MixinError::InvalidInjection { .. }));

    // m/Late merged before the injector failed; all of it is gone
    assert_eq!(foo_tag(ctx.class()), 3);
    assert!(ctx.class().method("extra", "()V").is_none());
    assert!(no_handlers(ctx.class()));
    assert!(ctx.info().find_method("extra", "()V").is_none());
    assert!(ctx.class().method("added", "()V").is_some());
    assert!(ctx.info().find_method("added", "()V").is_some());
}

#[test]
fn required_injection_failure_aborts() {
    let mut m = mixin("m/M", None).build();
    m.methods.push(unmet_injector());
    let err = context_with(vec![m]).apply_mixins().unwrap_err();
    assert_eq!(err.mixin.as_deref(), Some("m/M"));
    assert!(matches!(err.source, MixinError::InvalidInjection { .. }));
}

/// Rejects the full callbacks and then fails the legacy post-apply one.
struct RejectsAfterApply;

impl CompanionPlugin for RejectsAfterApply {
    fn name(&self) -> &str {
        "rejects-after-apply"
    }

    fn post_apply(
        &self,
        _target: &str,
        _class: &mut ClassNode,
        _mixin: &str,
        _info: &MixinInfo,
    ) -> Result<(), PluginError> {
        Err(PluginError::Incompatible("legacy only".into()))
    }

    fn post_apply_legacy(
        &self,
        _target: &str,
        _class: &ClassNode,
        _mixin: &str,
    ) -> Result<(), PluginError> {
        Err(PluginError::Failed("rejected".into()))
    }
}

#[test]
fn optional_post_apply_failure_leaves_no_trace() {
    let registry = registry_with_target();
    let plugged = Arc::new(
        MixinConfig::new("plugged")
            .optional()
            .with_plugin(Arc::new(RejectsAfterApply)),
    );
    let late = overwrite_foo(mixin("m/Late", Some(2000)), 42)
        .method(AccessFlags::PUBLIC, "extra", "()V", |m| m.ret())
        .build();
    let fine = overwrite_foo(mixin("m/Fine", Some(1000)), 3).build();
    let infos = vec![
        parse(&registry, &plugged, late, 0),
        parse(&registry, &required(), fine, 1),
    ];
    let mut ctx = TargetClassContext::new(target_class(), infos, registry, &Options::default());

    ctx.apply_mixins().unwrap();
    assert_eq!(ctx.applied_mixins(), ["m/Fine".to_owned()]);
    assert_eq!(ctx.suppressed().len(), 1);
    assert_eq!(ctx.suppressed()[0].mixin, "m/Late");
    assert!(matches!(
        ctx.suppressed()[0].error,
        MixinError::CompanionPlugin { .. }
    ));
    assert_eq!(foo_tag(ctx.class()), 3);
    assert!(ctx.class().method("extra", "()V").is_none());
}

#[test]
fn required_failures_abort() {
    let broken = mixin("m/Broken", None)
        .method(AccessFlags::PUBLIC, "missing", "()V", |m| {
            m.annotate(Annotation::new(known::OVERWRITE)).ret()
        })
        .build();
    let mut ctx = context_with(vec![broken]);
    let err = ctx.apply_mixins().unwrap_err();
    assert_eq!(err.mixin.as_deref(), Some("m/Broken"));
    assert_eq!(err.target, TARGET);
}

#[test]
fn records_merged_members_in_class_info() {
    let m = mixin("m/M", None)
        .field(AccessFlags::PRIVATE, "extra", "J")
        .method(AccessFlags::PUBLIC, "added", "()V", |m| m.ret())
        .build();
    let mut ctx = context_with(vec![m]);
    ctx.apply_mixins().unwrap();

    assert!(ctx.info().find_method("added", "()V").is_some());
    assert!(ctx.info().find_field("extra", "J").is_some());
}

#[test]
fn generic_signature_is_written_back() {
    let registry = registry_with_target();
    let target = ClassBuilder::new("a/Generic")
        .signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
        .build();
    let m = ClassBuilder::new("m/M")
        .annotate(Annotation::new(known::MIXIN).with("targets", "a/Generic"))
        .interface("a/Marker")
        .build();
    let info = parse(&registry, &required(), m, 0);
    let mut ctx = TargetClassContext::new(target, vec![info], registry, &Options::default());
    ctx.apply_mixins().unwrap();

    let class = ctx.into_class();
    assert_eq!(class.interfaces, ["a/Marker".to_owned()]);
    assert_eq!(
        class.signature.as_deref(),
        Some("<T:Ljava/lang/Object;>Ljava/lang/Object;La/Marker;")
    );
}

#[test]
fn debug_export_request_forces_export() {
    let m = mixin("m/M", None)
        .annotate(Annotation::new(known::DEBUG).with("export", true))
        .build();
    let mut ctx = context_with(vec![m]);
    assert!(!ctx.force_export());
    ctx.apply_mixins().unwrap();
    assert!(ctx.force_export());
}
