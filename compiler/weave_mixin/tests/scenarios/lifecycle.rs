//! Usage errors, slices and re-entrant class loads.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use weave_ir::annotation::known;
use weave_ir::{AccessFlags, Annotation, ClassNode, MethodBuilder};
use weave_mixin::{
    CompanionPlugin, MixinConfig, MixinError, MixinInfo, MixinTransformer, Options, PluginError,
    TargetClassContext, Transformed,
};

use crate::common::{
    calls, config, mixin, modified, overwrite_foo, registry, target_bytes, target_named,
    transformer, TARGET,
};

fn at(selector: &str, target: Option<&str>) -> Annotation {
    let ann = Annotation::new(known::AT).with("value", selector);
    match target {
        Some(t) => ann.with("target", t),
        None => ann,
    }
}

#[test]
fn contexts_apply_once() {
    let registry = registry(&[TARGET]);
    let info = Arc::new(
        MixinInfo::parse(
            overwrite_foo(mixin("m/M", None), 3).build(),
            config(),
            0,
            &registry,
        )
        .unwrap(),
    );
    let mut ctx =
        TargetClassContext::new(target_named(TARGET), vec![info], registry, &Options::default());
    ctx.apply_mixins().unwrap();
    let once = ctx.class().clone();

    let err = ctx.apply_mixins().unwrap_err();
    assert!(matches!(err.source, MixinError::AlreadyApplied(_)));
    assert_eq!(ctx.class(), &once);
}

#[test]
fn inverted_slice_is_an_invalid_slice() {
    let slice = Annotation::new(known::SLICE)
        .with("id", "body")
        .with(
            "from",
            at("CONSTANT", None).with("args", vec!["intValue=5"]),
        )
        .with("to", at("INVOKE", Some("a/Target.bar()V")).with("ordinal", 0));
    let handler = MethodBuilder::new(AccessFlags::PRIVATE, "onBar", "()V")
        .annotate(
            Annotation::new(known::INJECT)
                .with("method", "run()V")
                .with("slice", vec![slice])
                .with(
                    "at",
                    at("INVOKE", Some("a/Target.bar()V")).with("slice", "body"),
                ),
        )
        .ret()
        .build();
    let mut m = mixin("m/M", None).build();
    m.methods.push(handler);

    let t = transformer(Options::default());
    t.add_mixin(&config(), m).unwrap();
    let err = t.transform(TARGET, &target_bytes(TARGET)).unwrap_err();
    match err.source {
        MixinError::InvalidSlice { mixin, id, .. } => {
            assert_eq!(mixin, "m/M");
            assert_eq!(id, "body");
        }
        other => panic!("expected invalid slice, got {other:?}"),
    }
}

#[test]
fn injection_hits_every_target_method() {
    let handler = MethodBuilder::new(AccessFlags::PRIVATE, "onEnter", "()V")
        .annotate(
            Annotation::new(known::INJECT)
                .with("method", vec!["foo()V", "run()V"])
                .with("at", at("HEAD", None)),
        )
        .ret()
        .build();
    let mut m = mixin("m/M", None).build();
    m.methods.push(handler);

    let t = transformer(Options::default());
    t.add_mixin(&config(), m).unwrap();
    let class = modified(t.transform(TARGET, &target_bytes(TARGET)).unwrap());
    assert_eq!(calls(&class, "foo"), ["handler$0$onEnter"]);
    assert_eq!(calls(&class, "run"), ["handler$0$onEnter", "bar", "bar"]);
}

// ── Re-entrance ─────────────────────────────────────────────────────

/// Loads another class from inside a transformation, like a host whose
/// plugin resolves a type mid-load.
struct NestedLoad {
    transformer: OnceLock<Weak<MixinTransformer>>,
    seen: Mutex<Vec<Transformed>>,
}

impl CompanionPlugin for NestedLoad {
    fn name(&self) -> &str {
        "nested-load"
    }

    fn pre_apply(
        &self,
        _target: &str,
        _class: &mut ClassNode,
        _mixin: &str,
        _info: &MixinInfo,
    ) -> Result<(), PluginError> {
        let Some(transformer) = self.transformer.get().and_then(Weak::upgrade) else {
            return Err(PluginError::Failed("transformer is gone".into()));
        };
        let nested = transformer
            .transform(TARGET, &target_bytes(TARGET))
            .map_err(|e| PluginError::Failed(e.to_string()))?;
        self.seen.lock().push(nested);
        Ok(())
    }
}

#[test]
fn reentrant_transform_is_deferred() {
    let plugin = Arc::new(NestedLoad {
        transformer: OnceLock::new(),
        seen: Mutex::new(Vec::new()),
    });
    let t = Arc::new(transformer(Options::default()));
    plugin.transformer.set(Arc::downgrade(&t)).unwrap();

    let config = Arc::new(
        MixinConfig::new("nested").with_plugin(Arc::clone(&plugin) as Arc<dyn CompanionPlugin>),
    );
    t.add_mixin(&config, overwrite_foo(mixin("m/M", None), 4).build())
        .unwrap();

    let class = modified(t.transform(TARGET, &target_bytes(TARGET)).unwrap());
    assert_eq!(crate::common::foo_tag(&class), 4);
    assert_eq!(*plugin.seen.lock(), [Transformed::Deferred]);
}
