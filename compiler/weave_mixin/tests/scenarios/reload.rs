//! Hot swap of mixin definitions.

use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use weave_ir::ClassNode;
use weave_mixin::{
    HotSwap, HotSwapTransport, MixinTransformer, Options, ReloadError, ReloadFailure,
};

use crate::common::{config, foo_tag, mixin, mixin_for, overwrite_foo, registry, target_bytes};

const FIRST: &str = "a/First";
const SECOND: &str = "a/Second";
const UNRELATED: &str = "a/Unrelated";

/// Records every redefinition; rejects the classes in `reject`.
#[derive(Default)]
struct Recorder {
    redefined: Mutex<Vec<(String, Vec<u8>)>>,
    reject: Vec<String>,
}

impl HotSwapTransport for Recorder {
    fn redefine(&self, name: &str, bytes: &[u8]) -> Result<(), String> {
        if self.reject.iter().any(|r| r == name) {
            return Err(format!("{name} is locked"));
        }
        self.redefined.lock().push((name.to_owned(), bytes.to_vec()));
        Ok(())
    }
}

fn setup() -> Arc<MixinTransformer> {
    let t = Arc::new(MixinTransformer::new(
        registry(&[FIRST, SECOND, UNRELATED]),
        Options::default().with_hot_swap(true),
    ));
    t.add_mixin(
        &config(),
        overwrite_foo(mixin_for("m/M", &[FIRST, SECOND], None), 1).build(),
    )
    .unwrap();
    t.add_mixin(
        &config(),
        overwrite_foo(mixin_for("m/Other", &[UNRELATED], None), 7).build(),
    )
    .unwrap();
    for name in [FIRST, SECOND, UNRELATED] {
        t.transform(name, &target_bytes(name)).unwrap();
    }
    t
}

fn new_definition(tag: i32) -> Vec<u8> {
    overwrite_foo(mixin_for("m/M", &[FIRST, SECOND], None), tag)
        .build()
        .to_bytes()
        .unwrap()
}

#[test]
fn redefines_every_transformed_target() {
    let t = setup();
    let recorder = Arc::new(Recorder::default());
    let swap = HotSwap::new(Arc::clone(&t), Arc::clone(&recorder) as Arc<dyn HotSwapTransport>);

    let report = swap.redefine_mixin("m/M", &new_definition(2)).unwrap();
    assert!(report.is_success());
    assert_eq!(report.redefined, [FIRST.to_owned(), SECOND.to_owned()]);

    let redefined = recorder.redefined.lock();
    for (name, bytes) in redefined.iter() {
        let class = ClassNode::from_bytes(bytes).unwrap();
        assert_eq!(&class.name, name);
        assert_eq!(foo_tag(&class), 2);
    }
}

#[test]
fn missing_original_fails_only_that_target() {
    let t = setup();
    assert!(t.originals().unwrap().remove(SECOND));
    let recorder = Arc::new(Recorder::default());
    let swap = HotSwap::new(Arc::clone(&t), Arc::clone(&recorder) as Arc<dyn HotSwapTransport>);

    let report = swap.redefine_mixin("m/M", &new_definition(2)).unwrap();
    assert_eq!(report.redefined, [FIRST.to_owned()]);
    assert_eq!(report.failed_targets(), [SECOND]);
    assert!(matches!(report.failed[0].1, ReloadFailure::MissingOriginal));

    let names: Vec<String> = recorder
        .redefined
        .lock()
        .iter()
        .map(|(n, _)| n.clone())
        .collect();
    assert_eq!(names, [FIRST.to_owned()]);
}

#[test]
fn transport_rejections_are_reported_per_target() {
    let t = setup();
    let recorder = Arc::new(Recorder {
        reject: vec![FIRST.to_owned()],
        ..Recorder::default()
    });
    let swap = HotSwap::new(t, Arc::clone(&recorder) as Arc<dyn HotSwapTransport>);

    let report = swap.redefine_mixin("m/M", &new_definition(2)).unwrap();
    assert_eq!(report.redefined, [SECOND.to_owned()]);
    assert!(matches!(
        &report.failed[0],
        (name, ReloadFailure::Transport(msg)) if name == FIRST && msg.contains("locked")
    ));
}

#[test]
fn broken_definition_fails_each_target_without_transport() {
    let t = setup();
    let recorder = Arc::new(Recorder::default());
    let swap = HotSwap::new(t, Arc::clone(&recorder) as Arc<dyn HotSwapTransport>);

    // Overwrites a method no target declares
    let broken = mixin_for("m/M", &[FIRST, SECOND], None)
        .method(weave_ir::AccessFlags::PUBLIC, "missing", "()V", |m| {
            m.annotate(weave_ir::Annotation::new(weave_ir::annotation::known::OVERWRITE))
                .ret()
        })
        .build()
        .to_bytes()
        .unwrap();
    let report = swap.redefine_mixin("m/M", &broken).unwrap();
    assert_eq!(report.failed_targets(), [FIRST, SECOND]);
    assert!(report
        .failed
        .iter()
        .all(|(_, f)| matches!(f, ReloadFailure::Transform(_))));
    assert!(recorder.redefined.lock().is_empty());
}

#[test]
fn rejected_reload_changes_nothing() {
    let t = setup();
    let recorder = Arc::new(Recorder::default());
    let swap = HotSwap::new(Arc::clone(&t), Arc::clone(&recorder) as Arc<dyn HotSwapTransport>);

    let retargeted = overwrite_foo(mixin("m/M", None), 2).build().to_bytes().unwrap();
    assert!(matches!(
        swap.redefine_mixin("m/M", &retargeted),
        Err(ReloadError::TargetsChanged { .. })
    ));
    assert!(matches!(
        swap.redefine_mixin("m/Nope", &retargeted),
        Err(ReloadError::UnknownMixin(_))
    ));
    assert!(recorder.redefined.lock().is_empty());
    assert_eq!(t.mixin("m/M").unwrap().targets(), [FIRST.to_owned(), SECOND.to_owned()]);
}
