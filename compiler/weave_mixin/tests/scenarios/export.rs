//! Debug export of transformed classes.

use pretty_assertions::assert_eq;
use weave_ir::annotation::known;
use weave_ir::{Annotation, ClassNode};
use weave_mixin::Options;

use crate::common::{config, foo_tag, mixin, overwrite_foo, target_bytes, transformer, TARGET};

fn exported(dir: &std::path::Path) -> std::path::PathBuf {
    dir.join("class").join(format!("{TARGET}.class"))
}

#[test]
fn exports_transformed_classes_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let t = transformer(
        Options::default()
            .with_debug_export(true)
            .with_export_dir(dir.path()),
    );
    t.add_mixin(&config(), overwrite_foo(mixin("m/M", None), 8).build())
        .unwrap();
    t.transform(TARGET, &target_bytes(TARGET)).unwrap();

    let bytes = std::fs::read(exported(dir.path())).unwrap();
    assert_eq!(foo_tag(&ClassNode::from_bytes(&bytes).unwrap()), 8);
}

#[test]
fn filter_limits_exports() {
    let dir = tempfile::tempdir().unwrap();
    let t = transformer(
        Options::default()
            .with_debug_export(true)
            .with_debug_export_filter("b.**")
            .with_export_dir(dir.path()),
    );
    t.add_mixin(&config(), overwrite_foo(mixin("m/M", None), 8).build())
        .unwrap();
    t.transform(TARGET, &target_bytes(TARGET)).unwrap();
    assert!(!exported(dir.path()).exists());
}

#[test]
fn mixin_debug_request_forces_export() {
    let dir = tempfile::tempdir().unwrap();
    let t = transformer(Options::default().with_export_dir(dir.path()));
    let m = overwrite_foo(mixin("m/M", None), 8)
        .annotate(Annotation::new(known::DEBUG).with("export", true))
        .build();
    t.add_mixin(&config(), m).unwrap();
    t.transform(TARGET, &target_bytes(TARGET)).unwrap();
    assert!(exported(dir.path()).exists());
}

#[test]
fn nothing_is_exported_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let t = transformer(Options::default().with_export_dir(dir.path()));
    t.add_mixin(&config(), overwrite_foo(mixin("m/M", None), 8).build())
        .unwrap();
    t.transform(TARGET, &target_bytes(TARGET)).unwrap();
    assert!(!dir.path().join("class").exists());
}
