//! Priority ordering between mixins.

use pretty_assertions::assert_eq;
use weave_mixin::{MixinError, Options};

use crate::common::{
    config, foo_tag, mixin, modified, overwrite_foo, target_bytes, transformer, TARGET,
};

#[test]
fn higher_priority_wins_in_either_registration_order() {
    for low_first in [true, false] {
        let t = transformer(Options::default());
        let low = overwrite_foo(mixin("m/M1", Some(1000)), 1).build();
        let high = overwrite_foo(mixin("m/M2", Some(2000)), 2).build();
        let (first, second) = if low_first { (low, high) } else { (high, low) };
        t.add_mixin(&config(), first).unwrap();
        t.add_mixin(&config(), second).unwrap();

        let class = modified(t.transform(TARGET, &target_bytes(TARGET)).unwrap());
        assert_eq!(foo_tag(&class), 2, "low registered first: {low_first}");
    }
}

#[test]
fn equal_priorities_conflict() {
    let t = transformer(Options::default());
    t.add_mixin(&config(), overwrite_foo(mixin("m/M1", None), 1).build())
        .unwrap();
    t.add_mixin(&config(), overwrite_foo(mixin("m/M2", None), 2).build())
        .unwrap();

    let err = t.transform(TARGET, &target_bytes(TARGET)).unwrap_err();
    assert_eq!(err.target, TARGET);
    assert_eq!(err.mixin.as_deref(), Some("m/M2"));
    match err.source {
        MixinError::Conflict {
            member,
            existing,
            existing_priority,
            incoming_priority,
            ..
        } => {
            assert_eq!(member, "foo()V");
            assert_eq!(existing, "m/M1");
            assert_eq!((existing_priority, incoming_priority), (1000, 1000));
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[test]
fn discovery_order_breaks_priority_ties_for_disjoint_members() {
    let t = transformer(Options::default());
    let a = mixin("m/A", None)
        .method(weave_ir::AccessFlags::PUBLIC, "fromA", "()V", |m| m.ret())
        .build();
    let b = mixin("m/B", None)
        .method(weave_ir::AccessFlags::PUBLIC, "fromB", "()V", |m| m.ret())
        .build();
    t.add_mixin(&config(), b).unwrap();
    t.add_mixin(&config(), a).unwrap();

    let class = modified(t.transform(TARGET, &target_bytes(TARGET)).unwrap());
    let names: Vec<&str> = class.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, ["foo", "bar", "run", "fromB", "fromA"]);
}
