//! Parallel transforms and deterministic composition.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rayon::prelude::*;
use weave_ir::{AccessFlags, ClassNode};
use weave_mixin::{MixinTransformer, Options};

use crate::common::{
    config, foo_tag, mixin_for, modified, overwrite_foo, registry, target_bytes, target_named,
};

fn target_names(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("a/Target{i}")).collect()
}

#[test]
fn parallel_transforms_match_sequential_ones() {
    let names = target_names(32);
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let build = || {
        let t = MixinTransformer::new(registry(&refs), Options::default().with_hot_swap(true));
        t.add_mixin(&config(), overwrite_foo(mixin_for("m/M", &refs, None), 6).build())
            .unwrap();
        t
    };

    let sequential = build();
    let expected: Vec<ClassNode> = names
        .iter()
        .map(|n| modified(sequential.transform(n, &target_bytes(n)).unwrap()))
        .collect();

    let parallel = Arc::new(build());
    let actual: Vec<ClassNode> = names
        .par_iter()
        .map(|n| modified(parallel.transform(n, &target_bytes(n)).unwrap()))
        .collect();

    assert_eq!(actual, expected);
    assert_eq!(parallel.transformed_classes().len(), names.len());
    assert_eq!(parallel.originals().unwrap().len(), names.len());
    assert!(actual.iter().all(|c| foo_tag(c) == 6));
}

/// Mixins `m/M{i}` adding one method each and overwriting `foo` at a
/// distinct priority.
fn mixins(priorities: &[i32]) -> Vec<ClassNode> {
    priorities
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let builder = mixin_for(&format!("m/M{i}"), &["a/Target"], Some(p))
                .method(AccessFlags::PUBLIC, &format!("added{i}"), "()V", |m| m.ret());
            overwrite_foo(builder, p).build()
        })
        .collect()
}

fn apply(classes: Vec<ClassNode>) -> ClassNode {
    let t = MixinTransformer::new(registry(&["a/Target"]), Options::default());
    for class in classes {
        t.add_mixin(&config(), class).unwrap();
    }
    modified(t.transform("a/Target", &target_bytes("a/Target")).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn composition_is_deterministic(
        priorities in proptest::collection::btree_set(1..5000i32, 1..6)
    ) {
        let priorities: Vec<i32> = priorities.into_iter().collect();
        let first = apply(mixins(&priorities));
        let second = apply(mixins(&priorities));
        prop_assert_eq!(&first, &second);

        // Distinct priorities make registration order irrelevant
        let reversed = apply(mixins(&priorities).into_iter().rev().collect());
        prop_assert_eq!(&first, &reversed);

        let highest = priorities.iter().copied().max().unwrap();
        prop_assert_eq!(foo_tag(&first), highest);
        prop_assert_eq!(
            first.methods.len(),
            target_named("a/Target").methods.len() + priorities.len()
        );
    }
}
