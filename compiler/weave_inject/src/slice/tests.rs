#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;
use weave_ir::{Constant, SimpleOp, ValueKind};

use super::*;
use crate::point::{MemberRef, Selector};
use crate::test_helpers::{at, bar, two_bar_calls};

fn first_bar() -> InjectionPoint {
    InjectionPoint::new(Selector::Invoke).with_member(MemberRef::parse("a/Target.bar()V").unwrap())
}

#[test]
fn slice_from_first_call_to_return() {
    let method = two_bar_calls();
    let slice = MethodSlice::new("A", Some(first_bar()), Some(InjectionPoint::new(Selector::Return)));

    let view = slice.resolve(&method.insns).unwrap();
    assert_eq!(view.range(), 3..9);
    assert_eq!(
        view.insns(&method.insns),
        &[
            bar(),
            Insn::Const(Constant::Int(5)),
            Insn::Op(SimpleOp::Pop),
            Insn::load(ValueKind::Ref, 0),
            bar(),
            Insn::Return {
                kind: ValueKind::Void
            },
        ]
    );
}

#[test]
fn to_bound_uses_last_match() {
    let method = two_bar_calls();
    let slice = MethodSlice::new("upto", None, Some(first_bar()));
    let view = slice.resolve(&method.insns).unwrap();
    assert_eq!(view.start(), 0);
    assert_eq!(view.last(), 7);
}

#[test]
fn ordinal_bounds_pick_that_match() {
    let method = two_bar_calls();
    let slice = MethodSlice::new("tight", Some(first_bar()), Some(first_bar().with_ordinal(0)));
    let view = slice.resolve(&method.insns).unwrap();
    assert_eq!(view.range(), 3..4);
}

#[test]
fn inverted_slice_is_invalid() {
    let method = two_bar_calls();
    let slice = MethodSlice::new(
        "backwards",
        Some(first_bar().with_ordinal(1)),
        Some(first_bar().with_ordinal(0)),
    );
    let err = slice.resolve(&method.insns).unwrap_err();
    assert!(matches!(err, InjectionError::InvalidSlice { ref id, .. } if id == "backwards"));
}

#[test]
fn unresolvable_bound_is_invalid() {
    let method = two_bar_calls();
    let missing = InjectionPoint::new(Selector::New);
    let slice = MethodSlice::new("nothing", Some(missing), None);
    assert!(matches!(
        slice.resolve(&method.insns),
        Err(InjectionError::InvalidSlice { .. })
    ));
}

#[test]
fn empty_body_never_yields_a_view() {
    let slice = MethodSlice::new("", None, None);
    assert!(slice.resolve(&InsnList::new()).is_err());
}

#[test]
fn duplicate_ids_are_rejected() {
    let slices = vec![MethodSlice::new("A", None, None), MethodSlice::new("A", None, None)];
    assert!(matches!(
        Slices::new(slices),
        Err(InjectionError::InvalidSlice { .. })
    ));
}

#[test]
fn parses_slice_annotation() {
    let ann = Annotation::new(known::SLICE)
        .with("id", "A")
        .with("from", at("INVOKE", Some("a/Target.bar()V")))
        .with("to", at("RETURN", None));
    let slice = MethodSlice::from_annotation(&ann).unwrap();
    assert_eq!(slice.id, "A");
    assert_eq!(slice.from, Some(first_bar()));
    assert_eq!(slice.to, Some(InjectionPoint::new(Selector::Return)));
}

#[test]
fn views_go_stale_when_the_body_changes() {
    let mut method = two_bar_calls();
    let view = SliceView::whole(&method.insns);
    assert!(view.is_current(&method.insns));
    method.insns.insert_before(0, vec![Insn::Op(SimpleOp::Nop)]);
    assert!(!view.is_current(&method.insns));
}
