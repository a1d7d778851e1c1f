#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use super::*;
use crate::test_helpers::{at, two_bar_calls};

#[test]
fn parses_member_references() {
    assert_eq!(
        MemberRef::parse("a/Target.bar()V").unwrap(),
        MemberRef {
            owner: Some("a/Target".into()),
            name: "bar".into(),
            desc: Some("()V".into()),
        }
    );
    let field = MemberRef::parse("a.b.C.count:I").unwrap();
    assert_eq!(field.owner.as_deref(), Some("a/b/C"));
    assert_eq!(field.desc.as_deref(), Some("I"));
    assert_eq!(field.to_string(), "a/b/C.count:I");

    let bare = MemberRef::parse("bar").unwrap();
    assert!(bare.matches("any/Owner", "bar", "(I)V"));
    assert!(MemberRef::parse("a/B.").is_err());
}

#[test]
fn unknown_selector_is_invalid() {
    let err = InjectionPoint::from_annotation(&at("SOMEWHERE", None)).unwrap_err();
    assert!(matches!(err, InjectionError::InvalidInjection(_)));
}

#[test]
fn head_has_no_target() {
    assert!(InjectionPoint::from_annotation(&at("HEAD", Some("a/B.c()V"))).is_err());
}

#[test]
fn head_skips_labels_and_lines() {
    let method = two_bar_calls();
    let head = InjectionPoint::new(Selector::Head);
    assert_eq!(head.find(method.insns.as_slice(), 0).as_slice(), &[2]);
}

#[test]
fn invoke_matches_every_call_or_the_ordinal() {
    let method = two_bar_calls();
    let point = InjectionPoint::from_annotation(&at("INVOKE", Some("a/Target.bar()V"))).unwrap();
    assert_eq!(point.find(method.insns.as_slice(), 0).as_slice(), &[3, 7]);

    let second = point.clone().with_ordinal(1);
    assert_eq!(second.find(method.insns.as_slice(), 0).as_slice(), &[7]);

    let out_of_range = point.with_ordinal(2);
    assert!(out_of_range.find(method.insns.as_slice(), 0).is_empty());
}

#[test]
fn positions_are_offset_by_base() {
    let method = two_bar_calls();
    let point = InjectionPoint::new(Selector::Return);
    assert_eq!(point.find(&method.insns.as_slice()[4..], 4).as_slice(), &[8]);
}

#[test]
fn constant_args_select_values() {
    let method = two_bar_calls();
    let five = at("CONSTANT", None).with("args", vec!["intValue=5"]);
    let six = at("CONSTANT", None).with("args", vec!["intValue=6"]);
    let five = InjectionPoint::from_annotation(&five).unwrap();
    let six = InjectionPoint::from_annotation(&six).unwrap();
    assert_eq!(five.find(method.insns.as_slice(), 0).as_slice(), &[4]);
    assert!(six.find(method.insns.as_slice(), 0).is_empty());

    let bad = at("CONSTANT", None).with("args", vec!["intValue=five"]);
    assert!(InjectionPoint::from_annotation(&bad).is_err());
}

#[test]
fn field_opcode_restricts_matches() {
    let insns = vec![
        Insn::field(FieldOp::GetField, "a/T", "n", "I"),
        Insn::field(FieldOp::PutField, "a/T", "n", "I"),
    ];
    let ann = at("FIELD", Some("a/T.n:I")).with("opcode", "PUTFIELD");
    let point = InjectionPoint::from_annotation(&ann).unwrap();
    assert_eq!(point.find(&insns, 0).as_slice(), &[1]);

    let bad = at("FIELD", None).with("opcode", "LOADFIELD");
    assert!(InjectionPoint::from_annotation(&bad).is_err());
}

#[test]
fn tail_is_last_return() {
    let insns = vec![
        Insn::Return {
            kind: weave_ir::ValueKind::Void,
        },
        Insn::Op(weave_ir::SimpleOp::Nop),
        Insn::Return {
            kind: weave_ir::ValueKind::Void,
        },
    ];
    assert_eq!(
        InjectionPoint::new(Selector::Tail).find(&insns, 0).as_slice(),
        &[2]
    );
    assert_eq!(
        InjectionPoint::new(Selector::Return).find(&insns, 0).as_slice(),
        &[0, 2]
    );
}
