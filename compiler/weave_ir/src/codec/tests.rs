#![allow(clippy::unwrap_used, clippy::expect_used)]

use pretty_assertions::assert_eq;

use super::*;
use crate::{Annotation, ClassBuilder, Constant, Insn, InvokeOp, ValueKind};

fn sample() -> ClassNode {
    ClassBuilder::new("a/Target")
        .interface("a/Iface")
        .field(crate::AccessFlags::PRIVATE, "count", "I")
        .method(crate::AccessFlags::PUBLIC, "foo", "()V", |m| {
            m.annotate(Annotation::new("Lweave/MixinMerged;").with("mixin", "a/M"))
                .insn(Insn::load(ValueKind::Ref, 0))
                .insn(Insn::invoke(InvokeOp::Virtual, "a/Target", "bar", "()V"))
                .insn(Insn::Const(Constant::String("hi".into())))
                .insn(Insn::Op(crate::SimpleOp::Pop))
                .ret()
        })
        .build()
}

#[test]
fn decode_restores_tree() {
    let class = sample();
    let bytes = class.to_bytes().unwrap();
    assert_eq!(&bytes[..4], b"WVCL");
    assert_eq!(ClassNode::from_bytes(&bytes).unwrap(), class);
}

#[test]
fn equal_trees_encode_identically() {
    assert_eq!(sample().to_bytes().unwrap(), sample().to_bytes().unwrap());
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = sample().to_bytes().unwrap();
    bytes[0] = b'X';
    assert!(matches!(
        ClassNode::from_bytes(&bytes),
        Err(CodecError::InvalidMagic(_))
    ));
}

#[test]
fn rejects_future_version() {
    let mut bytes = sample().to_bytes().unwrap();
    bytes[4] = 9;
    assert!(matches!(
        ClassNode::from_bytes(&bytes),
        Err(CodecError::UnsupportedVersion { found: 9 })
    ));
}

#[test]
fn rejects_truncated_input() {
    assert!(matches!(
        ClassNode::from_bytes(b"WV"),
        Err(CodecError::Truncated { len: 2 })
    ));
    let bytes = sample().to_bytes().unwrap();
    assert!(matches!(
        ClassNode::from_bytes(&bytes[..bytes.len() - 3]),
        Err(CodecError::Body(_))
    ));
}
