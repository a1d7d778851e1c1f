//! Structural consistency check of merged trees.
//!
//! Not a verifier: only checks that jumps target labels defined in the same
//! method, that member keys are unique and that descriptors parse.

use rustc_hash::FxHashSet;
use weave_ir::{ClassNode, Insn, MethodDesc, TypeDesc};

use super::Extension;
use crate::context::TargetClassContext;
use crate::error::MixinError;
use crate::options::Options;

/// Runs [`check_class`] after every transformation when `debug_verify` is on.
pub struct CheckClass;

impl Extension for CheckClass {
    fn name(&self) -> &str {
        "check_class"
    }

    fn is_active(&self, options: &Options) -> bool {
        options.debug_verify
    }

    fn post_apply(&self, ctx: &TargetClassContext) -> Result<(), MixinError> {
        check_class(ctx.class())
    }
}

pub fn check_class(class: &ClassNode) -> Result<(), MixinError> {
    let fail = |reason: String| MixinError::ValidationFailed {
        class: class.name.clone(),
        reason,
    };

    let mut fields = FxHashSet::default();
    for field in &class.fields {
        if !fields.insert(field.key()) {
            return Err(fail(format!("duplicate field {}", field.key())));
        }
        TypeDesc::parse(&field.desc).map_err(|e| fail(format!("field {}: {e}", field.key())))?;
    }

    let mut methods = FxHashSet::default();
    for method in &class.methods {
        let key = method.key();
        MethodDesc::parse(&method.desc).map_err(|e| fail(format!("method {key}: {e}")))?;
        if !methods.insert(key.clone()) {
            return Err(fail(format!("duplicate method {key}")));
        }

        let labels: FxHashSet<_> = method
            .insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Label(label) => Some(*label),
                _ => None,
            })
            .collect();
        for insn in &method.insns {
            match insn {
                Insn::Jump { target, .. } if !labels.contains(target) => {
                    return Err(fail(format!(
                        "{key} jumps to undefined label L{}",
                        target.raw()
                    )));
                }
                Insn::Invoke { desc, .. } => {
                    MethodDesc::parse(desc).map_err(|e| fail(format!("{key}: `{insn}`: {e}")))?;
                }
                Insn::Field { desc, .. } => {
                    TypeDesc::parse(desc).map_err(|e| fail(format!("{key}: `{insn}`: {e}")))?;
                }
                _ => {}
            }
        }
    }
    Ok(())
}
