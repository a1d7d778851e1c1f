//! Per-method target handles.

use std::cell::Cell;

use weave_ir::{DescError, MemberKey, MethodDesc, MethodNode, TypeDesc, ValueKind};

/// Handle for one method of one target class.
///
/// Created lazily by the target class context and cached per method key.
/// A handle never outlives its context and is never shared across contexts.
#[derive(Clone, Debug)]
pub struct Target {
    class_name: String,
    key: MemberKey,
    is_static: bool,
    desc: MethodDesc,
    injected: Cell<u32>,
}

impl Target {
    pub fn new(class_name: &str, method: &MethodNode) -> Result<Self, DescError> {
        Ok(Target {
            class_name: class_name.to_owned(),
            key: method.key(),
            is_static: method.is_static(),
            desc: MethodDesc::parse(&method.desc)?,
            injected: Cell::new(0),
        })
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn key(&self) -> &MemberKey {
        &self.key
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn args(&self) -> &[TypeDesc] {
        &self.desc.args
    }

    pub fn return_type(&self) -> &TypeDesc {
        &self.desc.ret
    }

    pub fn desc(&self) -> &MethodDesc {
        &self.desc
    }

    /// First local slot after the receiver and the arguments.
    pub fn first_free_slot(&self) -> u16 {
        u16::from(!self.is_static) + self.desc.arg_slots()
    }

    /// Reserve a fresh local slot for a value of `kind` in `method`.
    pub fn allocate_local(&self, method: &mut MethodNode, kind: ValueKind) -> u16 {
        let slot = method.max_locals.max(self.first_free_slot());
        method.max_locals = slot.saturating_add(kind.slots());
        slot
    }

    /// Grow `method`'s operand stack limit by `extra` slots.
    pub fn reserve_stack(&self, method: &mut MethodNode, extra: u16) {
        method.max_stack = method.max_stack.saturating_add(extra);
    }

    /// Number of injections applied to this method so far.
    pub fn injection_count(&self) -> u32 {
        self.injected.get()
    }

    pub(crate) fn record_injections(&self, n: u32) {
        self.injected.set(self.injected.get().saturating_add(n));
    }
}
