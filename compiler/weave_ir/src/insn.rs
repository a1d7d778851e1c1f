//! Instructions and instruction lists.
//!
//! The engine treats method bodies as an opaque, ordered stream. Only the
//! instruction shapes the injection-point selectors care about are modeled
//! with operands (calls, field accesses, allocations, constants, returns);
//! everything else is a [`SimpleOp`].
//!
//! # Architecture
//!
//! - **[`Insn`]**: one instruction, a tagged variant.
//! - **[`InsnList`]**: the method body plus a generation counter that is
//!   bumped by every mutation. Read-only views record the generation they
//!   were taken at and are re-resolved once it moves.
//! - **[`Label`]**: a jump target, placed in the stream by `Insn::Label`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::desc::{TypeDesc, ValueKind};

// ── Labels ──────────────────────────────────────────────────────────

/// Jump target within one method body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Label(u32);

impl Label {
    /// Create a label from a raw index.
    #[inline]
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw `u32` value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

// ── Constants ───────────────────────────────────────────────────────

/// A constant pushed by `Insn::Const`.
///
/// Floating-point values are stored as raw bits so constants stay `Eq` and
/// encode deterministically.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Null,
    Int(i32),
    Long(i64),
    Float(u32),
    Double(u64),
    String(String),
    /// Class literal, by internal name.
    Type(String),
}

impl Constant {
    /// A `float` constant.
    pub fn float(value: f32) -> Self {
        Constant::Float(value.to_bits())
    }

    /// A `double` constant.
    pub fn double(value: f64) -> Self {
        Constant::Double(value.to_bits())
    }

    /// The static type of this constant.
    pub fn type_desc(&self) -> TypeDesc {
        match self {
            Constant::Null => TypeDesc::object(crate::OBJECT),
            Constant::Int(_) => TypeDesc::Int,
            Constant::Long(_) => TypeDesc::Long,
            Constant::Float(_) => TypeDesc::Float,
            Constant::Double(_) => TypeDesc::Double,
            Constant::String(_) => TypeDesc::object("java/lang/String"),
            Constant::Type(_) => TypeDesc::object("java/lang/Class"),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Null => f.write_str("null"),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Long(v) => write!(f, "{v}L"),
            Constant::Float(bits) => write!(f, "{}F", f32::from_bits(*bits)),
            Constant::Double(bits) => write!(f, "{}D", f64::from_bits(*bits)),
            Constant::String(s) => write!(f, "{s:?}"),
            Constant::Type(t) => write!(f, "L{t};.class"),
        }
    }
}

// ── Opcodes ─────────────────────────────────────────────────────────

/// Local-variable access direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VarOp {
    Load,
    Store,
}

/// Method invocation flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvokeOp {
    Static,
    Virtual,
    Special,
    Interface,
}

impl InvokeOp {
    /// Whether the call takes no receiver.
    pub fn is_static(self) -> bool {
        self == InvokeOp::Static
    }

    fn mnemonic(self) -> &'static str {
        match self {
            InvokeOp::Static => "INVOKESTATIC",
            InvokeOp::Virtual => "INVOKEVIRTUAL",
            InvokeOp::Special => "INVOKESPECIAL",
            InvokeOp::Interface => "INVOKEINTERFACE",
        }
    }
}

/// Field access flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldOp {
    GetField,
    PutField,
    GetStatic,
    PutStatic,
}

impl FieldOp {
    /// Whether the access takes no receiver.
    pub fn is_static(self) -> bool {
        matches!(self, FieldOp::GetStatic | FieldOp::PutStatic)
    }

    /// Whether the access reads the field.
    pub fn is_get(self) -> bool {
        matches!(self, FieldOp::GetField | FieldOp::GetStatic)
    }

    /// Parse a mnemonic such as `GETFIELD`.
    pub fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "GETFIELD" => Some(FieldOp::GetField),
            "PUTFIELD" => Some(FieldOp::PutField),
            "GETSTATIC" => Some(FieldOp::GetStatic),
            "PUTSTATIC" => Some(FieldOp::PutStatic),
            _ => None,
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            FieldOp::GetField => "GETFIELD",
            FieldOp::PutField => "PUTFIELD",
            FieldOp::GetStatic => "GETSTATIC",
            FieldOp::PutStatic => "PUTSTATIC",
        }
    }
}

/// Branch flavour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpOp {
    Goto,
    IfEq,
    IfNe,
    IfNull,
    IfNonNull,
    IfICmpEq,
    IfICmpNe,
    IfICmpLt,
    IfICmpGe,
}

/// Operand-free instructions the engine never needs to look inside.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimpleOp {
    Nop,
    Pop,
    Pop2,
    Dup,
    DupX1,
    Swap,
    IAdd,
    ISub,
    IMul,
    LAdd,
    DAdd,
    ArrayLength,
    MonitorEnter,
    MonitorExit,
}

// ── Instructions ────────────────────────────────────────────────────

/// A single instruction in a method body.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Insn {
    /// Marks the position of a jump target.
    Label(Label),
    /// Source line marker.
    Line(u32),
    /// Push a constant.
    Const(Constant),
    /// Load from or store to a local variable slot.
    Var { op: VarOp, kind: ValueKind, slot: u16 },
    /// Method call.
    Invoke {
        op: InvokeOp,
        owner: String,
        name: String,
        desc: String,
    },
    /// Field read or write.
    Field {
        op: FieldOp,
        owner: String,
        name: String,
        desc: String,
    },
    /// Allocate an object of the given internal type name.
    New { ty: String },
    /// Conditional or unconditional branch.
    Jump { op: JumpOp, target: Label },
    /// Return from the method; `kind` is `Void` for a bare `RETURN`.
    Return { kind: ValueKind },
    /// Throw the exception on top of the stack.
    Throw,
    /// Any operand-free instruction.
    Op(SimpleOp),
}

impl Insn {
    /// `xLOAD slot`.
    pub fn load(kind: ValueKind, slot: u16) -> Self {
        Insn::Var {
            op: VarOp::Load,
            kind,
            slot,
        }
    }

    /// `xSTORE slot`.
    pub fn store(kind: ValueKind, slot: u16) -> Self {
        Insn::Var {
            op: VarOp::Store,
            kind,
            slot,
        }
    }

    /// Method call instruction.
    pub fn invoke(op: InvokeOp, owner: &str, name: &str, desc: &str) -> Self {
        Insn::Invoke {
            op,
            owner: owner.to_owned(),
            name: name.to_owned(),
            desc: desc.to_owned(),
        }
    }

    /// Field access instruction.
    pub fn field(op: FieldOp, owner: &str, name: &str, desc: &str) -> Self {
        Insn::Field {
            op,
            owner: owner.to_owned(),
            name: name.to_owned(),
            desc: desc.to_owned(),
        }
    }

    /// Whether this instruction executes (labels and line markers do not).
    pub fn is_real(&self) -> bool {
        !matches!(self, Insn::Label(_) | Insn::Line(_))
    }

    /// Whether this is any return instruction.
    pub fn is_return(&self) -> bool {
        matches!(self, Insn::Return { .. })
    }
}

impl fmt::Display for Insn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Insn::Label(label) => write!(f, "L{}:", label.raw()),
            Insn::Line(line) => write!(f, "LINE {line}"),
            Insn::Const(value) => write!(f, "LDC {value}"),
            Insn::Var { op, kind, slot } => {
                let verb = match op {
                    VarOp::Load => "LOAD",
                    VarOp::Store => "STORE",
                };
                write!(f, "{}{verb} {slot}", kind.prefix())
            }
            Insn::Invoke {
                op,
                owner,
                name,
                desc,
            } => write!(f, "{} {owner}.{name}{desc}", op.mnemonic()),
            Insn::Field {
                op,
                owner,
                name,
                desc,
            } => write!(f, "{} {owner}.{name} : {desc}", op.mnemonic()),
            Insn::New { ty } => write!(f, "NEW {ty}"),
            Insn::Jump { op, target } => write!(f, "{op:?} L{}", target.raw()),
            Insn::Return { kind } => write!(f, "{}RETURN", kind.prefix()),
            Insn::Throw => f.write_str("ATHROW"),
            Insn::Op(op) => write!(f, "{op:?}"),
        }
    }
}

// ── Instruction lists ───────────────────────────────────────────────

/// An ordered method body.
///
/// Every mutation bumps [`generation`](Self::generation). The counter is not
/// part of the encoded form and does not take part in equality.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct InsnList {
    insns: Vec<Insn>,
    #[serde(skip)]
    generation: u64,
}

impl PartialEq for InsnList {
    fn eq(&self, other: &Self) -> bool {
        self.insns == other.insns
    }
}

impl Eq for InsnList {}

impl From<Vec<Insn>> for InsnList {
    fn from(insns: Vec<Insn>) -> Self {
        InsnList {
            insns,
            generation: 0,
        }
    }
}

impl InsnList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions, labels and line markers included.
    pub fn len(&self) -> usize {
        self.insns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insns.is_empty()
    }

    /// The mutation counter.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, index: usize) -> Option<&Insn> {
        self.insns.get(index)
    }

    pub fn as_slice(&self) -> &[Insn] {
        &self.insns
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Insn> {
        self.insns.iter()
    }

    /// Append one instruction.
    pub fn push(&mut self, insn: Insn) {
        self.insns.push(insn);
        self.generation += 1;
    }

    /// Insert `insns` so that the first of them lands at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index > len`.
    pub fn insert_before(&mut self, index: usize, insns: Vec<Insn>) {
        self.insns.splice(index..index, insns);
        self.generation += 1;
    }

    /// Insert `insns` right after the instruction at `index`.
    pub fn insert_after(&mut self, index: usize, insns: Vec<Insn>) {
        self.insert_before(index + 1, insns);
    }

    /// Replace the instruction at `index` with `insns`.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len`.
    pub fn replace(&mut self, index: usize, insns: Vec<Insn>) {
        self.insns.splice(index..=index, insns);
        self.generation += 1;
    }

    /// Replace the whole body.
    pub fn set(&mut self, insns: Vec<Insn>) {
        self.insns = insns;
        self.generation += 1;
    }

    /// Index of the first executable instruction, if any.
    pub fn first_real(&self) -> Option<usize> {
        self.insns.iter().position(Insn::is_real)
    }

    /// A label not yet used anywhere in this list.
    pub fn fresh_label(&self) -> Label {
        let max = self
            .insns
            .iter()
            .filter_map(|insn| match insn {
                Insn::Label(l) | Insn::Jump { target: l, .. } => Some(l.raw()),
                _ => None,
            })
            .max();
        Label::new(max.map_or(0, |m| m + 1))
    }
}

impl<'a> IntoIterator for &'a InsnList {
    type Item = &'a Insn;
    type IntoIter = std::slice::Iter<'a, Insn>;

    fn into_iter(self) -> Self::IntoIter {
        self.insns.iter()
    }
}
