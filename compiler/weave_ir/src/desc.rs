//! Type and method descriptors.
//!
//! Descriptors use the class-file grammar: `I` for `int`, `Ljava/lang/String;`
//! for object types, `[I` for arrays and `(IJ)V` for methods. The engine
//! parses them to compute local-variable slots, to pick load/store/return
//! instruction kinds, and to validate handler signatures.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a descriptor does not follow the grammar.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DescError {
    /// The descriptor string was empty.
    #[error("empty descriptor")]
    Empty,
    /// An unexpected character, or the descriptor ended early.
    #[error("malformed descriptor `{desc}` at offset {offset}")]
    Malformed { desc: String, offset: usize },
    /// `V` appeared somewhere other than a method return type.
    #[error("`V` is only valid as a method return type (in `{0}`)")]
    VoidOutsideReturn(String),
}

// ── Value kinds ─────────────────────────────────────────────────────

/// Computational kind of a value, as seen by load, store and return
/// instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// `boolean`, `byte`, `char`, `short` and `int`.
    Int,
    Long,
    Float,
    Double,
    /// Objects and arrays.
    Ref,
    Void,
}

impl ValueKind {
    /// Number of local-variable slots a value of this kind occupies.
    pub fn slots(self) -> u16 {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            ValueKind::Void => 0,
            ValueKind::Int | ValueKind::Float | ValueKind::Ref => 1,
        }
    }

    /// Mnemonic prefix used by typed instructions (`I`LOAD, `A`RETURN, ...).
    pub fn prefix(self) -> &'static str {
        match self {
            ValueKind::Int => "I",
            ValueKind::Long => "L",
            ValueKind::Float => "F",
            ValueKind::Double => "D",
            ValueKind::Ref => "A",
            ValueKind::Void => "",
        }
    }
}

// ── Field types ─────────────────────────────────────────────────────

/// A parsed field (or argument, or return) type descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeDesc {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Object type by internal name, e.g. `java/lang/String`.
    Object(String),
    Array(Box<TypeDesc>),
}

impl TypeDesc {
    /// Parse a complete type descriptor.
    pub fn parse(desc: &str) -> Result<Self, DescError> {
        if desc.is_empty() {
            return Err(DescError::Empty);
        }
        let (ty, end) = parse_type(desc, 0)?;
        if end != desc.len() {
            return Err(malformed(desc, end));
        }
        Ok(ty)
    }

    /// Object type for an internal class name.
    pub fn object(internal_name: impl Into<String>) -> Self {
        TypeDesc::Object(internal_name.into())
    }

    /// The computational kind of values of this type.
    pub fn kind(&self) -> ValueKind {
        match self {
            TypeDesc::Void => ValueKind::Void,
            TypeDesc::Boolean
            | TypeDesc::Byte
            | TypeDesc::Char
            | TypeDesc::Short
            | TypeDesc::Int => ValueKind::Int,
            TypeDesc::Long => ValueKind::Long,
            TypeDesc::Float => ValueKind::Float,
            TypeDesc::Double => ValueKind::Double,
            TypeDesc::Object(_) | TypeDesc::Array(_) => ValueKind::Ref,
        }
    }

    /// Render back to descriptor form.
    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDesc::Void => f.write_str("V"),
            TypeDesc::Boolean => f.write_str("Z"),
            TypeDesc::Byte => f.write_str("B"),
            TypeDesc::Char => f.write_str("C"),
            TypeDesc::Short => f.write_str("S"),
            TypeDesc::Int => f.write_str("I"),
            TypeDesc::Long => f.write_str("J"),
            TypeDesc::Float => f.write_str("F"),
            TypeDesc::Double => f.write_str("D"),
            TypeDesc::Object(name) => write!(f, "L{name};"),
            TypeDesc::Array(elem) => write!(f, "[{elem}"),
        }
    }
}

// ── Method types ────────────────────────────────────────────────────

/// A parsed method descriptor: argument types and return type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodDesc {
    pub args: Vec<TypeDesc>,
    pub ret: TypeDesc,
}

impl MethodDesc {
    /// Parse a complete method descriptor such as `(ILjava/lang/String;)V`.
    pub fn parse(desc: &str) -> Result<Self, DescError> {
        if desc.is_empty() {
            return Err(DescError::Empty);
        }
        if !desc.starts_with('(') {
            return Err(malformed(desc, 0));
        }

        let mut args = Vec::new();
        let mut pos = 1;
        loop {
            match desc.as_bytes().get(pos) {
                Some(b')') => break,
                Some(_) => {
                    let (arg, next) = parse_type(desc, pos)?;
                    if arg == TypeDesc::Void {
                        return Err(DescError::VoidOutsideReturn(desc.to_owned()));
                    }
                    args.push(arg);
                    pos = next;
                }
                None => return Err(malformed(desc, pos)),
            }
        }

        let (ret, end) = parse_type(desc, pos + 1)?;
        if end != desc.len() {
            return Err(malformed(desc, end));
        }
        Ok(MethodDesc { args, ret })
    }

    /// Total local-variable slots taken by the arguments (no receiver).
    pub fn arg_slots(&self) -> u16 {
        self.args.iter().map(|a| a.kind().slots()).sum()
    }

    /// A copy of this descriptor with `ty` prepended to the arguments.
    ///
    /// Used to derive the handler signature for instance operations, where
    /// the receiver becomes the first argument.
    #[must_use]
    pub fn with_leading_arg(&self, ty: TypeDesc) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(ty);
        args.extend(self.args.iter().cloned());
        MethodDesc {
            args,
            ret: self.ret.clone(),
        }
    }

    /// Render back to descriptor form.
    pub fn descriptor(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for arg in &self.args {
            write!(f, "{arg}")?;
        }
        write!(f, "){}", self.ret)
    }
}

// ── Parsing ─────────────────────────────────────────────────────────

fn malformed(desc: &str, offset: usize) -> DescError {
    DescError::Malformed {
        desc: desc.to_owned(),
        offset,
    }
}

/// Parse one type starting at `start`, returning it and the offset just past it.
fn parse_type(desc: &str, start: usize) -> Result<(TypeDesc, usize), DescError> {
    let Some(&byte) = desc.as_bytes().get(start) else {
        return Err(malformed(desc, start));
    };

    let ty = match byte {
        b'V' => TypeDesc::Void,
        b'Z' => TypeDesc::Boolean,
        b'B' => TypeDesc::Byte,
        b'C' => TypeDesc::Char,
        b'S' => TypeDesc::Short,
        b'I' => TypeDesc::Int,
        b'J' => TypeDesc::Long,
        b'F' => TypeDesc::Float,
        b'D' => TypeDesc::Double,
        b'L' => {
            let rest = &desc[start + 1..];
            let Some(len) = rest.find(';') else {
                return Err(malformed(desc, start));
            };
            if len == 0 {
                return Err(malformed(desc, start + 1));
            }
            return Ok((TypeDesc::Object(rest[..len].to_owned()), start + len + 2));
        }
        b'[' => {
            let (elem, next) = parse_type(desc, start + 1)?;
            if elem == TypeDesc::Void {
                return Err(DescError::VoidOutsideReturn(desc.to_owned()));
            }
            return Ok((TypeDesc::Array(Box::new(elem)), next));
        }
        _ => return Err(malformed(desc, start)),
    };

    Ok((ty, start + 1))
}
