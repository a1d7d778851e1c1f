//! Injection point locators.
//!
//! A locator names a selector (`HEAD`, `RETURN`, `TAIL`, `INVOKE`, `FIELD`,
//! `NEW`, `CONSTANT`) plus optional match arguments. Resolution scans a
//! read-only view forward and yields absolute instruction indices.

use std::fmt;

use smallvec::SmallVec;
use weave_ir::annotation::known;
use weave_ir::{internal_name, Annotation, Constant, FieldOp, Insn};

use crate::error::InjectionError;

/// Matched instruction positions. Most locators match a handful at most.
pub type Positions = SmallVec<[usize; 4]>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Before the first executable instruction.
    Head,
    /// Every return instruction.
    Return,
    /// The last return instruction.
    Tail,
    /// Method calls.
    Invoke,
    /// Field reads and writes.
    Field,
    /// Object allocations.
    New,
    /// Constant pushes.
    Constant,
}

impl Selector {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "HEAD" => Some(Selector::Head),
            "RETURN" => Some(Selector::Return),
            "TAIL" => Some(Selector::Tail),
            "INVOKE" => Some(Selector::Invoke),
            "FIELD" => Some(Selector::Field),
            "NEW" => Some(Selector::New),
            "CONSTANT" => Some(Selector::Constant),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Selector::Head => "HEAD",
            Selector::Return => "RETURN",
            Selector::Tail => "TAIL",
            Selector::Invoke => "INVOKE",
            Selector::Field => "FIELD",
            Selector::New => "NEW",
            Selector::Constant => "CONSTANT",
        }
    }
}

// ── Member references ───────────────────────────────────────────────

/// A member reference pattern: `owner.name(desc)` for methods,
/// `owner.name:desc` for fields. Owner and descriptor are optional.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberRef {
    pub owner: Option<String>,
    pub name: String,
    pub desc: Option<String>,
}

impl MemberRef {
    pub fn parse(text: &str) -> Result<Self, InjectionError> {
        let (head, desc) = match text.find(['(', ':']) {
            Some(i) if text.as_bytes()[i] == b'(' => (&text[..i], Some(text[i..].to_owned())),
            Some(i) => (&text[..i], Some(text[i + 1..].to_owned())),
            None => (text, None),
        };
        let (owner, name) = match head.rfind('.') {
            Some(dot) => (Some(internal_name(&head[..dot])), &head[dot + 1..]),
            None => (None, head),
        };
        if name.is_empty() || desc.as_deref() == Some("") {
            return Err(InjectionError::invalid(format!(
                "malformed member reference `{text}`"
            )));
        }
        Ok(MemberRef {
            owner,
            name: name.to_owned(),
            desc,
        })
    }

    pub fn matches(&self, owner: &str, name: &str, desc: &str) -> bool {
        self.name == name
            && self.owner.as_deref().map_or(true, |o| o == owner)
            && self.desc.as_deref().map_or(true, |d| d == desc)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(owner) = &self.owner {
            write!(f, "{owner}.")?;
        }
        f.write_str(&self.name)?;
        match self.desc.as_deref() {
            Some(d) if d.starts_with('(') => f.write_str(d),
            Some(d) => write!(f, ":{d}"),
            None => Ok(()),
        }
    }
}

// ── Locators ────────────────────────────────────────────────────────

/// A parsed `Lweave/At;` locator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InjectionPoint {
    pub selector: Selector,
    /// Member pattern for `INVOKE` and `FIELD`.
    pub member: Option<MemberRef>,
    /// Allocated type for `NEW`.
    pub new_type: Option<String>,
    /// Constant value for `CONSTANT`; `None` matches any constant.
    pub constant: Option<Constant>,
    /// Field opcode restriction for `FIELD`.
    pub opcode: Option<FieldOp>,
    /// Select only the k-th match in scope.
    pub ordinal: Option<usize>,
    /// Slice id scoping the search; `None` searches the whole body.
    pub slice: Option<String>,
}

impl InjectionPoint {
    /// A locator with no match arguments.
    pub fn new(selector: Selector) -> Self {
        InjectionPoint {
            selector,
            member: None,
            new_type: None,
            constant: None,
            opcode: None,
            ordinal: None,
            slice: None,
        }
    }

    #[must_use]
    pub fn with_member(mut self, member: MemberRef) -> Self {
        self.member = Some(member);
        self
    }

    #[must_use]
    pub fn with_ordinal(mut self, ordinal: usize) -> Self {
        self.ordinal = Some(ordinal);
        self
    }

    #[must_use]
    pub fn in_slice(mut self, slice: &str) -> Self {
        self.slice = Some(slice.to_owned());
        self
    }

    /// Parse an `Lweave/At;` annotation.
    pub fn from_annotation(ann: &Annotation) -> Result<Self, InjectionError> {
        if ann.desc != known::AT {
            return Err(InjectionError::invalid(format!(
                "expected {} locator, found {}",
                known::AT,
                ann.desc
            )));
        }
        let value = ann
            .get_str("value")
            .ok_or_else(|| InjectionError::invalid("locator without a selector"))?;
        let selector = Selector::parse(value)
            .ok_or_else(|| InjectionError::invalid(format!("unknown selector `{value}`")))?;

        let mut point = InjectionPoint::new(selector);
        if let Some(target) = ann.get_str("target").filter(|t| !t.is_empty()) {
            match selector {
                Selector::Invoke | Selector::Field => point.member = Some(MemberRef::parse(target)?),
                Selector::New => point.new_type = Some(internal_name(target)),
                _ => {
                    return Err(InjectionError::invalid(format!(
                        "selector {value} does not take a target"
                    )))
                }
            }
        }
        if let Some(opcode) = ann.get_str("opcode") {
            point.opcode = Some(FieldOp::from_mnemonic(opcode).ok_or_else(|| {
                InjectionError::invalid(format!("unknown field opcode `{opcode}`"))
            })?);
        }
        point.ordinal = ann
            .get_int("ordinal")
            .and_then(|o| usize::try_from(o).ok());
        point.slice = ann
            .get_str("slice")
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        for arg in ann.get_str_list("args") {
            point.constant = Some(parse_constant_arg(arg)?);
        }
        Ok(point)
    }

    fn matches(&self, insn: &Insn) -> bool {
        match (self.selector, insn) {
            (Selector::Return | Selector::Tail, Insn::Return { .. }) => true,
            (
                Selector::Invoke,
                Insn::Invoke {
                    owner, name, desc, ..
                },
            ) => self
                .member
                .as_ref()
                .map_or(true, |m| m.matches(owner, name, desc)),
            (
                Selector::Field,
                Insn::Field {
                    op,
                    owner,
                    name,
                    desc,
                },
            ) => {
                self.opcode.map_or(true, |o| o == *op)
                    && self
                        .member
                        .as_ref()
                        .map_or(true, |m| m.matches(owner, name, desc))
            }
            (Selector::New, Insn::New { ty }) => self.new_type.as_ref().map_or(true, |t| t == ty),
            (Selector::Constant, Insn::Const(value)) => {
                self.constant.as_ref().map_or(true, |c| c == value)
            }
            _ => false,
        }
    }

    /// Find matching positions in `view`, whose first element sits at
    /// absolute index `base`.
    pub fn find(&self, view: &[Insn], base: usize) -> Positions {
        let mut found: Positions = match self.selector {
            Selector::Head => view.iter().position(Insn::is_real).into_iter().collect(),
            Selector::Tail => view.iter().rposition(Insn::is_return).into_iter().collect(),
            _ => view
                .iter()
                .enumerate()
                .filter(|(_, insn)| self.matches(insn))
                .map(|(i, _)| i)
                .collect(),
        };
        if let Some(k) = self.ordinal {
            found = found.get(k).copied().into_iter().collect();
        }
        for pos in &mut found {
            *pos += base;
        }
        found
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@At({}", self.selector.as_str())?;
        if let Some(member) = &self.member {
            write!(f, " {member}")?;
        }
        if let Some(ty) = &self.new_type {
            write!(f, " {ty}")?;
        }
        if let Some(c) = &self.constant {
            write!(f, " {c}")?;
        }
        if let Some(k) = self.ordinal {
            write!(f, " ordinal={k}")?;
        }
        if let Some(slice) = &self.slice {
            write!(f, " slice={slice}")?;
        }
        f.write_str(")")
    }
}

fn parse_constant_arg(arg: &str) -> Result<Constant, InjectionError> {
    let bad = || InjectionError::invalid(format!("malformed locator argument `{arg}`"));
    let (key, value) = arg.split_once('=').ok_or_else(bad)?;
    let value = value.trim();
    let constant = match key.trim() {
        "nullValue" if value == "true" => Constant::Null,
        "intValue" => Constant::Int(value.parse().map_err(|_| bad())?),
        "longValue" => Constant::Long(value.parse().map_err(|_| bad())?),
        "floatValue" => Constant::float(value.parse().map_err(|_| bad())?),
        "doubleValue" => Constant::double(value.parse().map_err(|_| bad())?),
        "stringValue" => Constant::String(value.to_owned()),
        "classValue" => Constant::Type(internal_name(value)),
        _ => return Err(bad()),
    };
    Ok(constant)
}

#[cfg(test)]
mod tests;
