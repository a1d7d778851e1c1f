//! Generic class signatures.
//!
//! A class signature lists formal type parameters, the generic superclass and
//! generic interfaces: `<T:Ljava/lang/Object;>La/Base<TT;>;La/Iface;`.
//!
//! Mixins that add interfaces or type parameters must have them reflected in
//! the target's signature. [`ClassSignature`] is the accumulator a target
//! context builds from the target's own signature and merges every applied
//! mixin into, then writes back once all mixins are applied.

use std::fmt;

use crate::desc::DescError;
use crate::node::ClassNode;

/// One formal type parameter: name plus its bound text (`:Ljava/lang/Object;`,
/// `::La/Iface;`, ...). Bounds are kept verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub bounds: String,
}

/// Parsed class signature.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassSignature {
    pub type_params: Vec<TypeParam>,
    pub super_class: String,
    pub interfaces: Vec<String>,
}

impl ClassSignature {
    /// Parse a class signature string.
    pub fn parse(sig: &str) -> Result<Self, DescError> {
        if sig.is_empty() {
            return Err(DescError::Empty);
        }
        let mut pos = 0;
        let mut type_params = Vec::new();

        if sig.starts_with('<') {
            pos = 1;
            loop {
                match sig.as_bytes().get(pos) {
                    Some(b'>') => {
                        pos += 1;
                        break;
                    }
                    Some(_) => {
                        let Some(colon) = sig[pos..].find(':') else {
                            return Err(malformed(sig, pos));
                        };
                        let name = sig[pos..pos + colon].to_owned();
                        let bounds_start = pos + colon;
                        let mut end = bounds_start;
                        while sig.as_bytes().get(end) == Some(&b':') {
                            end += 1;
                            if sig.as_bytes().get(end) == Some(&b':') {
                                continue;
                            }
                            end = reference_end(sig, end)?;
                        }
                        type_params.push(TypeParam {
                            name,
                            bounds: sig[bounds_start..end].to_owned(),
                        });
                        pos = end;
                    }
                    None => return Err(malformed(sig, pos)),
                }
            }
        }

        let super_end = reference_end(sig, pos)?;
        let super_class = sig[pos..super_end].to_owned();
        pos = super_end;

        let mut interfaces = Vec::new();
        while pos < sig.len() {
            let end = reference_end(sig, pos)?;
            interfaces.push(sig[pos..end].to_owned());
            pos = end;
        }

        Ok(ClassSignature {
            type_params,
            super_class,
            interfaces,
        })
    }

    /// The signature of `class`: its declared generic signature when present
    /// and parseable, otherwise one synthesized from its erased supertypes.
    pub fn of_class(class: &ClassNode) -> Self {
        if let Some(parsed) = class.signature.as_deref().and_then(|s| Self::parse(s).ok()) {
            return parsed;
        }
        let super_name = class.super_name.as_deref().unwrap_or(crate::OBJECT);
        ClassSignature {
            type_params: Vec::new(),
            super_class: format!("L{super_name};"),
            interfaces: class.interfaces.iter().map(|i| format!("L{i};")).collect(),
        }
    }

    /// Add the type parameters and interfaces of `other` that this signature
    /// does not already have. Interfaces compare by erased name.
    pub fn merge(&mut self, other: &ClassSignature) {
        for param in &other.type_params {
            if !self.type_params.iter().any(|p| p.name == param.name) {
                self.type_params.push(param.clone());
            }
        }
        for iface in &other.interfaces {
            self.add_interface_sig(iface);
        }
    }

    /// Add a raw interface by internal name, unless already present.
    pub fn add_interface(&mut self, internal_name: &str) {
        self.add_interface_sig(&format!("L{internal_name};"));
    }

    fn add_interface_sig(&mut self, iface: &str) {
        let erased = erasure(iface);
        if !self.interfaces.iter().any(|i| erasure(i) == erased) {
            self.interfaces.push(iface.to_owned());
        }
    }

    /// Erased internal names of the interfaces.
    pub fn interface_names(&self) -> Vec<&str> {
        self.interfaces.iter().map(|i| erasure(i)).collect()
    }
}

impl fmt::Display for ClassSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.type_params.is_empty() {
            f.write_str("<")?;
            for param in &self.type_params {
                write!(f, "{}{}", param.name, param.bounds)?;
            }
            f.write_str(">")?;
        }
        f.write_str(&self.super_class)?;
        for iface in &self.interfaces {
            f.write_str(iface)?;
        }
        Ok(())
    }
}

fn malformed(sig: &str, offset: usize) -> DescError {
    DescError::Malformed {
        desc: sig.to_owned(),
        offset,
    }
}

/// Erased internal name of a class type signature: `La/B<TT;>;` → `a/B`.
fn erasure(sig: &str) -> &str {
    let inner = sig.strip_prefix('L').unwrap_or(sig);
    let end = inner.find(['<', ';']).unwrap_or(inner.len());
    &inner[..end]
}

/// End offset (exclusive) of the reference type signature starting at `start`.
///
/// Handles class types with nested type arguments, type variables (`TT;`) and
/// arrays.
fn reference_end(sig: &str, start: usize) -> Result<usize, DescError> {
    let bytes = sig.as_bytes();
    match bytes.get(start) {
        Some(b'L') => {
            let mut depth = 0usize;
            let mut pos = start + 1;
            while let Some(&b) = bytes.get(pos) {
                match b {
                    b'<' => depth += 1,
                    b'>' => depth = depth.saturating_sub(1),
                    b';' if depth == 0 => return Ok(pos + 1),
                    _ => {}
                }
                pos += 1;
            }
            Err(malformed(sig, start))
        }
        Some(b'T') => sig[start..]
            .find(';')
            .map(|len| start + len + 1)
            .ok_or_else(|| malformed(sig, start)),
        Some(b'[') => reference_end(sig, start + 1),
        Some(b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z') => Ok(start + 1),
        _ => Err(malformed(sig, start)),
    }
}
