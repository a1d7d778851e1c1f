//! Class, method and field nodes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::access::AccessFlags;
use crate::annotation::{self, Annotation};
use crate::insn::InsnList;

/// Identity of a method or field within one class: name plus descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberKey {
    pub name: String,
    pub desc: String,
}

impl MemberKey {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        MemberKey {
            name: name.into(),
            desc: desc.into(),
        }
    }

    /// Whether this is a method key (descriptors of methods start with `(`).
    pub fn is_method(&self) -> bool {
        self.desc.starts_with('(')
    }
}

impl fmt::Display for MemberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_method() {
            write!(f, "{}{}", self.name, self.desc)
        } else {
            write!(f, "{}:{}", self.name, self.desc)
        }
    }
}

// ── Fields ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNode {
    pub access: AccessFlags,
    pub name: String,
    pub desc: String,
    pub signature: Option<String>,
    pub annotations: Vec<Annotation>,
}

impl FieldNode {
    pub fn new(access: AccessFlags, name: impl Into<String>, desc: impl Into<String>) -> Self {
        FieldNode {
            access,
            name: name.into(),
            desc: desc.into(),
            signature: None,
            annotations: Vec::new(),
        }
    }

    pub fn key(&self) -> MemberKey {
        MemberKey::new(&self.name, &self.desc)
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn annotation(&self, desc: &str) -> Option<&Annotation> {
        annotation::find(&self.annotations, desc)
    }
}

// ── Methods ─────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodNode {
    pub access: AccessFlags,
    pub name: String,
    pub desc: String,
    pub signature: Option<String>,
    pub annotations: Vec<Annotation>,
    pub insns: InsnList,
    pub max_locals: u16,
    pub max_stack: u16,
}

impl MethodNode {
    pub fn new(access: AccessFlags, name: impl Into<String>, desc: impl Into<String>) -> Self {
        MethodNode {
            access,
            name: name.into(),
            desc: desc.into(),
            signature: None,
            annotations: Vec::new(),
            insns: InsnList::new(),
            max_locals: 0,
            max_stack: 0,
        }
    }

    pub fn key(&self) -> MemberKey {
        MemberKey::new(&self.name, &self.desc)
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }

    pub fn is_abstract(&self) -> bool {
        self.access.contains(AccessFlags::ABSTRACT)
    }

    /// Constructors and static initializers.
    pub fn is_initializer(&self) -> bool {
        self.name.starts_with('<')
    }

    pub fn annotation(&self, desc: &str) -> Option<&Annotation> {
        annotation::find(&self.annotations, desc)
    }

    /// Remove every annotation with descriptor `desc`.
    pub fn remove_annotation(&mut self, desc: &str) {
        self.annotations.retain(|a| a.desc != desc);
    }

    /// Replace (or add) the annotation with the same descriptor as `ann`.
    pub fn put_annotation(&mut self, ann: Annotation) {
        if let Some(slot) = self.annotations.iter_mut().find(|a| a.desc == ann.desc) {
            *slot = ann;
        } else {
            self.annotations.push(ann);
        }
    }
}

// ── Classes ─────────────────────────────────────────────────────────

/// One class in tree form.
///
/// Member order is significant: it is preserved by the codec and by every
/// merge, which keeps repeated transformations byte-identical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassNode {
    pub access: AccessFlags,
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub signature: Option<String>,
    pub source_file: Option<String>,
    pub annotations: Vec<Annotation>,
    pub fields: Vec<FieldNode>,
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub fn new(access: AccessFlags, name: impl Into<String>) -> Self {
        ClassNode {
            access,
            name: name.into(),
            super_name: Some(crate::OBJECT.to_owned()),
            interfaces: Vec::new(),
            signature: None,
            source_file: None,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    pub fn annotation(&self, desc: &str) -> Option<&Annotation> {
        annotation::find(&self.annotations, desc)
    }

    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodNode> {
        self.methods.iter().find(|m| m.name == name && m.desc == desc)
    }

    pub fn method_mut(&mut self, name: &str, desc: &str) -> Option<&mut MethodNode> {
        self.methods
            .iter_mut()
            .find(|m| m.name == name && m.desc == desc)
    }

    pub fn method_index(&self, key: &MemberKey) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == key.name && m.desc == key.desc)
    }

    pub fn field(&self, name: &str, desc: &str) -> Option<&FieldNode> {
        self.fields.iter().find(|f| f.name == name && f.desc == desc)
    }

    pub fn field_mut(&mut self, name: &str, desc: &str) -> Option<&mut FieldNode> {
        self.fields
            .iter_mut()
            .find(|f| f.name == name && f.desc == desc)
    }

    /// Add an interface unless already declared.
    pub fn add_interface(&mut self, name: &str) -> bool {
        if self.interfaces.iter().any(|i| i == name) {
            return false;
        }
        self.interfaces.push(name.to_owned());
        true
    }
}
