//! Per-class structural metadata.

use std::fmt;

use parking_lot::RwLock;
use weave_ir::annotation::known;
use weave_ir::{AccessFlags, ClassNode, MemberKey};

/// A method or field signature plus its access flags.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberInfo {
    pub key: MemberKey,
    pub access: AccessFlags,
}

impl MemberInfo {
    pub fn new(key: MemberKey, access: AccessFlags) -> Self {
        MemberInfo { key, access }
    }

    pub fn is_static(&self) -> bool {
        self.access.contains(AccessFlags::STATIC)
    }
}

/// Members contributed by merges after the class was first described.
#[derive(Default)]
struct MergedMembers {
    methods: Vec<MemberInfo>,
    fields: Vec<MemberInfo>,
}

/// Structural metadata of one class.
///
/// Immutable once built, except for the append-only, deduplicated record of
/// members merged in by mixins.
pub struct ClassInfo {
    name: String,
    super_name: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<MemberInfo>,
    fields: Vec<MemberInfo>,
    is_interface: bool,
    is_mixin: bool,
    merged: RwLock<MergedMembers>,
}

impl ClassInfo {
    /// Describe a class tree.
    pub fn from_class(class: &ClassNode) -> Self {
        ClassInfo {
            name: class.name.clone(),
            super_name: class.super_name.clone(),
            interfaces: class.interfaces.clone(),
            methods: class
                .methods
                .iter()
                .map(|m| MemberInfo::new(m.key(), m.access))
                .collect(),
            fields: class
                .fields
                .iter()
                .map(|f| MemberInfo::new(f.key(), f.access))
                .collect(),
            is_interface: class.is_interface(),
            is_mixin: class.annotation(known::MIXIN).is_some(),
            merged: RwLock::new(MergedMembers::default()),
        }
    }

    /// The hierarchy root. Always resolvable, never fetched.
    pub(crate) fn object() -> Self {
        ClassInfo {
            name: weave_ir::OBJECT.to_owned(),
            super_name: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            is_interface: false,
            is_mixin: false,
            merged: RwLock::new(MergedMembers::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn super_name(&self) -> Option<&str> {
        self.super_name.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn is_mixin(&self) -> bool {
        self.is_mixin
    }

    /// Methods declared by the class bytes.
    pub fn declared_methods(&self) -> &[MemberInfo] {
        &self.methods
    }

    /// Fields declared by the class bytes.
    pub fn declared_fields(&self) -> &[MemberInfo] {
        &self.fields
    }

    /// Methods contributed by merges, in merge order.
    pub fn merged_methods(&self) -> Vec<MemberInfo> {
        self.merged.read().methods.clone()
    }

    pub fn merged_fields(&self) -> Vec<MemberInfo> {
        self.merged.read().fields.clone()
    }

    /// Look up a method declared or merged into this class.
    pub fn find_method(&self, name: &str, desc: &str) -> Option<MemberInfo> {
        find(&self.methods, name, desc)
            .or_else(|| find(&self.merged.read().methods, name, desc))
    }

    /// Look up a field declared or merged into this class.
    pub fn find_field(&self, name: &str, desc: &str) -> Option<MemberInfo> {
        find(&self.fields, name, desc).or_else(|| find(&self.merged.read().fields, name, desc))
    }

    /// Record a method merged in by a mixin. Returns `false` if the method is
    /// already known.
    pub fn add_merged_method(&self, member: MemberInfo) -> bool {
        if find(&self.methods, &member.key.name, &member.key.desc).is_some() {
            return false;
        }
        let mut merged = self.merged.write();
        if merged.methods.iter().any(|m| m.key == member.key) {
            return false;
        }
        merged.methods.push(member);
        true
    }

    /// Record a field merged in by a mixin. Returns `false` if the field is
    /// already known.
    pub fn add_merged_field(&self, member: MemberInfo) -> bool {
        if find(&self.fields, &member.key.name, &member.key.desc).is_some() {
            return false;
        }
        let mut merged = self.merged.write();
        if merged.fields.iter().any(|f| f.key == member.key) {
            return false;
        }
        merged.fields.push(member);
        true
    }

    /// Direct supertypes: superclass first, then interfaces.
    pub(crate) fn supertypes(&self) -> impl Iterator<Item = &str> {
        self.super_name
            .as_deref()
            .into_iter()
            .chain(self.interfaces.iter().map(String::as_str))
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("name", &self.name)
            .field("super_name", &self.super_name)
            .field("interfaces", &self.interfaces)
            .field("is_interface", &self.is_interface)
            .field("is_mixin", &self.is_mixin)
            .finish_non_exhaustive()
    }
}

fn find(members: &[MemberInfo], name: &str, desc: &str) -> Option<MemberInfo> {
    members
        .iter()
        .find(|m| m.key.name == name && m.key.desc == desc)
        .cloned()
}
