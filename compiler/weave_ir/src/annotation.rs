//! Annotations attached to classes, methods and fields.
//!
//! Mixin declarations (`Lweave/Mixin;`, `Lweave/Inject;`, ...) and the
//! merged-by marker are all plain annotations. Values are kept in declaration
//! order so the encoded form is deterministic.

use serde::{Deserialize, Serialize};

/// A single annotation value.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<AnnotationValue>),
    Annotation(Annotation),
}

impl From<bool> for AnnotationValue {
    fn from(v: bool) -> Self {
        AnnotationValue::Bool(v)
    }
}

impl From<i64> for AnnotationValue {
    fn from(v: i64) -> Self {
        AnnotationValue::Int(v)
    }
}

impl From<i32> for AnnotationValue {
    fn from(v: i32) -> Self {
        AnnotationValue::Int(i64::from(v))
    }
}

impl From<&str> for AnnotationValue {
    fn from(v: &str) -> Self {
        AnnotationValue::Str(v.to_owned())
    }
}

impl From<String> for AnnotationValue {
    fn from(v: String) -> Self {
        AnnotationValue::Str(v)
    }
}

impl From<Annotation> for AnnotationValue {
    fn from(v: Annotation) -> Self {
        AnnotationValue::Annotation(v)
    }
}

impl<T: Into<AnnotationValue>> From<Vec<T>> for AnnotationValue {
    fn from(v: Vec<T>) -> Self {
        AnnotationValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// An annotation: a type descriptor plus named values.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub desc: String,
    pub values: Vec<(String, AnnotationValue)>,
}

impl Annotation {
    pub fn new(desc: impl Into<String>) -> Self {
        Annotation {
            desc: desc.into(),
            values: Vec::new(),
        }
    }

    /// Builder-style value setter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<AnnotationValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Set `key`, replacing any previous value in place.
    pub fn set(&mut self, key: &str, value: impl Into<AnnotationValue>) {
        let value = value.into();
        if let Some(slot) = self.values.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.values.push((key.to_owned(), value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&AnnotationValue> {
        self.values.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            AnnotationValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            AnnotationValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// String list value. A single string is treated as a one-element list.
    pub fn get_str_list(&self, key: &str) -> Vec<&str> {
        match self.get(key) {
            Some(AnnotationValue::Str(s)) => vec![s.as_str()],
            Some(AnnotationValue::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    AnnotationValue::Str(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Nested annotation list value. A single nested annotation is treated as
    /// a one-element list.
    pub fn get_annotations(&self, key: &str) -> Vec<&Annotation> {
        match self.get(key) {
            Some(AnnotationValue::Annotation(a)) => vec![a],
            Some(AnnotationValue::List(items)) => items
                .iter()
                .filter_map(|item| match item {
                    AnnotationValue::Annotation(a) => Some(a),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Descriptors of the annotations the engine reads and writes.
pub mod known {
    /// Class-level mixin declaration: `targets`, `priority`, `remap`.
    pub const MIXIN: &str = "Lweave/Mixin;";
    /// Soft-implements declaration: `iface`, `prefix`.
    pub const IMPLEMENTS: &str = "Lweave/Implements;";
    pub const OVERWRITE: &str = "Lweave/Overwrite;";
    pub const SHADOW: &str = "Lweave/Shadow;";
    /// Callback injector: `method`, `at`, `slice`, `require`.
    pub const INJECT: &str = "Lweave/Inject;";
    pub const REDIRECT: &str = "Lweave/Redirect;";
    pub const MODIFY_CONSTANT: &str = "Lweave/ModifyConstant;";
    /// Field accessor: `value` names the target field.
    pub const ACCESSOR: &str = "Lweave/Accessor;";
    /// Method invoker: `value` names the target method.
    pub const INVOKER: &str = "Lweave/Invoker;";
    /// Injection point locator: `value`, `target`, `ordinal`, `slice`,
    /// `args`, `opcode`.
    pub const AT: &str = "Lweave/At;";
    /// Slice declaration: `id`, `from`, `to`.
    pub const SLICE: &str = "Lweave/Slice;";
    /// Merged-by marker written on every member a mixin contributes:
    /// `mixin`, `priority`.
    pub const MIXIN_MERGED: &str = "Lweave/MixinMerged;";
    /// Per-target debug request: `export`, `print`.
    pub const DEBUG: &str = "Lweave/Debug;";
}

/// Find the first annotation with descriptor `desc`.
pub fn find<'a>(annotations: &'a [Annotation], desc: &str) -> Option<&'a Annotation> {
    annotations.iter().find(|a| a.desc == desc)
}
