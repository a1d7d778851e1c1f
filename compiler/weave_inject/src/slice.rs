//! Method slices.
//!
//! A slice bounds a locator search to a sub-range of a method body. `from`
//! resolves to its first match (or its ordinal match) over the whole method,
//! `to` to its last match (or its ordinal match). Both bounds are inclusive.
//! A slice that cannot be resolved, or whose end precedes its start, is an
//! error; there is no empty successful slice.

use std::ops::Range;

use weave_ir::annotation::known;
use weave_ir::{Annotation, Insn, InsnList};

use crate::error::InjectionError;
use crate::point::InjectionPoint;

/// A declared slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodSlice {
    pub id: String,
    pub from: Option<InjectionPoint>,
    pub to: Option<InjectionPoint>,
}

impl MethodSlice {
    pub fn new(id: &str, from: Option<InjectionPoint>, to: Option<InjectionPoint>) -> Self {
        MethodSlice {
            id: id.to_owned(),
            from,
            to,
        }
    }

    /// Parse an `Lweave/Slice;` annotation. A missing id is the default
    /// (empty) id.
    pub fn from_annotation(ann: &Annotation) -> Result<Self, InjectionError> {
        if ann.desc != known::SLICE {
            return Err(InjectionError::invalid(format!(
                "expected {} declaration, found {}",
                known::SLICE,
                ann.desc
            )));
        }
        let id = ann.get_str("id").unwrap_or_default();
        let bound = |key: &str| -> Result<Option<InjectionPoint>, InjectionError> {
            ann.get_annotations(key)
                .first()
                .map(|a| InjectionPoint::from_annotation(a))
                .transpose()
        };
        Ok(MethodSlice::new(id, bound("from")?, bound("to")?))
    }

    /// Resolve this slice against `insns`.
    pub fn resolve(&self, insns: &InsnList) -> Result<SliceView, InjectionError> {
        let body = insns.as_slice();
        if body.is_empty() {
            return Err(InjectionError::slice(&self.id, "method has no instructions"));
        }

        let start = match &self.from {
            None => 0,
            Some(point) => *point.find(body, 0).first().ok_or_else(|| {
                InjectionError::slice(&self.id, format!("`from` {point} matched nothing"))
            })?,
        };
        let end = match &self.to {
            None => body.len() - 1,
            Some(point) => *point.find(body, 0).last().ok_or_else(|| {
                InjectionError::slice(&self.id, format!("`to` {point} matched nothing"))
            })?,
        };
        if end < start {
            return Err(InjectionError::slice(
                &self.id,
                format!("end index {end} precedes start index {start}"),
            ));
        }

        tracing::debug!(slice = %self.id, start, end, "resolved slice");
        Ok(SliceView {
            start,
            end: end + 1,
            generation: insns.generation(),
        })
    }
}

// ── Views ───────────────────────────────────────────────────────────

/// A resolved, read-only range of a method body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceView {
    start: usize,
    /// Exclusive.
    end: usize,
    generation: u64,
}

impl SliceView {
    /// A view over the whole body.
    pub fn whole(insns: &InsnList) -> Self {
        SliceView {
            start: 0,
            end: insns.len(),
            generation: insns.generation(),
        }
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn start(&self) -> usize {
        self.start
    }

    /// Index of the last instruction in the view.
    pub fn last(&self) -> usize {
        self.end.saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether this view was resolved against the current state of `insns`.
    pub fn is_current(&self, insns: &InsnList) -> bool {
        self.generation == insns.generation() && self.end <= insns.len()
    }

    /// The instructions under this view.
    pub fn insns<'a>(&self, insns: &'a InsnList) -> &'a [Insn] {
        let body = insns.as_slice();
        &body[self.start.min(body.len())..self.end.min(body.len())]
    }
}

// ── Declared slice sets ─────────────────────────────────────────────

/// The slices one injector declares, keyed by id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Slices {
    slices: Vec<MethodSlice>,
}

impl Slices {
    /// Build a slice set, rejecting duplicate ids.
    pub fn new(slices: Vec<MethodSlice>) -> Result<Self, InjectionError> {
        for (i, slice) in slices.iter().enumerate() {
            if slices[..i].iter().any(|s| s.id == slice.id) {
                return Err(InjectionError::slice(&slice.id, "duplicate slice id"));
            }
        }
        Ok(Slices { slices })
    }

    pub fn get(&self, id: &str) -> Option<&MethodSlice> {
        self.slices.iter().find(|s| s.id == id)
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }
}

#[cfg(test)]
mod tests;
