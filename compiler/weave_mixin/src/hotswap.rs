//! Hot reload of mixin definitions.
//!
//! # Algorithm
//!
//! 1. [`MixinTransformer::reload`] swaps in the new mixin descriptor and
//!    reports the already transformed targets.
//! 2. For each target, the pristine original preserved on its first
//!    transform is re-transformed through a brand-new context.
//! 3. The result goes to the host through [`HotSwapTransport`].
//!
//! Failures are collected per target. A target whose original was never
//! preserved, whose transformation fails, or whose redefinition the host
//! rejects is reported without affecting the others.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{error, info};

use crate::error::{ReloadError, TransformError};
use crate::transformer::MixinTransformer;

/// Hands re-transformed classes back to the host.
pub trait HotSwapTransport: Send + Sync {
    fn redefine(&self, name: &str, bytes: &[u8]) -> Result<(), String>;
}

/// Write-once store of the original bytes of every transformed class.
#[derive(Default)]
pub struct OriginalBytecodeStore {
    originals: DashMap<String, Arc<[u8]>>,
}

impl OriginalBytecodeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `bytes` as the original of `name` unless one is already kept.
    /// Returns whether `bytes` were stored.
    pub fn preserve(&self, name: &str, bytes: &[u8]) -> bool {
        let mut stored = false;
        self.originals.entry(name.to_owned()).or_insert_with(|| {
            stored = true;
            Arc::from(bytes)
        });
        stored
    }

    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.originals.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.originals.contains_key(name)
    }

    /// Forget the original of `name`, once the host unloaded the class.
    pub fn remove(&self, name: &str) -> bool {
        self.originals.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ReloadFailure {
    #[error("original bytes were not preserved")]
    MissingOriginal,
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("host rejected the redefinition: {0}")]
    Transport(String),
}

/// Outcome of one mixin redefinition.
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub redefined: Vec<String>,
    pub failed: Vec<(String, ReloadFailure)>,
}

impl ReloadReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failed_targets(&self) -> Vec<&str> {
        self.failed.iter().map(|(t, _)| t.as_str()).collect()
    }
}

pub struct HotSwap {
    transformer: Arc<MixinTransformer>,
    transport: Arc<dyn HotSwapTransport>,
}

impl HotSwap {
    pub fn new(transformer: Arc<MixinTransformer>, transport: Arc<dyn HotSwapTransport>) -> Self {
        HotSwap {
            transformer,
            transport,
        }
    }

    /// Replace mixin `mixin` with `bytes` and redefine every target it was
    /// already applied to.
    pub fn redefine_mixin(&self, mixin: &str, bytes: &[u8]) -> Result<ReloadReport, ReloadError> {
        let targets = self.transformer.reload(mixin, bytes).map_err(|err| {
            error!(mixin, error = %err, "mixin reload rejected");
            err
        })?;

        let mut report = ReloadReport::default();
        for target in targets {
            match self.redefine_target(&target) {
                Ok(()) => report.redefined.push(target),
                Err(failure) => {
                    error!(mixin, target = %target, error = %failure, "could not redefine target");
                    report.failed.push((target, failure));
                }
            }
        }
        info!(
            mixin,
            redefined = report.redefined.len(),
            failed = report.failed.len(),
            "hot swap finished"
        );
        Ok(report)
    }

    fn redefine_target(&self, target: &str) -> Result<(), ReloadFailure> {
        let original = self
            .transformer
            .originals()
            .and_then(|store| store.get(target))
            .ok_or(ReloadFailure::MissingOriginal)?;
        let bytes = self.transformer.retransform(target, &original)?;
        self.transport
            .redefine(target, &bytes)
            .map_err(ReloadFailure::Transport)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn originals_are_write_once() {
        let store = OriginalBytecodeStore::new();
        assert!(store.preserve("a/T", b"first"));
        assert!(!store.preserve("a/T", b"second"));
        assert_eq!(&*store.get("a/T").unwrap(), b"first");
        assert_eq!(store.len(), 1);

        assert!(store.remove("a/T"));
        assert!(!store.contains("a/T"));
        assert!(store.is_empty());
    }

    #[test]
    fn concurrent_preserve_keeps_one_original() {
        use rayon::prelude::*;

        let store = OriginalBytecodeStore::new();
        let stored = (0..64u8)
            .into_par_iter()
            .filter(|i| store.preserve("a/T", &[*i]))
            .count();
        assert_eq!(stored, 1);
        assert_eq!(store.len(), 1);
    }
}
