//! Host-binary providers.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use weave_ir::{ClassNode, CodecError};

/// Supplies the bytes of classes the registry has not seen yet.
///
/// Implemented by the loading environment. Returning `None` means the class
/// is unknown; the registry then treats it as unresolvable.
pub trait ClassProvider: Send + Sync {
    fn class_bytes(&self, name: &str) -> Option<Vec<u8>>;
}

/// A provider backed by an in-memory map of encoded classes.
#[derive(Default)]
pub struct InMemoryProvider {
    classes: RwLock<FxHashMap<String, Vec<u8>>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode and store a class under its own name.
    pub fn insert(&self, class: &ClassNode) -> Result<(), CodecError> {
        let bytes = class.to_bytes()?;
        self.insert_bytes(&class.name, bytes);
        Ok(())
    }

    /// Store raw bytes under `name`, replacing any previous entry.
    pub fn insert_bytes(&self, name: &str, bytes: Vec<u8>) {
        self.classes.write().insert(name.to_owned(), bytes);
    }
}

impl ClassProvider for InMemoryProvider {
    fn class_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.classes.read().get(name).cloned()
    }
}
