//! External stores for offloaded blob, attachment and filepath contents.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::relock;
use crate::value::Value;

/// An opaque reference to stored contents, persisted in the attribute's
/// column in place of the contents themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreRef {
    bytes: Vec<u8>,
}

impl StoreRef {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_value(self) -> Value {
        Value::Bytes(self.bytes)
    }
}

/// Where offloaded contents go. One store per configured store name.
pub trait ExternalStore: Send + Sync {
    /// Store raw packed contents, returning the reference to persist.
    fn put(&self, contents: &[u8]) -> Result<StoreRef>;

    /// Store a file attachment: name and contents travel together.
    fn upload_attachment(&self, path: &Path) -> Result<StoreRef>;

    /// Track a managed file by path, storing its contents.
    fn upload_filepath(&self, path: &Path) -> Result<StoreRef>;
}

/// Content-addressed in-memory store used in tests and small deployments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, reference: &StoreRef) -> Option<Vec<u8>> {
        relock(&self.objects).get(reference.as_bytes()).cloned()
    }

    pub fn len(&self) -> usize {
        relock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        relock(&self.objects).is_empty()
    }

    fn insert(&self, contents: Vec<u8>) -> StoreRef {
        let digest = Sha256::digest(&contents).to_vec();
        relock(&self.objects).insert(digest.clone(), contents);
        StoreRef::new(digest)
    }
}

impl ExternalStore for MemoryStore {
    fn put(&self, contents: &[u8]) -> Result<StoreRef> {
        Ok(self.insert(contents.to_vec()))
    }

    fn upload_attachment(&self, path: &Path) -> Result<StoreRef> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Store(format!("attachment path has no file name: {}", path.display())))?;
        let contents = std::fs::read(path)?;
        let mut object = name.as_bytes().to_vec();
        object.push(0);
        object.extend_from_slice(&contents);
        Ok(self.insert(object))
    }

    fn upload_filepath(&self, path: &Path) -> Result<StoreRef> {
        let contents = std::fs::read(path)?;
        Ok(self.insert(contents))
    }
}
