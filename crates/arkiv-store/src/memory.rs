//! In-memory storage backend for deterministic testing.
//!
//! Always compiled so downstream crates' tests can substitute it for
//! the filesystem backend without a feature dance.

use arkiv_core::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::backend::StorageBackend;

/// Memory-backed [`StorageBackend`].
#[derive(Default)]
pub struct MemoryBackend {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored. Handy for atomicity assertions.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Storage(format!("blob not found: {}", path)))
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.blobs.lock().unwrap().remove(path);
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.blobs.lock().unwrap().contains_key(path))
    }

    async fn stat(&self, path: &str) -> Result<(u64, Option<SystemTime>)> {
        let blobs = self.blobs.lock().unwrap();
        let data = blobs
            .get(path)
            .ok_or_else(|| Error::Storage(format!("blob not found: {}", path)))?;
        Ok((data.len() as u64, None))
    }
}
