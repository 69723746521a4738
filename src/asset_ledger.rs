// Image asset ledger: tracks uploaded media keys per owning entity and is the
// only component allowed to issue remote-storage deletes

use async_trait::async_trait;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetStoreError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("delete failed: {0}")]
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedAsset {
    pub url: String,
    // Storage-provider key, distinct from the public URL
    pub key: String,
}

// Remote asset store collaborator (the upload provider behind the ledger)
#[async_trait]
pub trait AssetStore: Send + Sync + 'static {
    async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<UploadedAsset, AssetStoreError>;
    async fn delete(&self, key: &str) -> Result<(), AssetStoreError>;
}

// In-memory asset store with failure injection and a delete log, in the same
// spirit as a mock upload provider: tests assert against the recorded calls.
pub struct InMemoryAssetStore {
    objects: DashMap<String, Vec<u8>>,
    deleted_keys: parking_lot::Mutex<Vec<String>>,
    fail_next_uploads: AtomicUsize,
    fail_next_deletes: AtomicUsize,
}

impl Default for InMemoryAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            deleted_keys: parking_lot::Mutex::new(Vec::new()),
            fail_next_uploads: AtomicUsize::new(0),
            fail_next_deletes: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_uploads(&self, count: usize) {
        self.fail_next_uploads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_deletes(&self, count: usize) {
        self.fail_next_deletes.store(count, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    // Every delete call issued against the store, in order
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted_keys.lock().clone()
    }
}

#[async_trait]
impl AssetStore for InMemoryAssetStore {
    async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<UploadedAsset, AssetStoreError> {
        let fail_count = self.fail_next_uploads.load(Ordering::SeqCst);
        if fail_count > 0 {
            self.fail_next_uploads.store(fail_count - 1, Ordering::SeqCst);
            return Err(AssetStoreError::Upload("injected upload failure".to_string()));
        }

        let key = format!("img-{:08x}-{}", rand::random::<u32>(), filename);
        let url = format!("https://assets.example.com/{}", key);
        self.objects.insert(key.clone(), data);
        Ok(UploadedAsset { url, key })
    }

    async fn delete(&self, key: &str) -> Result<(), AssetStoreError> {
        let fail_count = self.fail_next_deletes.load(Ordering::SeqCst);
        if fail_count > 0 {
            self.fail_next_deletes.store(fail_count - 1, Ordering::SeqCst);
            return Err(AssetStoreError::Delete("injected delete failure".to_string()));
        }

        self.deleted_keys.lock().push(key.to_string());
        self.objects.remove(key);
        Ok(())
    }
}

// The entity (and slot) an asset hangs off. An asset with no owner and no
// pending draft is orphaned and eligible for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetOwner {
    Hotel(String),
    Room(String),
}

impl fmt::Display for AssetOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetOwner::Hotel(id) => write!(f, "hotel:{}", id),
            AssetOwner::Room(id) => write!(f, "room:{}", id),
        }
    }
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("asset key not found: {0}")]
    NotFound(String),

    #[error("asset storage error: {0}")]
    Storage(String),
}

#[derive(Debug, Default)]
struct LedgerStats {
    uploads: AtomicUsize,
    attached: AtomicUsize,
    replaced: AtomicUsize,
    released: AtomicUsize,
    release_retries: AtomicUsize,
    delete_failures: AtomicUsize,
    unknown_keys: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LedgerStatsReport {
    pub uploads: usize,
    pub attached: usize,
    pub replaced: usize,
    pub released: usize,
    pub release_retries: usize,
    pub delete_failures: usize,
    pub unknown_keys: usize,
}

pub struct ImageAssetLedger {
    store: Arc<dyn AssetStore>,
    // owner -> current key, and the reverse
    owners: DashMap<AssetOwner, String>,
    keys: DashMap<String, AssetOwner>,
    // Uploaded through the ledger but not yet attached to a persisted entity
    pending: DashMap<String, ()>,
    // Keys whose remote delete already succeeded; a retried release is a no-op
    released: DashMap<String, ()>,
    stats: LedgerStats,
}

impl ImageAssetLedger {
    pub fn new(store: Arc<dyn AssetStore>) -> Self {
        Self {
            store,
            owners: DashMap::new(),
            keys: DashMap::new(),
            pending: DashMap::new(),
            released: DashMap::new(),
            stats: LedgerStats::default(),
        }
    }

    // Upload through the ledger so the key is tracked from the start; until
    // attach the key counts as a pending draft upload.
    pub async fn upload(
        &self,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<UploadedAsset, LedgerError> {
        let asset = self
            .store
            .upload(filename, data)
            .await
            .map_err(|e| LedgerError::Storage(e.to_string()))?;
        self.pending.insert(asset.key.clone(), ());
        self.stats.uploads.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(key = %asset.key, "asset uploaded");
        Ok(asset)
    }

    // Associates the asset with an entity slot, replacing any prior key for
    // that slot. Returns the replaced key so the caller can release it once
    // the record mutation is committed.
    pub fn attach(&self, owner: AssetOwner, key: &str) -> Option<String> {
        if self
            .owners
            .get(&owner)
            .map_or(false, |current| current.as_str() == key)
        {
            return None;
        }

        self.pending.remove(key);
        self.keys.insert(key.to_string(), owner.clone());
        let replaced = self.owners.insert(owner.clone(), key.to_string());
        if let Some(ref old_key) = replaced {
            self.keys.remove(old_key);
            self.stats.replaced.fetch_add(1, Ordering::SeqCst);
        }
        self.stats.attached.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%owner, key, "asset attached");
        replaced
    }

    pub fn key_for(&self, owner: &AssetOwner) -> Option<String> {
        self.owners.get(owner).map(|entry| entry.clone())
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    // Deletes the remote object and drops the ledger entry. Remote delete
    // happens first: a crash after it leaves a dangling unused asset, never a
    // record pointing at a deleted one. A retry after a successful release is
    // idempotent; an unknown key is an error.
    pub async fn release(&self, key: &str) -> Result<(), LedgerError> {
        if self.released.contains_key(key) {
            self.stats.release_retries.fetch_add(1, Ordering::SeqCst);
            return Ok(());
        }

        let known = self.keys.contains_key(key) || self.pending.contains_key(key);
        if !known {
            self.stats.unknown_keys.fetch_add(1, Ordering::SeqCst);
            return Err(LedgerError::NotFound(key.to_string()));
        }

        self.store.delete(key).await.map_err(|e| {
            self.stats.delete_failures.fetch_add(1, Ordering::SeqCst);
            LedgerError::Storage(e.to_string())
        })?;

        if let Some((_, owner)) = self.keys.remove(key) {
            self.owners.remove(&owner);
        }
        self.pending.remove(key);
        self.released.insert(key.to_string(), ());
        self.stats.released.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(key, "asset released");
        Ok(())
    }

    // Cleanup for abandoned drafts: releases every upload that never got
    // attached to a persisted entity. Returns how many were released.
    pub async fn sweep_pending(&self) -> usize {
        let keys: Vec<String> = self.pending.iter().map(|entry| entry.key().clone()).collect();
        let mut swept = 0;
        for key in keys {
            match self.release(&key).await {
                Ok(()) => swept += 1,
                Err(e) => tracing::warn!(key, error = %e, "orphan sweep failed for key"),
            }
        }
        swept
    }

    pub fn stats(&self) -> LedgerStatsReport {
        LedgerStatsReport {
            uploads: self.stats.uploads.load(Ordering::SeqCst),
            attached: self.stats.attached.load(Ordering::SeqCst),
            replaced: self.stats.replaced.load(Ordering::SeqCst),
            released: self.stats.released.load(Ordering::SeqCst),
            release_retries: self.stats.release_retries.load(Ordering::SeqCst),
            delete_failures: self.stats.delete_failures.load(Ordering::SeqCst),
            unknown_keys: self.stats.unknown_keys.load(Ordering::SeqCst),
        }
    }
}
