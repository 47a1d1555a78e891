//! In-process BLAKE3-addressed object store.
//!
//! The reference implementation of the store contracts: deterministic
//! content addressing with no external process, used by unit tests,
//! scenario tests, and benches. Payloads are hashed with a kind prefix so
//! a blob and a tree with coincidentally equal serializations cannot
//! collide.
//!
//! Tree entries are canonicalized (sorted by name) before hashing and
//! storage, so writing the same content-set in any declared order yields
//! the same id — the idempotence the engine's identity-preservation check
//! relies on.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::{CommitStore, ObjectStore, StoreError};
use crate::commit::Commit;
use crate::object::{Entry, ObjectId};

#[derive(Debug, Clone)]
enum StoredObject {
    Blob(Vec<u8>),
    Tree(Vec<Entry>),
    Commit(Commit),
}

/// Concurrent in-memory store with write counters.
///
/// The counters exist so tests can assert *absence* of writes (identity
/// preservation) and measure write amplification, not just final state.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ObjectId, StoredObject>,
    tree_writes: AtomicU64,
    blob_writes: AtomicU64,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct objects currently stored.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Count of `write_tree` calls that stored a *new* tree.
    #[must_use]
    pub fn tree_writes(&self) -> u64 {
        self.tree_writes.load(Ordering::Relaxed)
    }

    /// Count of `write_blob` calls that stored a *new* blob.
    #[must_use]
    pub fn blob_writes(&self) -> u64 {
        self.blob_writes.load(Ordering::Relaxed)
    }

    /// Whether an object with this id exists.
    #[must_use]
    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    fn hash_payload(kind: &str, payload: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(kind.as_bytes());
        hasher.update(b"\0");
        hasher.update(payload);
        let hex = hasher.finalize().to_hex().to_string();
        ObjectId::from_hex(&hex).expect("blake3 hex digest is always a valid id")
    }

    fn canonical_tree_payload(entries: &[Entry]) -> Vec<u8> {
        let mut sorted: Vec<&Entry> = entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));
        let mut payload = String::new();
        for entry in sorted {
            payload.push_str(&format!(
                "{} {} {}\t{}\n",
                entry.mode,
                entry.kind.token(),
                entry.id,
                entry.name
            ));
        }
        payload.into_bytes()
    }

    fn get(&self, id: &ObjectId) -> Result<StoredObject, StoreError> {
        self.objects
            .get(id)
            .map(|stored| stored.clone())
            .ok_or_else(|| StoreError::Missing { id: id.clone() })
    }
}

impl ObjectStore for MemoryStore {
    fn list_tree(&self, id: &ObjectId) -> Result<Vec<Entry>, StoreError> {
        match self.get(id)? {
            StoredObject::Tree(entries) => Ok(entries),
            _ => Err(StoreError::WrongKind {
                id: id.clone(),
                expected: "tree",
            }),
        }
    }

    fn write_tree(&self, entries: &[Entry]) -> Result<ObjectId, StoreError> {
        let payload = Self::canonical_tree_payload(entries);
        let id = Self::hash_payload("tree", &payload);
        if !self.objects.contains_key(&id) {
            let mut canonical = entries.to_vec();
            canonical.sort_by(|a, b| a.name.cmp(&b.name));
            self.objects
                .insert(id.clone(), StoredObject::Tree(canonical));
            self.tree_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(id)
    }

    fn read_blob(&self, id: &ObjectId) -> Result<Vec<u8>, StoreError> {
        match self.get(id)? {
            StoredObject::Blob(bytes) => Ok(bytes),
            _ => Err(StoreError::WrongKind {
                id: id.clone(),
                expected: "blob",
            }),
        }
    }

    fn write_blob(&self, bytes: &[u8]) -> Result<ObjectId, StoreError> {
        let id = Self::hash_payload("blob", bytes);
        if !self.objects.contains_key(&id) {
            self.objects
                .insert(id.clone(), StoredObject::Blob(bytes.to_vec()));
            self.blob_writes.fetch_add(1, Ordering::Relaxed);
        }
        Ok(id)
    }
}

impl CommitStore for MemoryStore {
    fn read_commit(&self, id: &ObjectId) -> Result<Commit, StoreError> {
        match self.get(id)? {
            StoredObject::Commit(commit) => Ok(commit),
            _ => Err(StoreError::WrongKind {
                id: id.clone(),
                expected: "commit",
            }),
        }
    }

    fn write_commit(&self, commit: &Commit) -> Result<ObjectId, StoreError> {
        let id = Self::hash_payload("commit", &commit.to_bytes());
        self.objects
            .entry(id.clone())
            .or_insert_with(|| StoredObject::Commit(commit.clone()));
        Ok(id)
    }
}
