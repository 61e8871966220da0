//! Process-local vector store ranking entries by cosine distance.

use super::{IndexEntry, StoreError, StoredMatch, VectorStore};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory vector store guarded by a single reader/writer lock.
///
/// A whole `upsert` batch is validated before the write lock is taken and applied under one
/// guard, so readers never observe a half-written batch.
pub struct MemoryStore {
    name: String,
    dimension: usize,
    entries: RwLock<Vec<IndexEntry>>,
}

impl MemoryStore {
    /// Create an empty store accepting vectors of `dimension` components.
    pub fn new(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            entries: RwLock::new(Vec::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<IndexEntry>> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<IndexEntry>> {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_dimension(&self, actual: usize) -> Result<(), StoreError> {
        if actual == self.dimension {
            Ok(())
        } else {
            Err(StoreError::DimensionMismatch {
                expected: self.dimension,
                actual,
            })
        }
    }
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<(), StoreError> {
        for entry in &entries {
            self.check_dimension(entry.vector.len())?;
        }

        let incoming: HashSet<&str> = entries.iter().map(|entry| entry.id.as_str()).collect();
        let mut guard = self.write();
        guard.retain(|existing| !incoming.contains(existing.id.as_str()));
        drop(incoming);
        let added = entries.len();
        guard.extend(entries);
        tracing::debug!(
            collection = %self.name,
            added,
            total = guard.len(),
            "Entries stored"
        );
        Ok(())
    }

    async fn query(&self, vector: Vec<f32>, k: usize) -> Result<Vec<StoredMatch>, StoreError> {
        self.check_dimension(vector.len())?;
        let guard = self.read();
        let mut scored: Vec<(f32, &IndexEntry)> = guard
            .iter()
            .map(|entry| (cosine_distance(&vector, &entry.vector), entry))
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(distance, entry)| StoredMatch {
                id: entry.id.clone(),
                document: entry.document.clone(),
                metadata: entry.metadata.clone(),
                distance,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.read().len())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.write();
        let removed = guard.len();
        guard.clear();
        tracing::info!(collection = %self.name, removed, "Collection cleared");
        Ok(())
    }
}

/// Cosine distance in `[0, 2]`; a zero vector is treated as orthogonal to everything.
pub(crate) fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    let similarity = (dot / (norm_a * norm_b)).clamp(-1.0, 1.0);
    1.0 - similarity
}
