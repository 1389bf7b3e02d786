//! Per-merge-request descriptive metadata, cached across scans.
//!
//! The discovery engine writes entries while it scans; anything rendering
//! head metadata reads them concurrently. A full scan finishes by trimming
//! the cache to exactly the merge requests it saw; incremental scans never
//! evict.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Title/description metadata of an open merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequestMetadata {
    pub title: String,
    pub description: Option<String>,
    pub web_url: String,
}

/// The author identity of a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub username: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Cache of descriptive metadata for open merge requests, keyed by iid.
#[derive(Debug, Default)]
pub struct MergeRequestCache {
    metadata: RwLock<HashMap<u64, MergeRequestMetadata>>,
    contributors: RwLock<HashMap<u64, Contributor>>,
}

impl MergeRequestCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_metadata(&self, number: u64, metadata: MergeRequestMetadata) {
        self.write_metadata().insert(number, metadata);
    }

    pub fn put_contributor(&self, number: u64, contributor: Contributor) {
        self.write_contributors().insert(number, contributor);
    }

    pub fn metadata(&self, number: u64) -> Option<MergeRequestMetadata> {
        self.read_metadata().get(&number).cloned()
    }

    pub fn contributor(&self, number: u64) -> Option<Contributor> {
        self.read_contributors().get(&number).cloned()
    }

    /// Drop every entry whose number is not in `numbers`.
    pub fn retain_only(&self, numbers: &HashSet<u64>) {
        self.write_metadata().retain(|number, _| numbers.contains(number));
        self.write_contributors().retain(|number, _| numbers.contains(number));
    }

    pub fn len(&self) -> usize {
        self.read_metadata().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_metadata().is_empty()
    }

    fn read_metadata(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, MergeRequestMetadata>> {
        self.metadata.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_metadata(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u64, MergeRequestMetadata>> {
        self.metadata.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_contributors(&self) -> std::sync::RwLockReadGuard<'_, HashMap<u64, Contributor>> {
        self.contributors.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_contributors(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<u64, Contributor>> {
        self.contributors.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
