//! Lazy, cached probing of a head's file tree.
//!
//! Criteria evaluation must not pull content it never looks at, and a
//! rate-limited API must not be asked twice for the same answer. Every
//! remote fact is therefore resolved at most once: flat [`HeadProbe::stat`]
//! answers are memoized per path, and each [`FileNode`] carries a small
//! state machine that remembers what the remote already said about it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::error::{RemoteError, Result, SourceError};
use crate::head::{Head, Revision};
use crate::remote::models::{FileFetch, TreeEntry};
use crate::remote::RemoteClient;
use crate::util::RateLimitedWarner;

/// File mode marking a symbolic link in git tree listings.
const SYMLINK_MODE: &str = "120000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    RegularFile,
    Directory,
    Link,
    Other,
    Nonexistent,
}

/// Answer to a flat path probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStat {
    pub file_type: FileType,
    /// Set when no exact entry exists but a differently-cased one does - a
    /// diagnostic hint for case-insensitive checkouts, not a hit.
    pub alternative_path: Option<String>,
}

impl ProbeStat {
    pub fn from_type(file_type: FileType) -> Self {
        Self { file_type, alternative_path: None }
    }

    pub fn from_alternative_path(path: impl Into<String>) -> Self {
        Self { file_type: FileType::Nonexistent, alternative_path: Some(path.into()) }
    }

    pub fn exists(&self) -> bool {
        self.file_type != FileType::Nonexistent
    }
}

fn classify(entry: &TreeEntry) -> FileType {
    if entry.mode == SYMLINK_MODE {
        FileType::Link
    } else if entry.kind == "blob" {
        FileType::RegularFile
    } else if entry.kind == "tree" {
        FileType::Directory
    } else {
        FileType::Other
    }
}

/// Probe over one head's file tree at a specific ref.
pub struct HeadProbe {
    remote: Arc<dyn RemoteClient>,
    head: Head,
    revision: Option<Revision>,
    /// The ref all probing goes through: a pinned branch revision probes the
    /// commit hash, everything else the head's symbolic ref.
    reference: String,
    stats: Mutex<HashMap<String, ProbeStat>>,
    warner: Arc<RateLimitedWarner>,
}

impl HeadProbe {
    pub(crate) fn new(
        remote: Arc<dyn RemoteClient>,
        head: Head,
        revision: Option<Revision>,
        warner: Arc<RateLimitedWarner>,
    ) -> Self {
        let symbolic_ref = match &head {
            Head::Branch(branch) => format!("refs/heads/{}", branch.name),
            Head::MergeRequest(mr) => format!(
                "refs/merge-requests/{}/{}",
                mr.number,
                if mr.merge { "merge" } else { "head" }
            ),
        };
        let reference = match &revision {
            Some(Revision::Branch(rev)) => rev.hash.clone(),
            _ => symbolic_ref,
        };
        Self {
            remote,
            head,
            revision,
            reference,
            stats: Mutex::new(HashMap::new()),
            warner,
        }
    }

    /// The job-facing name of the probed head.
    pub fn name(&self) -> &str {
        self.head.name()
    }

    /// Classify `path` from its parent directory listing. Memoized.
    pub fn stat(&self, path: &str) -> Result<ProbeStat> {
        if let Some(hit) = self.lock_stats().get(path) {
            return Ok(hit.clone());
        }
        let stat = self.stat_uncached(path)?;
        self.lock_stats().insert(path.to_string(), stat.clone());
        Ok(stat)
    }

    fn stat_uncached(&self, path: &str) -> Result<ProbeStat> {
        let split = path.rfind('/').map(|i| i + 1).unwrap_or(0);
        let parent = &path[..split];
        let listing = match self.remote.tree(parent, &self.reference, false) {
            Ok(listing) => listing,
            Err(RemoteError::NotFound(_)) => {
                return Ok(ProbeStat::from_type(FileType::Nonexistent))
            }
            Err(e) => return Err(e.into()),
        };

        // An exact entry wins over a differently-cased one wherever either
        // appears in the listing.
        let mut alternative = None;
        for entry in &listing {
            if entry.path == path {
                return Ok(ProbeStat::from_type(classify(entry)));
            }
            if alternative.is_none() && entry.path.eq_ignore_ascii_case(path) {
                alternative = Some(entry.path.clone());
            }
        }
        Ok(match alternative {
            Some(other) => ProbeStat::from_alternative_path(other),
            None => ProbeStat::from_type(FileType::Nonexistent),
        })
    }

    /// Commit time of the probed revision, when it can be resolved.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        let looked_up = match (&self.revision, &self.head) {
            (Some(Revision::Branch(rev)), _) => {
                self.remote.commit(&rev.hash).map(|c| c.and_then(|c| c.committed_date))
            }
            (None, Head::Branch(branch)) => self
                .remote
                .branch(&branch.name)
                .map(|b| b.and_then(|b| b.commit.committed_date)),
            _ => Ok(None),
        };
        match looked_up {
            Ok(date) => date,
            Err(e) => {
                if self.warner.should_warn() {
                    log::warn!("could not resolve last-modified of {}: {}", self.head, e);
                }
                None
            }
        }
    }

    /// The root of the lazy file tree at this probe's ref.
    pub fn root(&self) -> FileNode {
        FileNode::root(self.remote.clone(), self.reference.clone())
    }

    fn lock_stats(&self) -> std::sync::MutexGuard<'_, HashMap<String, ProbeStat>> {
        self.stats.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Resolution state of one path node. Every transition is driven by at most
/// one remote round trip, and a node never re-asks a question it has an
/// answer to.
#[derive(Debug)]
enum NodeState {
    /// Type unknown; nothing fetched yet.
    Unresolved,
    /// Treated as directory-shaped without verification; confirmed on first
    /// access.
    DirectoryAssumed,
    /// Known directory; the listing is cached once fetched.
    Directory { entries: Option<Vec<TreeEntry>> },
    /// Known non-directory, classified by a parent listing or a file fetch;
    /// the body is cached once fetched.
    NonDirectory { file_type: FileType, content: Option<Vec<u8>> },
    /// The path does not exist at this ref. Terminal.
    Absent,
}

/// One node of a head's file tree, resolved lazily against the remote.
pub struct FileNode {
    remote: Arc<dyn RemoteClient>,
    reference: String,
    /// Repository-relative path; empty for the root.
    path: String,
    name: String,
    state: Mutex<NodeState>,
}

impl FileNode {
    fn root(remote: Arc<dyn RemoteClient>, reference: String) -> Self {
        Self {
            remote,
            reference,
            path: String::new(),
            name: String::new(),
            state: Mutex::new(NodeState::DirectoryAssumed),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A child node by name. `assume_directory` skips the probing round trip
    /// for paths the caller will only ever list.
    pub fn child(&self, name: &str, assume_directory: bool) -> FileNode {
        let path = if self.path.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", self.path, name)
        };
        FileNode {
            remote: self.remote.clone(),
            reference: self.reference.clone(),
            path,
            name: name.to_string(),
            state: Mutex::new(if assume_directory {
                NodeState::DirectoryAssumed
            } else {
                NodeState::Unresolved
            }),
        }
    }

    pub fn file_type(&self) -> Result<FileType> {
        let mut state = self.lock_state();
        self.resolve(&mut state)?;
        Ok(match &*state {
            NodeState::Directory { .. } => FileType::Directory,
            NodeState::NonDirectory { file_type, .. } => *file_type,
            _ => FileType::Nonexistent,
        })
    }

    pub fn exists(&self) -> Result<bool> {
        Ok(self.file_type()? != FileType::Nonexistent)
    }

    /// The file body. Fails typed on directories and absent paths.
    pub fn content(&self) -> Result<Vec<u8>> {
        let mut state = self.lock_state();
        self.resolve(&mut state)?;

        if matches!(&*state, NodeState::NonDirectory { content: None, .. }) {
            match self.remote.fetch_file(&self.path, &self.reference)? {
                FileFetch::File(bytes) => {
                    if let NodeState::NonDirectory { content, .. } = &mut *state {
                        *content = Some(bytes);
                    }
                }
                FileFetch::NotAFile => *state = NodeState::Directory { entries: None },
                FileFetch::Missing => *state = NodeState::Absent,
            }
        }

        match &*state {
            NodeState::NonDirectory { content: Some(bytes), .. } => Ok(bytes.clone()),
            NodeState::Directory { .. } | NodeState::DirectoryAssumed => {
                Err(SourceError::IsDirectory(self.path.clone()))
            }
            _ => Err(SourceError::NoSuchPath(self.path.clone())),
        }
    }

    /// Children of a directory node, typed from the cached listing.
    pub fn children(&self) -> Result<Vec<FileNode>> {
        let mut state = self.lock_state();
        self.resolve(&mut state)?;

        if matches!(&*state, NodeState::Directory { entries: None }) {
            *state = match self.list_directory()? {
                Some(entries) => NodeState::Directory { entries: Some(entries) },
                None => NodeState::Absent,
            };
        }

        match &*state {
            NodeState::Directory { entries: Some(entries) } => Ok(entries
                .iter()
                .map(|entry| self.child_from_entry(entry))
                .collect()),
            NodeState::NonDirectory { .. } => Err(SourceError::NotADirectory(self.path.clone())),
            _ => Err(SourceError::NoSuchPath(self.path.clone())),
        }
    }

    /// Drive the state machine out of its two unresolved states.
    fn resolve(&self, state: &mut NodeState) -> Result<()> {
        match state {
            NodeState::Unresolved => {
                // Optimistically try the path as a single file; a typed
                // not-a-file answer reclassifies it as a directory.
                *state = match self.remote.fetch_file(&self.path, &self.reference)? {
                    FileFetch::File(bytes) => NodeState::NonDirectory {
                        file_type: FileType::RegularFile,
                        content: Some(bytes),
                    },
                    FileFetch::NotAFile => match self.list_directory()? {
                        Some(entries) => NodeState::Directory { entries: Some(entries) },
                        None => NodeState::Absent,
                    },
                    FileFetch::Missing => NodeState::Absent,
                };
            }
            NodeState::DirectoryAssumed => {
                *state = match self.list_directory()? {
                    Some(entries) => NodeState::Directory { entries: Some(entries) },
                    None => NodeState::Absent,
                };
            }
            _ => {}
        }
        Ok(())
    }

    fn list_directory(&self) -> Result<Option<Vec<TreeEntry>>> {
        match self.remote.tree(&self.path, &self.reference, false) {
            Ok(entries) => Ok(Some(entries)),
            Err(RemoteError::NotFound(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn child_from_entry(&self, entry: &TreeEntry) -> FileNode {
        let state = if entry.kind == "tree" {
            NodeState::Directory { entries: None }
        } else {
            NodeState::NonDirectory { file_type: classify(entry), content: None }
        };
        FileNode {
            remote: self.remote.clone(),
            reference: self.reference.clone(),
            path: entry.path.clone(),
            name: entry.name.clone(),
            state: Mutex::new(state),
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, NodeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
