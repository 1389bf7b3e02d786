//! The read-only capability seam to the hosted repository.

mod gitlab;
pub mod models;

pub use gitlab::GitLabRemote;
pub use models::{
    Author, Branch, Commit, CommitRef, FileFetch, MergeRequest, Namespace, Project, TreeEntry,
};

use crate::error::RemoteError;

/// Read operations against one remote repository.
///
/// Single-item getters return `Ok(None)` for refs that no longer exist;
/// listing calls surface every failure as an error. Implementations own
/// timeout and backoff policy; callers never retry.
pub trait RemoteClient: Send + Sync {
    /// The project record of the scanned repository.
    fn project(&self) -> Result<Project, RemoteError>;

    /// A project record by id, e.g. the source project of a forked merge
    /// request. `Ok(None)` when the project is gone or not visible.
    fn project_by_id(&self, id: u64) -> Result<Option<Project>, RemoteError>;

    /// All branches, in listing order.
    fn branches(&self) -> Result<Vec<Branch>, RemoteError>;

    /// One branch by name.
    fn branch(&self, name: &str) -> Result<Option<Branch>, RemoteError>;

    /// All open merge requests, in listing order.
    fn open_merge_requests(&self) -> Result<Vec<MergeRequest>, RemoteError>;

    /// One merge request by iid, whatever its state.
    fn merge_request(&self, iid: u64) -> Result<Option<MergeRequest>, RemoteError>;

    /// A directory listing below `path` at `reference`.
    fn tree(
        &self,
        path: &str,
        reference: &str,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Probe `path` at `reference` as a single file.
    fn fetch_file(&self, path: &str, reference: &str) -> Result<FileFetch, RemoteError>;

    /// One commit by hash.
    fn commit(&self, sha: &str) -> Result<Option<Commit>, RemoteError>;
}
