//! Heads and revisions - the named buildable units of a repository and the
//! immutable content pointers a scan resolves them to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Head corresponding to a branch in the scanned repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BranchHead {
    pub name: String,
}

impl BranchHead {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Head corresponding to a merge request.
///
/// Named like `PR-123`, `PR-123-merge` or `PR-123-head` depending on which
/// build shapes are enabled. The merge flag is encoded into the display name,
/// so two heads for the same merge request number with different `merge`
/// values are distinct heads with distinct names.
///
/// Identity is the number plus the build shape; the display name and the
/// source coordinates are descriptive and do not participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequestHead {
    /// The merge request iid, stable across rescans.
    pub number: u64,
    /// Job-naming only; derived from the number and the build flags.
    pub display_name: String,
    /// The branch the merge request targets.
    pub target: BranchHead,
    /// Whether the build represents the head merged into the target branch
    /// rather than the head commit alone.
    pub merge: bool,
    pub source_owner: String,
    pub source_repo: String,
    pub source_project_id: u64,
}

impl PartialEq for MergeRequestHead {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number && self.merge == other.merge
    }
}

impl Eq for MergeRequestHead {}

impl std::hash::Hash for MergeRequestHead {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.number.hash(state);
        self.merge.hash(state);
    }
}

/// A named, independently buildable unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Head {
    Branch(BranchHead),
    MergeRequest(MergeRequestHead),
}

impl Head {
    /// The job-facing name of this head.
    pub fn name(&self) -> &str {
        match self {
            Head::Branch(b) => &b.name,
            Head::MergeRequest(mr) => &mr.display_name,
        }
    }
}

impl fmt::Display for Head {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Revision of a branch head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRevision {
    pub head: BranchHead,
    pub hash: String,
}

/// Revision of a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestRevision {
    pub head: MergeRequestHead,
    /// The commit hash of the target branch we are tracking.
    ///
    /// This is the target branch head as it was at scan time, not a pinned
    /// common ancestor; the target may move between scan and build.
    pub base_hash: String,
    /// The head commit of the merge request source branch.
    pub pull_hash: String,
}

/// An immutable pointer to repository content for a [`Head`].
///
/// A rescan produces new revision values; existing ones are never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Revision {
    Branch(BranchRevision),
    MergeRequest(MergeRequestRevision),
}

impl Revision {
    pub fn head(&self) -> Head {
        match self {
            Revision::Branch(rev) => Head::Branch(rev.head.clone()),
            Revision::MergeRequest(rev) => Head::MergeRequest(rev.head.clone()),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Branch(rev) => f.write_str(&rev.hash),
            Revision::MergeRequest(rev) if rev.head.merge => {
                write!(f, "{}+{}", rev.pull_hash, rev.base_hash)
            }
            Revision::MergeRequest(rev) => f.write_str(&rev.pull_hash),
        }
    }
}
