//! Typed payloads of the GitLab v4 API, trimmed to the fields the discovery
//! and probe layers consume.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub path: String,
}

/// A project record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub path: String,
    pub path_with_namespace: String,
    pub namespace: Namespace,
    pub web_url: String,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// The commit summary embedded in branch listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRef {
    pub id: String,
    #[serde(default)]
    pub committed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    pub name: String,
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// An open (or recently closed) merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub iid: u64,
    pub state: String,
    pub source_project_id: u64,
    pub target_project_id: u64,
    pub target_branch: String,
    /// Head commit of the source branch.
    pub sha: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub author: Author,
    #[serde(default)]
    pub merge_status: Option<String>,
    pub web_url: String,
}

impl MergeRequest {
    pub fn is_closed(&self) -> bool {
        self.state == "closed"
    }
}

/// One entry of a repository tree listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub name: String,
    /// `blob` or `tree`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Git file mode; `120000` marks a symlink.
    pub mode: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    #[serde(default)]
    pub committed_date: Option<DateTime<Utc>>,
}

/// Result of probing a path through the file-content capability.
///
/// The distinction between [`FileFetch::NotAFile`] and [`FileFetch::Missing`]
/// is what lets the probe layer reclassify a path as a directory without
/// inspecting error internals.
#[derive(Debug, Clone)]
pub enum FileFetch {
    /// The path is a single file with this body.
    File(Vec<u8>),
    /// The path exists but is not a single file (a directory, typically).
    NotAFile,
    /// The path does not exist at the requested ref.
    Missing,
}
