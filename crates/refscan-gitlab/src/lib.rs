//! Discovery and reconciliation of the buildable heads of a hosted GitLab
//! repository - branches and merge requests - for a build orchestrator.
//!
//! The host drives a [`GitLabSource`] with a [`ScanRequest`] and a
//! [`HeadObserver`]; the engine enumerates candidate heads over the
//! [`RemoteClient`] seam, names them, filters them, optionally tests
//! caller-supplied [`Criteria`] against their file trees through a lazy
//! [`HeadProbe`], and streams accepted (head, revision) pairs back. Forked
//! merge requests go through the trust model before their content is used
//! for anything privileged.

pub mod cache;
pub mod cancel;
mod discovery;
pub mod error;
pub mod head;
pub mod naming;
pub mod observer;
pub mod pattern;
pub mod probe;
pub mod remote;
pub mod source;
pub mod trust;
pub mod util;

pub use cache::{Contributor, MergeRequestCache, MergeRequestMetadata};
pub use cancel::CancelToken;
pub use error::{RemoteError, Result, SourceError};
pub use head::{BranchHead, BranchRevision, Head, MergeRequestHead, MergeRequestRevision, Revision};
pub use observer::{BuildFlags, Criteria, HeadCollector, HeadObserver, ScanRequest};
pub use pattern::BranchNameFilter;
pub use probe::{FileNode, FileType, HeadProbe, ProbeStat};
pub use remote::{FileFetch, GitLabRemote, RemoteClient};
pub use source::{GitLabSource, SourceConfig};
pub use trust::{CollaboratorFallback, TrustDecision, TrustResolver};
