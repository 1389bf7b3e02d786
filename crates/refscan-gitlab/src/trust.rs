//! Trust classification of revisions.
//!
//! Privileged file content (pipeline definitions and the like) must not be
//! read from an arbitrary fork. A merge request from the origin repository
//! is always trusted; a forked one only when its source owner is a known
//! collaborator. Untrusted revisions have their content source substituted
//! with the target branch.

use std::collections::HashSet;

use crate::head::{BranchRevision, Revision};

/// What to do with forked merge requests when the collaborator set could not
/// be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollaboratorFallback {
    /// Treat only the repository owner as a collaborator. Forked merge
    /// requests are untrusted until membership can be checked.
    #[default]
    OwnerOnly,
    /// Trust forked merge requests even though membership cannot be checked.
    TrustForks,
}

/// Outcome of classifying a revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustDecision {
    pub trusted: bool,
    /// The revision whose file content should actually be read. For an
    /// untrusted forked merge request this is the target branch at the
    /// base hash, not the merge request head.
    pub effective: Revision,
}

/// Classifies revisions against the repository's collaborator set.
#[derive(Debug, Clone)]
pub struct TrustResolver {
    repo_owner: String,
    collaborators: Option<HashSet<String>>,
    fallback: CollaboratorFallback,
}

impl TrustResolver {
    pub fn new(
        repo_owner: impl Into<String>,
        collaborators: Option<HashSet<String>>,
        fallback: CollaboratorFallback,
    ) -> Self {
        Self { repo_owner: repo_owner.into(), collaborators, fallback }
    }

    pub fn resolve(&self, revision: &Revision) -> TrustDecision {
        let mr = match revision {
            Revision::MergeRequest(mr) => mr,
            // Branch revisions always carry origin content.
            Revision::Branch(_) => {
                return TrustDecision { trusted: true, effective: revision.clone() }
            }
        };

        if mr.head.source_owner == self.repo_owner {
            return TrustDecision { trusted: true, effective: revision.clone() };
        }

        let trusted = match &self.collaborators {
            Some(names) => names.contains(&mr.head.source_owner),
            None => match self.fallback {
                CollaboratorFallback::OwnerOnly => false,
                CollaboratorFallback::TrustForks => {
                    log::warn!(
                        "trusting merge request !{} from {} without collaborator verification",
                        mr.head.number,
                        mr.head.source_owner
                    );
                    true
                }
            },
        };

        if trusted {
            TrustDecision { trusted: true, effective: revision.clone() }
        } else {
            log::warn!(
                "loading trusted files for !{} from target branch {} at {} rather than {}",
                mr.head.number,
                mr.head.target.name,
                mr.base_hash,
                mr.pull_hash
            );
            TrustDecision {
                trusted: false,
                effective: Revision::Branch(BranchRevision {
                    head: mr.head.target.clone(),
                    hash: mr.base_hash.clone(),
                }),
            }
        }
    }
}
