//! Contracts between the discovery engine and its host: which categories to
//! build, how results are streamed out, and how content criteria are asked.

use std::collections::HashSet;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::head::{Head, Revision};
use crate::probe::HeadProbe;

/// Which categories of heads a source builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildFlags {
    /// Build regular origin branches.
    pub origin_branch: bool,
    /// Build origin branches which also have a merge request filed from them
    /// (named and built as a branch).
    pub origin_branch_with_mr: bool,
    /// Build merge requests filed from the origin, as the merge with the
    /// target branch.
    pub origin_mr_merge: bool,
    /// Build merge requests filed from the origin, as the source branch head.
    pub origin_mr_head: bool,
    /// Build merge requests filed from a fork, as the merge with the target
    /// branch.
    pub fork_mr_merge: bool,
    /// Build merge requests filed from a fork, as the source branch head.
    pub fork_mr_head: bool,
}

impl Default for BuildFlags {
    fn default() -> Self {
        Self {
            origin_branch: true,
            origin_branch_with_mr: true,
            origin_mr_merge: false,
            origin_mr_head: false,
            fork_mr_merge: true,
            fork_mr_head: false,
        }
    }
}

impl BuildFlags {
    /// Whether any merge-request-derived (or branch-with-MR) category is on.
    pub fn wants_merge_request_pass(&self) -> bool {
        self.origin_branch_with_mr
            || self.origin_mr_merge
            || self.origin_mr_head
            || self.fork_mr_merge
            || self.fork_mr_head
    }
}

/// Streaming consumer of discovery results.
///
/// `observe` returns whether the observer wants more results; the engine
/// also polls `is_observing` and stops as soon as either says no. When
/// `includes` returns a set, the scan is incremental: only those heads are
/// of interest and the engine is free to skip everything else.
pub trait HeadObserver {
    fn observe(&mut self, head: Head, revision: Revision) -> bool;

    fn is_observing(&self) -> bool {
        true
    }

    fn includes(&self) -> Option<&HashSet<Head>> {
        None
    }
}

/// Observer collecting every emitted pair, optionally restricted to an
/// include set.
#[derive(Debug, Default)]
pub struct HeadCollector {
    includes: Option<HashSet<Head>>,
    observed: Vec<(Head, Revision)>,
}

impl HeadCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_includes(includes: HashSet<Head>) -> Self {
        Self { includes: Some(includes), observed: Vec::new() }
    }

    pub fn observed(&self) -> &[(Head, Revision)] {
        &self.observed
    }

    pub fn into_observed(self) -> Vec<(Head, Revision)> {
        self.observed
    }
}

impl HeadObserver for HeadCollector {
    fn observe(&mut self, head: Head, revision: Revision) -> bool {
        self.observed.push((head, revision));
        true
    }

    fn includes(&self) -> Option<&HashSet<Head>> {
        self.includes.as_ref()
    }
}

/// Caller-supplied predicate over a head's file tree, deciding whether the
/// head is surfaced at all. Probing is the only way content is consulted.
pub trait Criteria {
    fn is_head(&self, probe: &HeadProbe) -> Result<bool>;
}

/// Input to one discovery pass.
#[derive(Default)]
pub struct ScanRequest<'a> {
    pub criteria: Option<&'a dyn Criteria>,
    pub cancel: CancelToken,
}

impl<'a> ScanRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(mut self, criteria: &'a dyn Criteria) -> Self {
        self.criteria = Some(criteria);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
}
