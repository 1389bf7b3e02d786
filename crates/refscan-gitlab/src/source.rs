//! One repository source instance: configuration, the remote handle, and the
//! entry points a build orchestrator drives.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::MergeRequestCache;
use crate::discovery;
use crate::error::{RemoteError, Result, SourceError};
use crate::head::{BranchRevision, Head, MergeRequestRevision, Revision};
use crate::observer::{BuildFlags, HeadObserver, ScanRequest};
use crate::pattern::{BranchNameFilter, DEFAULT_EXCLUDES, DEFAULT_INCLUDES};
use crate::probe::HeadProbe;
use crate::remote::{GitLabRemote, RemoteClient};
use crate::trust::{CollaboratorFallback, TrustDecision, TrustResolver};
use crate::util::RateLimitedWarner;

/// Configuration of a repository source.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// GitLab endpoint, e.g. "https://gitlab.com".
    pub endpoint: String,
    pub repo_owner: String,
    pub repository: String,
    pub private_token: Option<String>,
    /// Space-separated wildcard list of branch names to consider.
    pub includes: String,
    /// Space-separated wildcard list of branch names to drop.
    pub excludes: String,
    pub flags: BuildFlags,
    /// Known collaborator usernames, when the host was able to determine
    /// them. `None` means unknown, handled per `collaborator_fallback`.
    pub collaborators: Option<HashSet<String>>,
    pub collaborator_fallback: CollaboratorFallback,
}

impl SourceConfig {
    pub fn new(
        endpoint: impl Into<String>,
        repo_owner: impl Into<String>,
        repository: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            repo_owner: repo_owner.into(),
            repository: repository.into(),
            private_token: None,
            includes: DEFAULT_INCLUDES.to_string(),
            excludes: DEFAULT_EXCLUDES.to_string(),
            flags: BuildFlags::default(),
            collaborators: None,
            collaborator_fallback: CollaboratorFallback::default(),
        }
    }

    pub fn with_private_token(mut self, token: impl Into<String>) -> Self {
        self.private_token = Some(token.into());
        self
    }

    pub fn with_includes(mut self, includes: impl Into<String>) -> Self {
        self.includes = includes.into();
        self
    }

    pub fn with_excludes(mut self, excludes: impl Into<String>) -> Self {
        self.excludes = excludes.into();
        self
    }

    pub fn with_flags(mut self, flags: BuildFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_collaborators(mut self, collaborators: HashSet<String>) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    pub fn with_collaborator_fallback(mut self, fallback: CollaboratorFallback) -> Self {
        self.collaborator_fallback = fallback;
        self
    }
}

/// A GitLab repository source.
///
/// Holds the per-instance state one repository contributes to the host:
/// configuration, the remote handle, and the merge request metadata cache.
/// One scan runs at a time per instance; cache reads may overlap it.
pub struct GitLabSource {
    config: SourceConfig,
    remote: Arc<dyn RemoteClient>,
    filter: BranchNameFilter,
    cache: MergeRequestCache,
    warner: Arc<RateLimitedWarner>,
}

impl GitLabSource {
    /// Build a source over an existing remote client.
    pub fn new(config: SourceConfig, remote: Arc<dyn RemoteClient>) -> Result<Self> {
        let filter = BranchNameFilter::new(&config.includes, &config.excludes)?;
        Ok(Self {
            config,
            remote,
            filter,
            cache: MergeRequestCache::new(),
            warner: Arc::new(RateLimitedWarner::default()),
        })
    }

    /// Build a source over a [`GitLabRemote`] for the configured endpoint.
    pub fn connect(config: SourceConfig) -> Result<Self> {
        let mut remote = GitLabRemote::new(
            config.endpoint.as_str(),
            &config.repo_owner,
            &config.repository,
        )?;
        if let Some(token) = &config.private_token {
            remote = remote.with_private_token(token.clone());
        }
        Self::new(config, Arc::new(remote))
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Cached descriptive metadata for rendering heads.
    pub fn cache(&self) -> &MergeRequestCache {
        &self.cache
    }

    /// Run one discovery pass, streaming results to `observer`.
    pub fn discover(
        &self,
        request: &ScanRequest<'_>,
        observer: &mut dyn HeadObserver,
    ) -> Result<()> {
        self.validate()?;
        discovery::run(self, request, observer)
    }

    /// Refresh a single head. `Ok(None)` when the underlying branch is gone
    /// or the merge request is gone or closed.
    pub fn revision_of(&self, head: &Head) -> Result<Option<Revision>> {
        self.validate()?;
        match head {
            Head::Branch(branch) => Ok(self.remote.branch(&branch.name)?.map(|found| {
                Revision::Branch(BranchRevision {
                    head: branch.clone(),
                    hash: found.commit.id,
                })
            })),
            Head::MergeRequest(mr_head) => {
                let Some(mr) = self.remote.merge_request(mr_head.number)? else {
                    return Ok(None);
                };
                if mr.is_closed() {
                    return Ok(None);
                }
                let Some(base) = self.remote.branch(&mr.target_branch)? else {
                    return Ok(None);
                };
                Ok(Some(Revision::MergeRequest(MergeRequestRevision {
                    head: mr_head.clone(),
                    base_hash: base.commit.id,
                    pull_hash: mr.sha,
                })))
            }
        }
    }

    /// Probe factory for hosts evaluating criteria outside a scan. Verifies
    /// the project still exists; inside a scan the engine builds probes
    /// directly off the already-fetched project.
    pub fn probe_for(&self, head: &Head, revision: Option<&Revision>) -> Result<HeadProbe> {
        self.validate()?;
        match self.remote.project() {
            Ok(_) => {}
            Err(RemoteError::NotFound(_)) => {
                return Err(SourceError::Config(format!(
                    "no such project {}/{} on {}",
                    self.config.repo_owner, self.config.repository, self.config.endpoint
                )))
            }
            Err(e) => return Err(e.into()),
        }
        Ok(HeadProbe::new(
            self.remote.clone(),
            head.clone(),
            revision.cloned(),
            self.warner.clone(),
        ))
    }

    /// Classify a revision for privileged content access.
    pub fn trusted_revision(&self, revision: &Revision) -> TrustDecision {
        self.trust_resolver().resolve(revision)
    }

    pub fn trust_resolver(&self) -> TrustResolver {
        TrustResolver::new(
            self.config.repo_owner.clone(),
            self.config.collaborators.clone(),
            self.config.collaborator_fallback,
        )
    }

    fn validate(&self) -> Result<()> {
        if self.config.repo_owner.trim().is_empty() {
            return Err(SourceError::Config("no repository owner selected".to_string()));
        }
        if self.config.repository.trim().is_empty() {
            return Err(SourceError::Config("no repository selected".to_string()));
        }
        Ok(())
    }

    pub(crate) fn remote(&self) -> &Arc<dyn RemoteClient> {
        &self.remote
    }

    pub(crate) fn filter(&self) -> &BranchNameFilter {
        &self.filter
    }

    pub(crate) fn warner(&self) -> &Arc<RateLimitedWarner> {
        &self.warner
    }
}
