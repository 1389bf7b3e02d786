//! The head discovery and reconciliation engine.
//!
//! One pass over the remote enumerates candidate heads, applies the build
//! flags and the branch name filter, evaluates criteria through a probe, and
//! streams accepted (head, revision) pairs to the observer. When the
//! observer restricts the scan to an include set, the pass degrades to the
//! cheapest set of remote calls that can satisfy it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::cache::{Contributor, MergeRequestMetadata};
use crate::error::{RemoteError, Result};
use crate::head::{BranchHead, BranchRevision, Head, MergeRequestHead, MergeRequestRevision, Revision};
use crate::naming;
use crate::observer::{HeadObserver, ScanRequest};
use crate::probe::HeadProbe;
use crate::remote::models::{Branch, MergeRequest};
use crate::remote::RemoteClient;
use crate::source::GitLabSource;

pub(crate) fn run(
    source: &GitLabSource,
    request: &ScanRequest<'_>,
    observer: &mut dyn HeadObserver,
) -> Result<()> {
    let cancel = &request.cancel;
    let criteria = request.criteria;
    let config = source.config();
    let flags = &config.flags;
    let remote = source.remote();

    cancel.check()?;
    let project = remote.project()?;
    log::info!("examining {} ({})", project.path_with_namespace, project.web_url);

    let includes: Option<HashSet<Head>> = observer.includes().cloned();

    let mut want_mrs = true;
    let mut want_branches = true;
    let mut wanted_mr_numbers: HashSet<u64> = HashSet::new();
    let mut wanted_branch_count = 0usize;
    if let Some(includes) = &includes {
        want_mrs = false;
        want_branches = false;
        for head in includes {
            match head {
                Head::MergeRequest(mr) => {
                    want_mrs = true;
                    wanted_mr_numbers.insert(mr.number);
                }
                Head::Branch(_) => {
                    want_branches = true;
                    wanted_branch_count += 1;
                }
            }
        }
    }

    // Honoring origin_branch / origin_branch_with_mr requires knowing which
    // branch heads have an open merge request before the branch pass runs,
    // so the merge request pass may run even when only branches are wanted.
    let mut origin_heads_with_mr: HashSet<String> = HashSet::new();

    if (want_mrs || (want_branches && (!flags.origin_branch || !flags.origin_branch_with_mr)))
        && flags.wants_merge_request_pass()
    {
        cancel.check()?;

        // An include set naming exactly one branch plus one origin merge
        // request targeting that branch is satisfiable from the single
        // merge request record; no need to walk the whole listing.
        let mut only_want_mr_branch = false;
        if let Some(includes) = &includes {
            if want_branches && wanted_branch_count == 1 && wanted_mr_numbers.len() == 1 {
                let mut mr_head = None;
                let mut branch_head = None;
                for head in includes {
                    match head {
                        Head::MergeRequest(mr) => mr_head = Some(mr),
                        Head::Branch(branch) => branch_head = Some(branch),
                    }
                }
                if let (Some(mr), Some(branch)) = (mr_head, branch_head) {
                    only_want_mr_branch =
                        mr.source_owner == config.repo_owner && *branch == mr.target;
                }
            }
        }

        let single_number =
            if includes.is_some() && (!want_branches || only_want_mr_branch)
                && wanted_mr_numbers.len() == 1
            {
                wanted_mr_numbers.iter().copied().next()
            } else {
                None
            };
        let merge_requests: Vec<MergeRequest> = match single_number {
            Some(number) => {
                log::debug!("fetching merge request !{}", number);
                match remote.merge_request(number)? {
                    Some(mr) if !mr.is_closed() => vec![mr],
                    _ => Vec::new(),
                }
            }
            None => {
                log::debug!("listing open merge requests");
                remote.open_merge_requests()?
            }
        };

        let mut source_projects: HashMap<u64, Option<(String, String)>> = HashMap::new();
        let mut seen_numbers: HashSet<u64> = HashSet::new();
        let mut processed = 0usize;
        for mr in &merge_requests {
            cancel.check()?;
            let number = mr.iid;
            if includes.is_some() && !want_branches && !wanted_mr_numbers.contains(&number) {
                continue;
            }
            let fork = mr.source_project_id != mr.target_project_id;
            if want_mrs {
                log::debug!("checking merge request !{} ({})", number, mr.web_url);
                if fork && !flags.fork_mr_merge && !flags.fork_mr_head {
                    log::debug!("submitted from fork, skipping");
                    continue;
                }
                if !fork
                    && !flags.origin_mr_merge
                    && !flags.origin_mr_head
                    && !flags.origin_branch_with_mr
                {
                    log::debug!("submitted from origin repository, skipping");
                    continue;
                }
                if !fork {
                    origin_heads_with_mr.insert(mr.sha.clone());
                }
            } else {
                // only collecting the origin-heads-with-MR set for the
                // branch pass
                if !fork
                    && (flags.origin_mr_merge
                        || flags.origin_mr_head
                        || flags.origin_branch_with_mr)
                {
                    origin_heads_with_mr.insert(mr.sha.clone());
                }
                continue;
            }
            if fork {
                log::debug!("merge request !{} is not from a trusted source", number);
            }

            let (source_owner, source_repo) = if fork {
                resolve_source_project(remote, source, &mut source_projects, mr)
            } else {
                (config.repo_owner.clone(), config.repository.clone())
            };

            for merge in [false, true] {
                let Some(name) = naming::display_name(number, merge, fork, flags) else {
                    continue;
                };
                source.cache().put_metadata(
                    number,
                    MergeRequestMetadata {
                        title: mr.title.clone(),
                        description: mr.description.clone(),
                        web_url: mr.web_url.clone(),
                    },
                );
                source.cache().put_contributor(
                    number,
                    Contributor {
                        username: mr.author.username.clone(),
                        name: mr.author.name.clone(),
                        email: mr.author.email.clone(),
                    },
                );
                seen_numbers.insert(number);

                let mr_head = MergeRequestHead {
                    number,
                    display_name: name.clone(),
                    target: BranchHead::new(mr.target_branch.clone()),
                    merge,
                    source_owner: source_owner.clone(),
                    source_repo: source_repo.clone(),
                    source_project_id: mr.source_project_id,
                };
                let head = Head::MergeRequest(mr_head.clone());
                if let Some(includes) = &includes {
                    // don't spend rate limit probing a head nobody asked for
                    if !includes.contains(&head) {
                        continue;
                    }
                }
                log::debug!("job name: {}", name);
                if let Some(criteria) = criteria {
                    let probe = HeadProbe::new(
                        remote.clone(),
                        head.clone(),
                        None,
                        source.warner().clone(),
                    );
                    if criteria.is_head(&probe)? {
                        if mr.merge_status.as_deref() == Some("cannot_be_merged") {
                            if merge {
                                log::debug!("not mergeable, build likely to fail");
                            } else {
                                log::debug!("not mergeable, but will be built anyway");
                            }
                        }
                        log::debug!("met criteria");
                    } else {
                        log::debug!("does not meet criteria");
                        continue;
                    }
                }
                // The live head of the target branch, not a pinned ancestor:
                // the base may move between scan and build.
                let base = remote
                    .branch(&mr.target_branch)?
                    .ok_or_else(|| RemoteError::NotFound(mr.target_branch.clone()))?;
                let revision = Revision::MergeRequest(MergeRequestRevision {
                    head: mr_head.clone(),
                    base_hash: base.commit.id,
                    pull_hash: mr.sha.clone(),
                });
                let keep_going = observer.observe(head, revision);
                if !keep_going || !observer.is_observing() {
                    return Ok(());
                }
            }
            processed += 1;
        }
        log::info!("{} merge requests were processed", processed);
        if includes.is_none() {
            // full scan: trim the cache to the merge requests just seen
            source.cache().retain_only(&seen_numbers);
        }
    }

    if want_branches && (flags.origin_branch || flags.origin_branch_with_mr) {
        cancel.check()?;
        let branch_map: IndexMap<String, Branch> =
            if includes.is_some() && wanted_branch_count == 1 {
                let wanted = includes.as_ref().and_then(|includes| {
                    includes.iter().find_map(|head| match head {
                        Head::Branch(branch) => Some(branch.clone()),
                        Head::MergeRequest(_) => None,
                    })
                });
                match wanted {
                    Some(branch_head) => {
                        log::debug!("fetching branch {}", branch_head.name);
                        // a deleted branch is an empty result, not an error
                        match remote.branch(&branch_head.name)? {
                            Some(branch) => {
                                std::iter::once((branch.name.clone(), branch)).collect()
                            }
                            None => IndexMap::new(),
                        }
                    }
                    None => IndexMap::new(),
                }
            } else {
                log::debug!("listing branches");
                remote
                    .branches()?
                    .into_iter()
                    .map(|branch| (branch.name.clone(), branch))
                    .collect()
            };

        let mut processed = 0usize;
        for (name, branch) in &branch_map {
            cancel.check()?;
            if source.filter().is_excluded(name) {
                continue;
            }
            let branch_head = BranchHead::new(name.clone());
            let head = Head::Branch(branch_head.clone());
            if let Some(includes) = &includes {
                if !includes.contains(&head) {
                    continue;
                }
            }
            let has_mr = origin_heads_with_mr.contains(&branch.commit.id);
            if !flags.origin_branch && !has_mr {
                log::debug!("skipping branch {} with no corresponding merge request", name);
                continue;
            }
            if !flags.origin_branch_with_mr && has_mr {
                log::debug!("skipping branch {} with a corresponding merge request", name);
                continue;
            }
            log::debug!("checking branch {}", name);
            let revision = Revision::Branch(BranchRevision {
                head: branch_head,
                hash: branch.commit.id.clone(),
            });
            if let Some(criteria) = criteria {
                let probe = HeadProbe::new(
                    remote.clone(),
                    head.clone(),
                    Some(revision.clone()),
                    source.warner().clone(),
                );
                if criteria.is_head(&probe)? {
                    log::debug!("met criteria");
                } else {
                    log::debug!("does not meet criteria");
                    continue;
                }
            }
            let keep_going = observer.observe(head, revision);
            if !keep_going || !observer.is_observing() {
                return Ok(());
            }
            processed += 1;
        }
        log::info!("{} branches were processed", processed);
    }

    log::info!("done examining {}", project.path_with_namespace);
    Ok(())
}

/// Namespace and path of a fork's source project, looked up at most once per
/// project per scan. An unresolvable source project yields empty identifiers
/// that can never match a trusted owner.
fn resolve_source_project(
    remote: &Arc<dyn RemoteClient>,
    source: &GitLabSource,
    cache: &mut HashMap<u64, Option<(String, String)>>,
    mr: &MergeRequest,
) -> (String, String) {
    let resolved = cache.entry(mr.source_project_id).or_insert_with(|| {
        match remote.project_by_id(mr.source_project_id) {
            Ok(Some(project)) => Some((project.namespace.path, project.path)),
            Ok(None) => {
                log::debug!("source project {} is gone or not visible", mr.source_project_id);
                None
            }
            Err(e) => {
                if source.warner().should_warn() {
                    log::warn!("could not resolve source project {}: {}", mr.source_project_id, e);
                }
                None
            }
        }
    });
    match resolved {
        Some((owner, repo)) => (owner.clone(), repo.clone()),
        None => (String::new(), String::new()),
    }
}
