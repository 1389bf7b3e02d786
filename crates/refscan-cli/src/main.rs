//! Thin host harness around `refscan-gitlab`: run one discovery scan and
//! print the (head, revision) pairs it emits.

use std::collections::HashSet;

use anyhow::Context;
use clap::{ArgAction, Parser};
use console::style;
use refscan_gitlab::{
    BuildFlags, CancelToken, CollaboratorFallback, Criteria, GitLabSource, Head, HeadObserver,
    HeadProbe, Revision, ScanRequest, SourceConfig,
};

#[derive(Parser, Debug)]
#[command(name = "refscan", about = "Discover the buildable heads of a GitLab repository")]
struct Args {
    /// Repository owner (user, group or group/subgroup path)
    owner: String,

    /// Repository name
    repository: String,

    /// GitLab endpoint
    #[arg(long, default_value = "https://gitlab.com")]
    endpoint: String,

    /// Private token for the API
    #[arg(long, env = "GITLAB_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Space-separated wildcard list of branch names to consider
    #[arg(long, default_value = "*")]
    includes: String,

    /// Space-separated wildcard list of branch names to drop
    #[arg(long, default_value = "")]
    excludes: String,

    /// Only surface heads whose tree contains this path
    #[arg(long, value_name = "PATH")]
    criteria_path: Option<String>,

    /// Usernames whose forked merge requests are trusted
    #[arg(long = "collaborator", value_name = "USERNAME")]
    collaborators: Vec<String>,

    /// Trust forked merge requests when no collaborator list is given
    #[arg(long)]
    trust_forks: bool,

    /// Print one JSON object per head instead of styled text
    #[arg(long)]
    json: bool,

    /// Build plain origin branches
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    origin_branch: bool,

    /// Build origin branches that also have an open merge request
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    origin_branch_with_mr: bool,

    /// Build origin merge requests merged with their target branch
    #[arg(long, action = ArgAction::Set, default_value_t = false, value_name = "BOOL")]
    origin_mr_merge: bool,

    /// Build origin merge request heads
    #[arg(long, action = ArgAction::Set, default_value_t = false, value_name = "BOOL")]
    origin_mr_head: bool,

    /// Build forked merge requests merged with their target branch
    #[arg(long, action = ArgAction::Set, default_value_t = true, value_name = "BOOL")]
    fork_mr_merge: bool,

    /// Build forked merge request heads
    #[arg(long, action = ArgAction::Set, default_value_t = false, value_name = "BOOL")]
    fork_mr_head: bool,
}

struct RequiresPath {
    path: String,
}

impl Criteria for RequiresPath {
    fn is_head(&self, probe: &HeadProbe) -> refscan_gitlab::Result<bool> {
        Ok(probe.stat(&self.path)?.exists())
    }
}

struct Printer {
    json: bool,
    seen: usize,
}

impl HeadObserver for Printer {
    fn observe(&mut self, head: Head, revision: Revision) -> bool {
        self.seen += 1;
        if self.json {
            println!(
                "{}",
                serde_json::json!({
                    "head": head.name(),
                    "revision": revision.to_string(),
                })
            );
        } else {
            println!("{}  {}", style(head.name()).green().bold(), style(revision.to_string()).dim());
        }
        true
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let flags = BuildFlags {
        origin_branch: args.origin_branch,
        origin_branch_with_mr: args.origin_branch_with_mr,
        origin_mr_merge: args.origin_mr_merge,
        origin_mr_head: args.origin_mr_head,
        fork_mr_merge: args.fork_mr_merge,
        fork_mr_head: args.fork_mr_head,
    };
    let mut config = SourceConfig::new(
        args.endpoint.as_str(),
        args.owner.as_str(),
        args.repository.as_str(),
    )
    .with_includes(args.includes.as_str())
    .with_excludes(args.excludes.as_str())
    .with_flags(flags);
    if let Some(token) = &args.token {
        config = config.with_private_token(token.clone());
    }
    if !args.collaborators.is_empty() {
        let collaborators: HashSet<String> = args.collaborators.iter().cloned().collect();
        config = config.with_collaborators(collaborators);
    }
    if args.trust_forks {
        config = config.with_collaborator_fallback(CollaboratorFallback::TrustForks);
    }

    let source = GitLabSource::connect(config).context("building repository source")?;

    let criteria = args
        .criteria_path
        .clone()
        .map(|path| RequiresPath { path });
    let mut request = ScanRequest::new().with_cancel(CancelToken::new());
    if let Some(criteria) = &criteria {
        request = request.with_criteria(criteria);
    }

    let mut printer = Printer { json: args.json, seen: 0 };
    source
        .discover(&request, &mut printer)
        .with_context(|| format!("scanning {}/{}", args.owner, args.repository))?;

    log::info!("{} heads discovered", printer.seen);
    if !args.json {
        eprintln!("{}", style(format!("{} heads discovered", printer.seen)).cyan());
    }
    Ok(())
}
