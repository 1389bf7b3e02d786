//! Probe layer behavior: flat stat classification and the lazy file tree's
//! at-most-one-round-trip resolution.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{branch, project, tree_entry, FakeRemote};
use refscan_gitlab::remote::models::FileFetch;
use refscan_gitlab::{
    BranchHead, BranchRevision, FileType, GitLabSource, Head, MergeRequestHead, RemoteClient,
    Revision, SourceConfig, SourceError,
};

const REF: &str = "m1";

fn source_over(fake: Arc<FakeRemote>) -> GitLabSource {
    let config = SourceConfig::new("https://gitlab.example.com", "acme", "widget");
    GitLabSource::new(config, fake as Arc<dyn RemoteClient>).unwrap()
}

fn main_head() -> Head {
    Head::Branch(BranchHead::new("main"))
}

fn main_revision() -> Revision {
    Revision::Branch(BranchRevision { head: BranchHead::new("main"), hash: REF.to_string() })
}

fn mr5_head(merge: bool, display_name: &str) -> Head {
    Head::MergeRequest(MergeRequestHead {
        number: 5,
        display_name: display_name.to_string(),
        target: BranchHead::new("main"),
        merge,
        source_owner: "acme".to_string(),
        source_repo: "widget".to_string(),
        source_project_id: 1,
    })
}

fn seeded_fake() -> FakeRemote {
    let mut fake = FakeRemote::new(project(1, "acme", "widget"));
    fake.trees.insert(
        ("".to_string(), REF.to_string()),
        vec![
            tree_entry("README.md", "blob", "100644"),
            tree_entry("src", "tree", "040000"),
            tree_entry("current", "blob", "120000"),
            tree_entry("vendored", "commit", "160000"),
        ],
    );
    fake.trees.insert(
        ("src".to_string(), REF.to_string()),
        vec![tree_entry("src/lib.rs", "blob", "100644")],
    );
    fake.files.insert(
        ("README.md".to_string(), REF.to_string()),
        FileFetch::File(b"hello".to_vec()),
    );
    fake.files.insert(("src".to_string(), REF.to_string()), FileFetch::NotAFile);
    fake
}

#[test]
fn test_stat_exact_match_wins_over_differently_cased_entry() {
    let mut fake = FakeRemote::new(project(1, "acme", "widget"));
    // The differently-cased entry comes first in the listing.
    fake.trees.insert(
        ("Dir/".to_string(), REF.to_string()),
        vec![
            tree_entry("Dir/file.txt", "blob", "100644"),
            tree_entry("Dir/File.txt", "blob", "100644"),
        ],
    );
    let source = source_over(Arc::new(fake));
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let stat = probe.stat("Dir/File.txt").unwrap();
    assert_eq!(stat.file_type, FileType::RegularFile);
    assert_eq!(stat.alternative_path, None);
}

#[test]
fn test_stat_alternative_path_is_a_hint_not_a_hit() {
    let mut fake = FakeRemote::new(project(1, "acme", "widget"));
    fake.trees.insert(
        ("Dir/".to_string(), REF.to_string()),
        vec![tree_entry("Dir/README.md", "blob", "100644")],
    );
    let source = source_over(Arc::new(fake));
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let stat = probe.stat("Dir/readme.md").unwrap();
    assert!(!stat.exists());
    assert_eq!(stat.file_type, FileType::Nonexistent);
    assert_eq!(stat.alternative_path.as_deref(), Some("Dir/README.md"));
}

#[test]
fn test_stat_classifies_all_entry_kinds() {
    let source = source_over(Arc::new(seeded_fake()));
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    assert_eq!(probe.stat("README.md").unwrap().file_type, FileType::RegularFile);
    assert_eq!(probe.stat("src").unwrap().file_type, FileType::Directory);
    assert_eq!(probe.stat("current").unwrap().file_type, FileType::Link);
    assert_eq!(probe.stat("vendored").unwrap().file_type, FileType::Other);
    assert_eq!(probe.stat("nope").unwrap().file_type, FileType::Nonexistent);
}

#[test]
fn test_stat_is_memoized_per_path() {
    let fake = Arc::new(seeded_fake());
    let source = source_over(fake.clone());
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    probe.stat("README.md").unwrap();
    probe.stat("README.md").unwrap();
    probe.stat("README.md").unwrap();
    assert_eq!(fake.calls.tree.load(Ordering::SeqCst), 1);
}

#[test]
fn test_stat_unlistable_parent_means_nonexistent() {
    let fake = Arc::new(FakeRemote::new(project(1, "acme", "widget")));
    let source = source_over(fake.clone());
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let stat = probe.stat("no/such/dir/file.txt").unwrap();
    assert_eq!(stat.file_type, FileType::Nonexistent);
}

#[test]
fn test_unresolved_node_reclassifies_as_directory_in_two_calls() {
    let fake = Arc::new(seeded_fake());
    let source = source_over(fake.clone());
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let node = probe.root().child("src", false);
    assert_eq!(node.file_type().unwrap(), FileType::Directory);
    assert_eq!(fake.calls.fetch_file.load(Ordering::SeqCst), 1);
    assert_eq!(fake.calls.tree.load(Ordering::SeqCst), 1);

    // Fully resolved: no further round trips for type or children.
    assert_eq!(node.file_type().unwrap(), FileType::Directory);
    let children = node.children().unwrap();
    assert_eq!(fake.calls.fetch_file.load(Ordering::SeqCst), 1);
    assert_eq!(fake.calls.tree.load(Ordering::SeqCst), 1);

    // Children carry the type learned from the listing.
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].name(), "lib.rs");
    assert_eq!(children[0].file_type().unwrap(), FileType::RegularFile);
    assert_eq!(fake.calls.fetch_file.load(Ordering::SeqCst), 1);
}

#[test]
fn test_unresolved_file_node_caches_content() {
    let fake = Arc::new(seeded_fake());
    let source = source_over(fake.clone());
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let node = probe.root().child("README.md", false);
    assert_eq!(node.content().unwrap(), b"hello".to_vec());
    assert_eq!(node.file_type().unwrap(), FileType::RegularFile);
    assert_eq!(node.content().unwrap(), b"hello".to_vec());
    assert_eq!(fake.calls.fetch_file.load(Ordering::SeqCst), 1);
    assert_eq!(fake.calls.tree.load(Ordering::SeqCst), 0);
}

#[test]
fn test_content_of_directory_fails_typed() {
    let source = source_over(Arc::new(seeded_fake()));
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let node = probe.root().child("src", true);
    assert!(matches!(node.content(), Err(SourceError::IsDirectory(_))));
}

#[test]
fn test_missing_node_is_permanently_absent() {
    let fake = Arc::new(seeded_fake());
    let source = source_over(fake.clone());
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let node = probe.root().child("missing.txt", false);
    assert_eq!(node.file_type().unwrap(), FileType::Nonexistent);
    assert!(matches!(node.content(), Err(SourceError::NoSuchPath(_))));
    assert!(matches!(node.children(), Err(SourceError::NoSuchPath(_))));
    // Resolved absent once; never re-asked.
    assert_eq!(fake.calls.fetch_file.load(Ordering::SeqCst), 1);
}

#[test]
fn test_root_is_assumed_directory_until_listed() {
    let fake = Arc::new(seeded_fake());
    let source = source_over(fake.clone());
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();

    let root = probe.root();
    let children = root.children().unwrap();
    assert_eq!(children.len(), 4);
    assert_eq!(root.file_type().unwrap(), FileType::Directory);
    assert_eq!(fake.calls.tree.load(Ordering::SeqCst), 1);
    assert_eq!(fake.calls.fetch_file.load(Ordering::SeqCst), 0);
}

#[test]
fn test_merge_request_probes_use_merge_request_refs() {
    let mut fake = FakeRemote::new(project(1, "acme", "widget"));
    fake.trees.insert(
        ("".to_string(), "refs/merge-requests/5/head".to_string()),
        vec![tree_entry("ci.yaml", "blob", "100644")],
    );
    fake.trees.insert(
        ("".to_string(), "refs/merge-requests/5/merge".to_string()),
        vec![tree_entry("merged.txt", "blob", "100644")],
    );
    let source = source_over(Arc::new(fake));

    let probe = source.probe_for(&mr5_head(false, "PR-5"), None).unwrap();
    assert!(probe.stat("ci.yaml").unwrap().exists());

    let probe = source.probe_for(&mr5_head(true, "PR-5-merge"), None).unwrap();
    assert!(probe.stat("merged.txt").unwrap().exists());
    assert!(!probe.stat("ci.yaml").unwrap().exists());
}

#[test]
fn test_last_modified_resolution() {
    let when = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
    let mut fake = FakeRemote::new(project(1, "acme", "widget"));
    fake.commits.insert(
        REF.to_string(),
        refscan_gitlab::remote::models::Commit { id: REF.to_string(), committed_date: Some(when) },
    );
    let fake = Arc::new(fake);
    let mut unpinned_branch = branch("main", REF);
    unpinned_branch.commit.committed_date = Some(when);
    fake.set_branches(vec![unpinned_branch]);
    let source = source_over(fake.clone());

    // Pinned branch revision: resolved through the commit.
    let probe = source.probe_for(&main_head(), Some(&main_revision())).unwrap();
    assert_eq!(probe.last_modified(), Some(when));
    assert_eq!(fake.calls.commit.load(Ordering::SeqCst), 1);

    // Unpinned branch probe: resolved through the branch record.
    let probe = source.probe_for(&main_head(), None).unwrap();
    assert_eq!(probe.last_modified(), Some(when));

    // Merge request probes have no single commit time.
    let probe = source.probe_for(&mr5_head(false, "PR-5"), None).unwrap();
    assert_eq!(probe.last_modified(), None);
}
