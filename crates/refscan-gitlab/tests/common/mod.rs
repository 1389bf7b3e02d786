//! In-memory [`RemoteClient`] fake scripted per test, counting calls per
//! endpoint so rate-limit properties of the scan are assertable.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use refscan_gitlab::remote::models::{
    Author, Branch, Commit, CommitRef, FileFetch, MergeRequest, Namespace, Project, TreeEntry,
};
use refscan_gitlab::{RemoteClient, RemoteError};

#[derive(Default)]
pub struct Calls {
    pub project: AtomicUsize,
    pub project_by_id: AtomicUsize,
    pub branches: AtomicUsize,
    pub branch: AtomicUsize,
    pub open_merge_requests: AtomicUsize,
    pub merge_request: AtomicUsize,
    pub tree: AtomicUsize,
    pub fetch_file: AtomicUsize,
    pub commit: AtomicUsize,
}

impl Calls {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeRemote {
    pub project: Project,
    pub other_projects: HashMap<u64, Project>,
    pub branches: Mutex<Vec<Branch>>,
    pub merge_requests: Mutex<Vec<MergeRequest>>,
    /// (directory path, ref) -> listing
    pub trees: HashMap<(String, String), Vec<TreeEntry>>,
    /// (file path, ref) -> outcome
    pub files: HashMap<(String, String), FileFetch>,
    pub commits: HashMap<String, Commit>,
    pub fail_listings: AtomicBool,
    pub calls: Calls,
}

impl FakeRemote {
    pub fn new(project: Project) -> Self {
        Self {
            project,
            other_projects: HashMap::new(),
            branches: Mutex::new(Vec::new()),
            merge_requests: Mutex::new(Vec::new()),
            trees: HashMap::new(),
            files: HashMap::new(),
            commits: HashMap::new(),
            fail_listings: AtomicBool::new(false),
            calls: Calls::default(),
        }
    }

    pub fn set_branches(&self, branches: Vec<Branch>) {
        *self.branches.lock().unwrap() = branches;
    }

    pub fn set_merge_requests(&self, merge_requests: Vec<MergeRequest>) {
        *self.merge_requests.lock().unwrap() = merge_requests;
    }

    pub fn fail_listings(&self) {
        self.fail_listings.store(true, Ordering::SeqCst);
    }

    fn listing_guard(&self) -> Result<(), RemoteError> {
        if self.fail_listings.load(Ordering::SeqCst) {
            Err(RemoteError::Network("injected listing failure".to_string()))
        } else {
            Ok(())
        }
    }
}

impl RemoteClient for FakeRemote {
    fn project(&self) -> Result<Project, RemoteError> {
        Calls::bump(&self.calls.project);
        Ok(self.project.clone())
    }

    fn project_by_id(&self, id: u64) -> Result<Option<Project>, RemoteError> {
        Calls::bump(&self.calls.project_by_id);
        if id == self.project.id {
            return Ok(Some(self.project.clone()));
        }
        Ok(self.other_projects.get(&id).cloned())
    }

    fn branches(&self) -> Result<Vec<Branch>, RemoteError> {
        Calls::bump(&self.calls.branches);
        self.listing_guard()?;
        Ok(self.branches.lock().unwrap().clone())
    }

    fn branch(&self, name: &str) -> Result<Option<Branch>, RemoteError> {
        Calls::bump(&self.calls.branch);
        Ok(self
            .branches
            .lock()
            .unwrap()
            .iter()
            .find(|branch| branch.name == name)
            .cloned())
    }

    fn open_merge_requests(&self) -> Result<Vec<MergeRequest>, RemoteError> {
        Calls::bump(&self.calls.open_merge_requests);
        self.listing_guard()?;
        Ok(self
            .merge_requests
            .lock()
            .unwrap()
            .iter()
            .filter(|mr| mr.state == "opened")
            .cloned()
            .collect())
    }

    fn merge_request(&self, iid: u64) -> Result<Option<MergeRequest>, RemoteError> {
        Calls::bump(&self.calls.merge_request);
        Ok(self
            .merge_requests
            .lock()
            .unwrap()
            .iter()
            .find(|mr| mr.iid == iid)
            .cloned())
    }

    fn tree(
        &self,
        path: &str,
        reference: &str,
        _recursive: bool,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        Calls::bump(&self.calls.tree);
        self.trees
            .get(&(path.to_string(), reference.to_string()))
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(path.to_string()))
    }

    fn fetch_file(&self, path: &str, reference: &str) -> Result<FileFetch, RemoteError> {
        Calls::bump(&self.calls.fetch_file);
        Ok(self
            .files
            .get(&(path.to_string(), reference.to_string()))
            .cloned()
            .unwrap_or(FileFetch::Missing))
    }

    fn commit(&self, sha: &str) -> Result<Option<Commit>, RemoteError> {
        Calls::bump(&self.calls.commit);
        Ok(self.commits.get(sha).cloned())
    }
}

pub fn project(id: u64, owner: &str, repo: &str) -> Project {
    Project {
        id,
        path: repo.to_string(),
        path_with_namespace: format!("{}/{}", owner, repo),
        namespace: Namespace { path: owner.to_string() },
        web_url: format!("https://gitlab.example.com/{}/{}", owner, repo),
        default_branch: Some("main".to_string()),
        description: None,
    }
}

pub fn branch(name: &str, sha: &str) -> Branch {
    Branch {
        name: name.to_string(),
        commit: CommitRef { id: sha.to_string(), committed_date: None },
    }
}

pub fn merge_request(
    iid: u64,
    source_project_id: u64,
    target_project_id: u64,
    target_branch: &str,
    sha: &str,
) -> MergeRequest {
    MergeRequest {
        iid,
        state: "opened".to_string(),
        source_project_id,
        target_project_id,
        target_branch: target_branch.to_string(),
        sha: sha.to_string(),
        title: format!("merge request {}", iid),
        description: Some(format!("description of {}", iid)),
        author: Author {
            username: "dev".to_string(),
            name: Some("Dev Eloper".to_string()),
            email: Some("dev@example.com".to_string()),
        },
        merge_status: Some("can_be_merged".to_string()),
        web_url: format!("https://gitlab.example.com/mr/{}", iid),
    }
}

pub fn tree_entry(path: &str, kind: &str, mode: &str) -> TreeEntry {
    TreeEntry {
        path: path.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        kind: kind.to_string(),
        mode: mode.to_string(),
    }
}
