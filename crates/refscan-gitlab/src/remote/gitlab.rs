//! GitLab v4 API client - the blocking [`RemoteClient`] implementation.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::models::{Branch, Commit, FileFetch, MergeRequest, Project, TreeEntry};
use super::RemoteClient;
use crate::error::RemoteError;

const USER_AGENT: &str = "refscan";
/// Safety limit on pagination
const MAX_PAGES: u32 = 100;

/// Blocking client for one GitLab project.
pub struct GitLabRemote {
    /// Endpoint base, e.g. "https://gitlab.com"
    base_url: String,
    /// Project path (e.g. "owner/repo" or "group/subgroup/repo")
    project_path: String,
    /// URL-encoded project path for API calls
    project_id: String,
    /// Private token (optional)
    private_token: Option<String>,
    client: reqwest::blocking::Client,
}

impl GitLabRemote {
    /// Create a client for `owner/repository` on the given endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        owner: &str,
        repository: &str,
    ) -> Result<Self, RemoteError> {
        let endpoint = endpoint.into();
        let parsed = url::Url::parse(&endpoint)
            .map_err(|e| RemoteError::InvalidFormat(format!("invalid endpoint {}: {}", endpoint, e)))?;
        if parsed.host_str().is_none() {
            return Err(RemoteError::InvalidFormat(format!(
                "endpoint has no host: {}",
                endpoint
            )));
        }

        let project_path = format!("{}/{}", owner, repository);
        let project_id = urlencoding::encode(&project_path).to_string();

        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(Self {
            base_url: endpoint.trim_end_matches('/').to_string(),
            project_path,
            project_id,
            private_token: None,
            client,
        })
    }

    /// Set private token for authentication
    pub fn with_private_token(mut self, token: impl Into<String>) -> Self {
        self.private_token = Some(token.into());
        self
    }

    pub fn project_path(&self) -> &str {
        &self.project_path
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v4/projects/{}{}", self.base_url, self.project_id, endpoint)
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, RemoteError> {
        let mut request = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.private_token {
            request = request.header("PRIVATE-TOKEN", token.as_str());
        }
        request.send().map_err(|e| RemoteError::Network(e.to_string()))
    }

    fn ensure_success(&self, url: &str, status: StatusCode) -> Result<(), RemoteError> {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::AuthRequired(
                "GitLab authentication required".to_string(),
            ));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::RateLimited(format!("GitLab API: {}", url)));
        }
        if !status.is_success() {
            return Err(RemoteError::Network(format!("GitLab API error: {}", status)));
        }
        Ok(())
    }

    /// GET and deserialize; 404 becomes `Ok(None)`.
    fn get_json_opt<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, RemoteError> {
        let response = self.send(url)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.ensure_success(url, status)?;
        response
            .json()
            .map(Some)
            .map_err(|e| RemoteError::InvalidFormat(format!("invalid JSON response: {}", e)))
    }

    /// GET and deserialize; 404 is an error.
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, RemoteError> {
        self.get_json_opt(url)?
            .ok_or_else(|| RemoteError::NotFound(self.project_path.clone()))
    }

    /// Drain a paginated listing endpoint in listing order.
    fn get_paged<T: DeserializeOwned>(&self, endpoint: &str) -> Result<Vec<T>, RemoteError> {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let mut all = Vec::new();
        let mut page: u32 = 1;
        loop {
            let url = format!(
                "{}{}per_page=100&page={}",
                self.url(endpoint),
                separator,
                page
            );
            let items: Vec<T> = self.get_json(&url)?;
            if items.is_empty() {
                break;
            }
            all.extend(items);
            page += 1;
            if page > MAX_PAGES {
                break;
            }
        }
        Ok(all)
    }
}

/// Payload of the repository files endpoint; `content` is base64.
#[derive(Debug, Deserialize)]
struct FilePayload {
    #[serde(default)]
    content: Option<String>,
}

impl RemoteClient for GitLabRemote {
    fn project(&self) -> Result<Project, RemoteError> {
        self.get_json(&format!(
            "{}/api/v4/projects/{}",
            self.base_url, self.project_id
        ))
    }

    fn project_by_id(&self, id: u64) -> Result<Option<Project>, RemoteError> {
        self.get_json_opt(&format!("{}/api/v4/projects/{}", self.base_url, id))
    }

    fn branches(&self) -> Result<Vec<Branch>, RemoteError> {
        self.get_paged("/repository/branches")
    }

    fn branch(&self, name: &str) -> Result<Option<Branch>, RemoteError> {
        let encoded = urlencoding::encode(name);
        self.get_json_opt(&self.url(&format!("/repository/branches/{}", encoded)))
    }

    fn open_merge_requests(&self) -> Result<Vec<MergeRequest>, RemoteError> {
        self.get_paged("/merge_requests?state=opened")
    }

    fn merge_request(&self, iid: u64) -> Result<Option<MergeRequest>, RemoteError> {
        self.get_json_opt(&self.url(&format!("/merge_requests/{}", iid)))
    }

    fn tree(
        &self,
        path: &str,
        reference: &str,
        recursive: bool,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        let endpoint = format!(
            "/repository/tree?path={}&ref={}&recursive={}",
            urlencoding::encode(path),
            urlencoding::encode(reference),
            recursive
        );
        self.get_paged(&endpoint)
    }

    fn fetch_file(&self, path: &str, reference: &str) -> Result<FileFetch, RemoteError> {
        let url = self.url(&format!(
            "/repository/files/{}?ref={}",
            urlencoding::encode(path),
            urlencoding::encode(reference)
        ));
        let payload: Option<FilePayload> = self.get_json_opt(&url)?;
        match payload {
            None => Ok(FileFetch::Missing),
            Some(FilePayload { content: Some(content) }) => {
                let stripped: String =
                    content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                let bytes = STANDARD.decode(stripped).map_err(|e| {
                    RemoteError::InvalidFormat(format!("failed to decode base64: {}", e))
                })?;
                Ok(FileFetch::File(bytes))
            }
            // A well-formed response without file content: the path resolves
            // to something that is not a single file.
            Some(_) => Ok(FileFetch::NotAFile),
        }
    }

    fn commit(&self, sha: &str) -> Result<Option<Commit>, RemoteError> {
        let encoded = urlencoding::encode(sha);
        self.get_json_opt(&self.url(&format!("/repository/commits/{}", encoded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_creation() {
        let remote = GitLabRemote::new("https://gitlab.com", "owner", "repo").unwrap();
        assert_eq!(remote.project_path, "owner/repo");
        assert_eq!(remote.project_id, "owner%2Frepo");
        assert_eq!(remote.base_url, "https://gitlab.com");
    }

    #[test]
    fn test_remote_with_subgroups() {
        let remote =
            GitLabRemote::new("https://gitlab.example.com/", "group/subgroup", "repo").unwrap();
        assert_eq!(remote.project_path, "group/subgroup/repo");
        assert_eq!(remote.project_id, "group%2Fsubgroup%2Frepo");
        assert_eq!(remote.base_url, "https://gitlab.example.com");
    }

    #[test]
    fn test_url_building() {
        let remote = GitLabRemote::new("https://gitlab.com", "owner", "repo").unwrap();
        assert_eq!(
            remote.url("/repository/branches"),
            "https://gitlab.com/api/v4/projects/owner%2Frepo/repository/branches"
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(GitLabRemote::new("not a url", "owner", "repo").is_err());
    }
}
