//! Read-only access to GitHub repositories through the REST API.
//!
//! Actions:
//! - `list_repos`: an owner's repositories, most recently updated first
//! - `get_structure`: the entries of a directory
//! - `get_file`: the decoded content of a file
//! - `search_code`: code search scoped to one repository
//!
//! A token is optional; without one only public data is visible and the
//! unauthenticated rate limit applies.

use async_trait::async_trait;
use agentrelay_config::AppConfig;
use agentrelay_core::{
    Arguments, Capability, CapabilityError, CapabilityOutput, CapabilitySpec, ParamSpec,
    TrackingContext,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::debug;

use crate::http::{build_client, request_failed};

/// Maximum entries returned by listing and search actions.
const RESULTS_LIMIT: usize = 30;

const ACTIONS: [&str; 4] = ["list_repos", "get_structure", "get_file", "search_code"];

pub struct GithubReadTool {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
}

impl GithubReadTool {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: build_client(&config.http),
            api_url: config.github.api_url.trim_end_matches('/').to_string(),
            token: config.github.token.clone(),
        }
    }

    /// GET a JSON document. `Ok(None)` means 404.
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<Value>, CapabilityError> {
        let url = format!("{}{path}", self.api_url);
        debug!(%url, "GitHub API request");

        let mut request = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| request_failed("github_read", e))?;
        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            let detail = body["message"].as_str().unwrap_or("no details");
            return Err(CapabilityError::implementation(format!(
                "github_read: GitHub API request failed (status {status}): {detail}"
            )));
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| request_failed("github_read", e))
    }

    async fn list_repos(&self, owner: &str) -> Result<CapabilityOutput, CapabilityError> {
        let query = [
            ("sort", "updated".to_string()),
            ("per_page", "100".to_string()),
            ("type", "all".to_string()),
        ];
        let listing = match self.get_json(&format!("/users/{owner}/repos"), &query).await? {
            Some(listing) => listing,
            None => self
                .get_json(&format!("/orgs/{owner}/repos"), &query)
                .await?
                .ok_or_else(|| {
                    CapabilityError::implementation(format!(
                        "github_read: no user or organization named '{owner}'"
                    ))
                })?,
        };

        let repos = repositories_from_listing(&listing);
        let status = format!("Listed {} repositories owned by '{owner}'", repos.len());
        Ok(CapabilityOutput::new(json!({
            "owner": owner,
            "repositories": repos,
        }))
        .with_status(status))
    }

    async fn get_structure(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let contents = self.contents(owner, repo, path).await?;
        let structure = structure_from_contents(path, &contents)?;
        let status = format!(
            "Listed structure for '{owner}/{repo}/{path}' ({} items)",
            structure.len()
        );
        Ok(CapabilityOutput::new(json!({ "path": path, "structure": structure })).with_status(status))
    }

    async fn get_file(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
    ) -> Result<CapabilityOutput, CapabilityError> {
        if path.is_empty() {
            return Err(CapabilityError::invalid_arguments(
                "github_read: 'path' is required for action 'get_file'",
            ));
        }
        let contents = self.contents(owner, repo, path).await?;
        let file = decode_file(path, &contents)?;
        let chars = file["content"].as_str().map_or(0, |c| c.chars().count());
        Ok(CapabilityOutput::new(file)
            .with_status(format!("Read file '{owner}/{repo}/{path}' ({chars} chars)")))
    }

    async fn search_code(
        &self,
        owner: &str,
        repo: &str,
        query: &str,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let params = [
            ("q", format!("{query} repo:{owner}/{repo}")),
            ("per_page", RESULTS_LIMIT.to_string()),
        ];
        let data = self
            .get_json("/search/code", &params)
            .await?
            .ok_or_else(|| CapabilityError::implementation("github_read: code search unavailable"))?;
        let results = search_results(query, &data);
        let status = format!(
            "Searched '{owner}/{repo}' for '{query}': {} total matches, showing {}",
            results["total_results"], results["showing_results"]
        );
        Ok(CapabilityOutput::new(results).with_status(status))
    }

    async fn contents(&self, owner: &str, repo: &str, path: &str) -> Result<Value, CapabilityError> {
        self.get_json(&format!("/repos/{owner}/{repo}/contents/{path}"), &[])
            .await?
            .ok_or_else(|| {
                CapabilityError::implementation(format!(
                    "github_read: '{path}' not found in {owner}/{repo}"
                ))
            })
    }
}

fn require<'a>(args: &'a Arguments, name: &str, action: &str) -> Result<&'a str, CapabilityError> {
    args.str(name).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
        CapabilityError::invalid_arguments(format!(
            "github_read: '{name}' is required for action '{action}'"
        ))
    })
}

/// Summaries of a repository listing, most recently updated first.
pub fn repositories_from_listing(listing: &Value) -> Vec<Value> {
    let mut repos: Vec<Value> = listing
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter(|r| r["full_name"].is_string())
        .map(|r| {
            json!({
                "full_name": r["full_name"],
                "name": r["name"],
                "description": r["description"].as_str().unwrap_or("No description"),
                "url": r["html_url"],
                "stars": r["stargazers_count"].as_u64().unwrap_or(0),
                "private": r["private"].as_bool().unwrap_or(false),
                "last_updated": r["updated_at"],
            })
        })
        .collect();
    repos.sort_by(|a, b| {
        b["last_updated"]
            .as_str()
            .unwrap_or_default()
            .cmp(a["last_updated"].as_str().unwrap_or_default())
    });
    repos.truncate(RESULTS_LIMIT);
    repos
}

/// Directory entries of a contents response.
pub fn structure_from_contents(path: &str, contents: &Value) -> Result<Vec<Value>, CapabilityError> {
    match contents {
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| json!({"name": item["name"], "type": item["type"], "path": item["path"]}))
            .collect()),
        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("file") => {
            Err(CapabilityError::implementation(format!(
                "github_read: '{path}' is a file, use action 'get_file' to read it"
            )))
        }
        _ => Err(CapabilityError::implementation(format!(
            "github_read: '{path}' is not a directory"
        ))),
    }
}

/// Decode the base64 body of a file contents response.
pub fn decode_file(path: &str, contents: &Value) -> Result<Value, CapabilityError> {
    if contents.is_array() {
        return Err(CapabilityError::implementation(format!(
            "github_read: '{path}' is a directory, use action 'get_structure'"
        )));
    }
    let encoded = match (contents["content"].as_str(), contents["encoding"].as_str()) {
        (Some(content), Some("base64")) => content,
        _ => {
            return Err(CapabilityError::implementation(format!(
                "github_read: no base64 content for '{path}'"
            )));
        }
    };

    // GitHub wraps the encoded body at 60 columns.
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| {
        CapabilityError::implementation(format!("github_read: failed to decode '{path}': {e}"))
    })?;
    let content = String::from_utf8(bytes).map_err(|_| {
        CapabilityError::implementation(format!("github_read: '{path}' is not a UTF-8 text file"))
    })?;

    Ok(json!({
        "file_path": path,
        "content": content,
        "size": contents["size"],
    }))
}

/// Flatten a code search response.
pub fn search_results(query: &str, data: &Value) -> Value {
    let results: Vec<Value> = data["items"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|item| {
            json!({
                "path": item["path"],
                "score": item["score"],
                "url": item["html_url"],
            })
        })
        .collect();
    json!({
        "query": query,
        "total_results": data["total_count"].as_u64().unwrap_or(0),
        "showing_results": results.len(),
        "results": results,
    })
}

#[async_trait]
impl Capability for GithubReadTool {
    fn spec(&self) -> CapabilitySpec {
        CapabilitySpec::new(
            "github_read",
            "Read GitHub data: list an owner's repositories, list a directory in a repository, \
             read a file, or search code within one repository.",
        )
        .param(ParamSpec::string("action", "The action to perform.").with_choices(ACTIONS))
        .param(ParamSpec::string(
            "owner",
            "The GitHub user or organization that owns the repositories.",
        ))
        .param(
            ParamSpec::string(
                "repo",
                "Repository name. Required for get_structure, get_file and search_code.",
            )
            .optional(),
        )
        .param(
            ParamSpec::string(
                "path",
                "File or directory path inside the repository. Omit for the root directory.",
            )
            .optional(),
        )
        .param(
            ParamSpec::string("query", "Code search query (search_code only).").optional(),
        )
    }

    async fn invoke(
        &self,
        args: Arguments,
        _tracking: &TrackingContext,
    ) -> Result<CapabilityOutput, CapabilityError> {
        let action = args.require_str("action")?;
        let owner = require(&args, "owner", action)?;
        let path = args.str("path").unwrap_or_default().trim_matches('/');

        match action {
            "list_repos" => self.list_repos(owner).await,
            "get_structure" => {
                let repo = require(&args, "repo", action)?;
                self.get_structure(owner, repo, path).await
            }
            "get_file" => {
                let repo = require(&args, "repo", action)?;
                self.get_file(owner, repo, path).await
            }
            "search_code" => {
                let repo = require(&args, "repo", action)?;
                let query = require(&args, "query", action)?;
                self.search_code(owner, repo, query).await
            }
            other => Err(CapabilityError::invalid_arguments(format!(
                "github_read: unknown action '{other}'"
            ))),
        }
    }
}
