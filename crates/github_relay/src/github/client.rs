//! Read-only GitHub API client backing the proxy endpoints.
//!
//! One upstream call per operation, no retries. The access token travels as
//! an `Authorization: token …` header; GitHub also requires a User-Agent on
//! every request.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header;
use serde::Serialize;
use serde_json::Value;

use crate::error::RelayError;

pub const GITHUB_API_BASE: &str = "https://api.github.com";

/// GitHub caps per_page at 100 but a large value spares us pagination for
/// the common case; the spec'd single-page fetch.
const REPOS_PER_PAGE: &str = "500";

/// Only the repository listing carries an explicit upstream timeout.
const REPO_FETCH_TIMEOUT: Duration = Duration::from_secs(4);

/// Reduced public shape of the authenticated user resource.
///
/// `gh_bio` and `name` may be JSON null, but the fields must be present in
/// the upstream payload.
#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub gh_profile: String,
    pub gh_username: String,
    pub avatar_url: String,
    pub gh_bio: Value,
    pub name: Value,
}

/// Per-repository projection of the upstream repository object.
#[derive(Debug, Clone, Serialize)]
pub struct RepoSummary {
    pub repo_name: String,
    pub repo_link: String,
    pub description: Value,
    pub owner_fullname: String,
    pub html_url: String,
}

/// Per-commit projection of the upstream commit object.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub commit_author: String,
    pub commit_date: String,
    pub commit_msg: String,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GithubClient {
    pub fn new(api_base: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("github-relay")
            .build()
            .context("failed to build GitHub HTTP client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch the authenticated user and reduce it to [`Profile`].
    pub async fn get_profile(&self, token: &str) -> std::result::Result<Profile, RelayError> {
        let url = format!("{}/user", self.api_base);
        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, format!("token {token}"))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let body: Value = response
            .json()
            .await
            .map_err(|_| RelayError::MalformedUpstream)?;

        Ok(Profile {
            gh_profile: required_str(&body, "html_url")?,
            gh_username: required_str(&body, "login")?,
            avatar_url: required_str(&body, "avatar_url")?,
            gh_bio: required(&body, "bio")?,
            name: required(&body, "name")?,
        })
    }

    /// Fetch up to one page of a user's repositories.
    ///
    /// An empty list is a valid zero-count result; a shape fault in a
    /// non-empty payload is reported as [`RelayError::NoUserFound`].
    pub async fn list_repos(
        &self,
        token: &str,
        username: &str,
    ) -> std::result::Result<Vec<RepoSummary>, RelayError> {
        let url = format!("{}/users/{}/repos", self.api_base, username);
        let response = self
            .http
            .get(&url)
            .query(&[("per_page", REPOS_PER_PAGE)])
            .header(header::AUTHORIZATION, format!("token {token}"))
            .header(header::ACCEPT, "application/json")
            .timeout(REPO_FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::UpstreamTimeout
                } else {
                    RelayError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|body| {
                    body.get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("github returned {status}"));
            tracing::error!(%status, %message, "repository listing failed upstream");
            return Err(RelayError::Upstream(message));
        }

        // The 4 s budget covers the body read too; a timeout here must not
        // be mistaken for a shape fault.
        let items: Vec<Value> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RelayError::UpstreamTimeout
            } else {
                RelayError::NoUserFound
            }
        })?;
        items.iter().map(project_repo).collect()
    }

    /// Fetch the commit list of one repository. No pagination, no count
    /// limit, no timeout override.
    pub async fn list_commits(
        &self,
        token: &str,
        username: &str,
        repo_name: &str,
    ) -> std::result::Result<Vec<CommitSummary>, RelayError> {
        let url = format!("{}/repos/{}/{}/commits", self.api_base, username, repo_name);
        let response = self
            .http
            .get(&url)
            .header(header::AUTHORIZATION, format!("token {token}"))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let items: Vec<Value> = response.json().await.map_err(|_| {
            RelayError::CommitShape("commit list was not a JSON array".to_string())
        })?;
        items.iter().map(project_commit).collect()
    }
}

fn required(body: &Value, key: &str) -> std::result::Result<Value, RelayError> {
    body.get(key).cloned().ok_or(RelayError::MalformedUpstream)
}

fn required_str(body: &Value, key: &str) -> std::result::Result<String, RelayError> {
    body.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or(RelayError::MalformedUpstream)
}

fn project_repo(repo: &Value) -> std::result::Result<RepoSummary, RelayError> {
    let str_field = |key: &str| {
        repo.get(key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(RelayError::NoUserFound)
    };
    let html_url = str_field("html_url")?;

    Ok(RepoSummary {
        repo_name: str_field("full_name")?,
        repo_link: html_url.clone(),
        description: repo
            .get("description")
            .cloned()
            .ok_or(RelayError::NoUserFound)?,
        owner_fullname: repo
            .pointer("/owner/login")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(RelayError::NoUserFound)?,
        html_url,
    })
}

fn project_commit(entry: &Value) -> std::result::Result<CommitSummary, RelayError> {
    Ok(CommitSummary {
        commit_author: commit_field(entry, "/commit/author/name")?,
        commit_date: commit_field(entry, "/commit/author/date")?,
        commit_msg: commit_field(entry, "/commit/message")?,
    })
}

fn commit_field(entry: &Value, path: &str) -> std::result::Result<String, RelayError> {
    entry
        .pointer(path)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RelayError::CommitShape(format!("missing field `{path}` in commit object")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn profile_is_reduced_to_the_public_shape() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/user")
            .match_header("authorization", "token tok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "html_url": "https://github.com/alice",
                    "login": "alice",
                    "avatar_url": "https://avatars.example/alice",
                    "bio": null,
                    "name": "Alice",
                    "followers": 12
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let profile = client.get_profile("tok").await.unwrap();
        assert_eq!(profile.gh_username, "alice");
        assert_eq!(profile.gh_profile, "https://github.com/alice");
        assert_eq!(profile.gh_bio, Value::Null);
        assert_eq!(profile.name, json!("Alice"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn profile_with_a_missing_field_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/user")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "login": "alice" }).to_string())
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let err = client.get_profile("tok").await.unwrap_err();
        assert!(matches!(err, RelayError::MalformedUpstream));
    }

    #[tokio::test]
    async fn repositories_are_projected_to_summaries() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/alice/repos")
            .match_query(mockito::Matcher::UrlEncoded(
                "per_page".into(),
                "500".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{
                    "full_name": "alice/x",
                    "html_url": "https://github.com/alice/x",
                    "description": null,
                    "owner": { "login": "alice" }
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let repos = client.list_repos("tok", "alice").await.unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].repo_name, "alice/x");
        assert_eq!(repos[0].repo_link, "https://github.com/alice/x");
        assert_eq!(repos[0].description, Value::Null);
        assert_eq!(repos[0].owner_fullname, "alice");
        assert_eq!(repos[0].html_url, "https://github.com/alice/x");
    }

    #[tokio::test]
    async fn empty_repository_list_is_a_valid_zero_count() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/ghost/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let repos = client.list_repos("tok", "ghost").await.unwrap();
        assert!(repos.is_empty());
    }

    #[tokio::test]
    async fn upstream_error_message_passes_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/alice/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(json!({ "message": "API rate limit exceeded" }).to_string())
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let err = client.list_repos("tok", "alice").await.unwrap_err();
        match err {
            RelayError::Upstream(message) => assert_eq!(message, "API rate limit exceeded"),
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_repository_payload_reads_as_no_user_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/alice/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            // a list entry without the expected keys
            .with_body(json!([{ "unexpected": true }]).to_string())
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let err = client.list_repos("tok", "alice").await.unwrap_err();
        assert!(matches!(err, RelayError::NoUserFound));
    }

    #[tokio::test]
    async fn repository_fetch_exceeding_four_seconds_times_out() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/users/alice/repos")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            // headers arrive promptly, the body stalls past the 4 s budget
            .with_chunked_body(|writer| {
                use std::io::Write;
                std::thread::sleep(std::time::Duration::from_secs(6));
                writer.write_all(b"[]")
            })
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let err = client.list_repos("tok", "alice").await.unwrap_err();
        assert!(matches!(err, RelayError::UpstreamTimeout));
    }

    #[tokio::test]
    async fn commits_are_projected_from_nested_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/a/b/commits")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([{
                    "sha": "deadbeef",
                    "commit": {
                        "author": { "name": "Bob", "date": "2021-01-01T00:00:00Z" },
                        "message": "fix"
                    }
                }])
                .to_string(),
            )
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let commits = client.list_commits("tok", "a", "b").await.unwrap();
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].commit_author, "Bob");
        assert_eq!(commits[0].commit_date, "2021-01-01T00:00:00Z");
        assert_eq!(commits[0].commit_msg, "fix");
    }

    #[tokio::test]
    async fn commit_shape_fault_names_the_missing_field() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/repos/a/b/commits")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!([{ "commit": { "message": "fix" } }]).to_string())
            .create_async()
            .await;

        let client = GithubClient::new(&server.url()).unwrap();
        let err = client.list_commits("tok", "a", "b").await.unwrap_err();
        match err {
            RelayError::CommitShape(message) => {
                assert!(message.contains("/commit/author/name"))
            }
            other => panic!("expected CommitShape, got {other:?}"),
        }
    }
}
