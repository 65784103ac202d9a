//! HTTP handlers for the OAuth handshake and the proxy endpoints.
//!
//! Every failure is converted at this boundary into its wire shape via
//! [`RelayError`]; there is no retry and no centralized recovery.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::{Html, Redirect},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::auth::oauth::generate_state;
use crate::error::RelayError;
use crate::github::client::{CommitSummary, Profile, RepoSummary};
use crate::session::SessionId;

use super::AppState;

/// Login entry page.
///
/// Issues a fresh `state`, stores it in the session and embeds it in the
/// page so a front-end managing its own redirect can pick it up.
pub async fn show_login(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(sid)): Extension<SessionId>,
) -> Html<String> {
    let login_state = generate_state();
    state.sessions.set_state(&sid, login_state.clone());

    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Sign in with GitHub</title>
</head>
<body>
    <h1>GitHub Relay</h1>
    <p>Sign in to let this relay read your profile, repositories and commits.</p>
    <input type="hidden" name="state" value="{login_state}">
    <p><a href="/handleLogin">Sign in with GitHub</a></p>
</body>
</html>
"#
    ))
}

/// Start the authorization-code dance: issue a `state`, store it (replacing
/// any prior value) and redirect to the provider's authorize endpoint.
pub async fn handle_login(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(sid)): Extension<SessionId>,
) -> Redirect {
    let login_state = generate_state();
    state.sessions.set_state(&sid, login_state.clone());

    let url = state.oauth.authorization_url(&login_state);
    Redirect::temporary(url.as_str())
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
}

/// Provider callback: validate `state`, exchange `code`, store the token.
pub async fn handle_callback(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(sid)): Extension<SessionId>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, RelayError> {
    let expected = state.sessions.state(&sid);
    if expected.is_none() || params.state != expected {
        tracing::warn!("callback state did not match the session state");
        return Err(RelayError::InvalidState);
    }

    let code = params
        .code
        .as_deref()
        .filter(|code| !code.is_empty())
        .ok_or(RelayError::MissingCode)?;

    let token = state.oauth.exchange_code(code).await?;
    state.sessions.set_access_token(&sid, token.clone());

    Ok(Json(json!({ "access_token": token })))
}

/// GET /index — the authenticated user's reduced profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(sid)): Extension<SessionId>,
) -> Result<Json<Profile>, RelayError> {
    let token = state
        .sessions
        .access_token(&sid)
        .ok_or(RelayError::ProfileUnauthorized)?;

    let profile = state.github.get_profile(&token).await?;
    Ok(Json(profile))
}

#[derive(Debug, Serialize)]
pub struct RepoListing {
    pub repo_count: usize,
    pub repo_info: Vec<RepoSummary>,
}

/// GET /user/:username — one page of the user's repositories.
pub async fn get_repos(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(sid)): Extension<SessionId>,
    Path(username): Path<String>,
) -> Result<Json<RepoListing>, RelayError> {
    let token = state
        .sessions
        .access_token(&sid)
        .ok_or(RelayError::Unauthorized)?;
    if username.trim().is_empty() {
        return Err(RelayError::MissingUsername);
    }

    let repos = state.github.list_repos(&token, &username).await?;
    Ok(Json(RepoListing {
        repo_count: repos.len(),
        repo_info: repos,
    }))
}

#[derive(Debug, Serialize)]
pub struct CommitListing {
    pub commits: Vec<CommitSummary>,
}

/// GET /user/:username/:repo_name/commits — the repository's commit list.
pub async fn get_commits(
    State(state): State<Arc<AppState>>,
    Extension(SessionId(sid)): Extension<SessionId>,
    Path((username, repo_name)): Path<(String, String)>,
) -> Result<Json<CommitListing>, RelayError> {
    let token = state
        .sessions
        .access_token(&sid)
        .ok_or(RelayError::Unauthorized)?;
    if username.trim().is_empty() || repo_name.trim().is_empty() {
        return Err(RelayError::MissingParams);
    }

    let commits = state
        .github
        .list_commits(&token, &username, &repo_name)
        .await?;
    Ok(Json(CommitListing { commits }))
}
