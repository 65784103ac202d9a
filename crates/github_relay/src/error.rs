use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// Everything the relay can fail with, across the OAuth dance and the
/// three proxy operations.
///
/// The wire rendering is deliberately uneven: several failures answer with
/// HTTP 200 and an error key in the JSON body, the profile endpoint answers
/// missing-token and malformed-upstream with plain text. Those shapes are
/// load-bearing for the front end, so the mapping in [`IntoResponse`] keeps
/// them while this enum keeps the taxonomy in one place.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("invalid state parameter")]
    InvalidState,

    #[error("no authorization code in callback")]
    MissingCode,

    #[error("error retrieving access_token")]
    TokenExchangeFailed,

    /// Missing token on the repository/commit endpoints (JSON body).
    #[error("access token has expired or not in session")]
    Unauthorized,

    /// Missing token on the profile endpoint, which historically answers
    /// with a plain 404 instead of the JSON error body.
    #[error("access token has expired or not in session")]
    ProfileUnauthorized,

    #[error("github username needed to fetch repos")]
    MissingUsername,

    #[error("github username or repo name missing")]
    MissingParams,

    #[error("connection timed out")]
    UpstreamTimeout,

    /// Non-2xx from the GitHub API; carries the upstream message verbatim.
    #[error("{0}")]
    Upstream(String),

    #[error("unexpected response shape from github")]
    MalformedUpstream,

    /// The repository endpoint reports any shape fault in the upstream
    /// payload as "no user found". See DESIGN.md.
    #[error("no user found")]
    NoUserFound,

    /// Shape fault while projecting a commit; the message describes the
    /// missing field and is returned as the error payload.
    #[error("{0}")]
    CommitShape(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidState => StatusCode::UNAUTHORIZED,
            Self::MissingCode | Self::TokenExchangeFailed => StatusCode::NOT_FOUND,
            Self::ProfileUnauthorized | Self::NoUserFound => StatusCode::NOT_FOUND,
            Self::MalformedUpstream => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized
            | Self::MissingUsername
            | Self::MissingParams
            | Self::UpstreamTimeout
            | Self::Upstream(_)
            | Self::CommitShape(_) => StatusCode::OK,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        match self {
            Self::ProfileUnauthorized | Self::MalformedUpstream => {
                (status, message).into_response()
            }
            Self::Unauthorized => {
                (status, Json(json!({ "invalid_access_token": message }))).into_response()
            }
            Self::MissingUsername => {
                (status, Json(json!({ "username_not_given": message }))).into_response()
            }
            Self::NoUserFound => {
                (status, Json(json!({ "no_user_found": message }))).into_response()
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}
