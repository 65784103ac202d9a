//! GitHub OAuth Relay
//!
//! Performs the OAuth2 authorization-code exchange with GitHub on behalf of
//! a front-end on another origin, then proxies three read-only API calls
//! (profile, repositories, commits) using the session-bound access token.
//! The client secret never leaves this process.

pub mod auth;
pub mod error;
pub mod github;
pub mod server;
pub mod session;

pub use auth::oauth::{generate_state, OAuthClient, OAuthConfig};
pub use error::RelayError;
pub use github::client::{CommitSummary, GithubClient, Profile, RepoSummary};
pub use server::{router, start_server, AppState};
pub use session::{Session, SessionStore};
