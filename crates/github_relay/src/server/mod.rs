//! HTTP server wiring.
//!
//! Routes the OAuth handshake and the three proxy endpoints, binds every
//! request to a session, and applies permissive CORS so a front-end on
//! another origin can call the relay directly.

pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::auth::oauth::{OAuthClient, OAuthConfig};
use crate::github::client::{GithubClient, GITHUB_API_BASE};
use crate::session::{self, SessionStore};

/// Application state shared across handlers.
pub struct AppState {
    pub oauth: OAuthClient,
    pub github: GithubClient,
    pub sessions: SessionStore,
}

/// Build the relay router over the given state.
pub fn router(state: Arc<AppState>) -> Router {
    let sessions = state.sessions.clone();
    Router::new()
        .route("/", get(handlers::show_login))
        .route(
            "/handleLogin",
            get(handlers::handle_login),
        )
        .route(
            "/callback",
            get(handlers::handle_callback).post(handlers::handle_callback),
        )
        .route("/index", get(handlers::get_profile))
        .route("/user/:username", get(handlers::get_repos))
        .route(
            "/user/:username/:repo_name/commits",
            get(handlers::get_commits),
        )
        .layer(middleware::from_fn_with_state(
            sessions,
            session::attach_session,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the relay HTTP server.
///
/// # Errors
/// Returns an error if the GitHub client cannot be built or binding the
/// listen address fails.
pub async fn start_server(host: &str, port: u16, config: OAuthConfig) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        oauth: OAuthClient::new(config),
        github: GithubClient::new(GITHUB_API_BASE)?,
        sessions: SessionStore::new(),
    });
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;

    info!("github relay listening on {}", addr);
    info!("available endpoints:");
    info!("  GET      /                                   - login entry page");
    info!("  GET      /handleLogin                        - redirect to GitHub authorize");
    info!("  GET|POST /callback                           - exchange code for access token");
    info!("  GET      /index                              - authenticated user profile");
    info!("  GET      /user/:username                     - repository listing");
    info!("  GET      /user/:username/:repo_name/commits  - commit listing");

    axum::serve(listener, app).await?;

    Ok(())
}
