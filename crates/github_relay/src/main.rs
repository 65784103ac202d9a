// GitHub OAuth relay server.
//
// Holds the OAuth client secret and proxies read-only GitHub API calls for
// a front-end running on another origin.

use std::env;

use github_relay::{start_server, OAuthConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let host = args.get(1).map(|s| s.as_str()).unwrap_or("0.0.0.0");
    let port = args
        .get(2)
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(4000);

    let config = OAuthConfig::github()?;
    tracing::info!("github oauth app configured: client_id={}", config.client_id);

    start_server(host, port, config).await
}
