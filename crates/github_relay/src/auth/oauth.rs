use anyhow::{Context, Result};
use rand::Rng;
use reqwest::header;
use serde_json::Value;
use url::Url;

use crate::error::RelayError;

/// Length of the CSRF `state` nonce issued at login time.
pub const STATE_LEN: usize = 32;

const STATE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generate the CSRF `state` nonce: 32 characters drawn from uppercase
/// letters and digits. Unpredictable, not a cryptographic secret.
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    (0..STATE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..STATE_CHARSET.len());
            STATE_CHARSET[idx] as char
        })
        .collect()
}

/// OAuth provider configuration.
///
/// Endpoint URLs are parameters (not constants) so tests can point the
/// client at a local stub server.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub authorize_url: Url,
    pub token_url: Url,
    pub scopes: Vec<String>,
    pub allow_signup: bool,
}

impl OAuthConfig {
    /// GitHub OAuth app configuration from the environment.
    ///
    /// Requires GITHUB_CLIENT_ID and GITHUB_CLIENT_SECRET to be set.
    pub fn github() -> Result<Self> {
        let client_id = std::env::var("GITHUB_CLIENT_ID")
            .context("GITHUB_CLIENT_ID environment variable not set")?;
        let client_secret = std::env::var("GITHUB_CLIENT_SECRET")
            .context("GITHUB_CLIENT_SECRET environment variable not set")?;

        Self::with_endpoints(
            client_id,
            client_secret,
            "https://github.com/login/oauth/authorize",
            "https://github.com/login/oauth/access_token",
        )
    }

    pub fn with_endpoints(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        authorize_url: &str,
        token_url: &str,
    ) -> Result<Self> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            authorize_url: Url::parse(authorize_url).context("invalid authorize URL")?,
            token_url: Url::parse(token_url).context("invalid token URL")?,
            scopes: vec![
                "user".to_string(),
                "repo".to_string(),
                "public_repo".to_string(),
            ],
            allow_signup: true,
        })
    }
}

/// Client for the authorization-code dance with the provider.
pub struct OAuthClient {
    config: OAuthConfig,
    http: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Build the authorize redirect URL for a login attempt.
    ///
    /// Carries `client_id`, the caller's `state`, the fixed scope set and
    /// `allow_signup`; nothing here is stored beyond the session's `state`.
    pub fn authorization_url(&self, state: &str) -> Url {
        let mut url = self.config.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("state", state)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair(
                "allow_signup",
                if self.config.allow_signup { "true" } else { "false" },
            );
        url
    }

    /// Exchange an authorization code for an access token.
    ///
    /// One POST to the token endpoint with `client_id`, `client_secret` and
    /// `code` as query parameters, requesting a JSON reply. Any reply
    /// without an `access_token` field is a failed exchange.
    pub async fn exchange_code(&self, code: &str) -> std::result::Result<String, RelayError> {
        let response = self
            .http
            .post(self.config.token_url.clone())
            .query(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("code", code),
            ])
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let body: Value = response
            .json()
            .await
            .map_err(|_| RelayError::TokenExchangeFailed)?;

        match body.get("access_token").and_then(Value::as_str) {
            Some(token) => Ok(token.to_string()),
            None => {
                tracing::error!(reply = %body, "token endpoint reply carried no access_token");
                Err(RelayError::TokenExchangeFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base: &str) -> OAuthConfig {
        OAuthConfig::with_endpoints(
            "cid",
            "secret",
            &format!("{base}/login/oauth/authorize"),
            &format!("{base}/login/oauth/access_token"),
        )
        .unwrap()
    }

    #[test]
    fn state_is_32_chars_of_uppercase_and_digits() {
        let state = generate_state();
        assert_eq!(state.len(), STATE_LEN);
        assert!(state
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn consecutive_states_differ() {
        assert_ne!(generate_state(), generate_state());
    }

    #[test]
    fn authorization_url_carries_the_login_parameters() {
        let client = OAuthClient::new(test_config("https://github.com"));
        let url = client.authorization_url("STATE123");

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("client_id".to_string(), "cid".to_string())));
        assert!(pairs.contains(&("state".to_string(), "STATE123".to_string())));
        assert!(pairs.contains(&("scope".to_string(), "user repo public_repo".to_string())));
        assert!(pairs.contains(&("allow_signup".to_string(), "true".to_string())));
    }

    #[tokio::test]
    async fn exchange_code_returns_the_upstream_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/login/oauth/access_token")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("client_id".into(), "cid".into()),
                mockito::Matcher::UrlEncoded("client_secret".into(), "secret".into()),
                mockito::Matcher::UrlEncoded("code".into(), "abc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"tok_123","token_type":"bearer"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(test_config(&server.url()));
        let token = client.exchange_code("abc").await.unwrap();
        assert_eq!(token, "tok_123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exchange_without_token_in_reply_fails() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/login/oauth/access_token")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"bad_verification_code"}"#)
            .create_async()
            .await;

        let client = OAuthClient::new(test_config(&server.url()));
        let err = client.exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, RelayError::TokenExchangeFailed));
    }
}
