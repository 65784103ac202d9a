pub mod oauth;

pub use oauth::{generate_state, OAuthClient, OAuthConfig, STATE_LEN};
