use std::time::Duration;

use {
    authcode_oauth::{OAuthConfig, OAuthError, RetryPolicy},
    secrecy::SecretString,
    serde::Deserialize,
};

// ── Sections ─────────────────────────────────────────────────────────────────

/// Root of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub client: ClientConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Root of the identity provider; `/authorize` and `/api/token` hang off it.
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://accounts.spotify.com".into(),
        }
    }
}

/// Registered application credentials plus the authorization request shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<SecretString>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: "http://127.0.0.1:5000/callback".into(),
            scopes: vec!["user-read-private".into(), "user-read-email".into()],
        }
    }
}

/// Outbound HTTP behaviour towards the token endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Total attempts per token request; only transport failures are retried.
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            max_attempts: 1,
            retry_base_delay_ms: 250,
        }
    }
}

/// Where `authcode serve` listens.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

// ── Derived values ───────────────────────────────────────────────────────────

impl AppConfig {
    /// Assemble the immutable client configuration, rejecting missing credentials.
    pub fn oauth_config(&self) -> Result<OAuthConfig, OAuthError> {
        let client_id = self.client.client_id.clone().ok_or_else(|| {
            OAuthError::Configuration(
                "client.client_id is not set (config file or AUTHCODE_CLIENT_ID)".into(),
            )
        })?;
        let client_secret = self.client.client_secret.clone().ok_or_else(|| {
            OAuthError::Configuration(
                "client.client_secret is not set (config file or AUTHCODE_CLIENT_SECRET)".into(),
            )
        })?;

        let config = OAuthConfig {
            client_id,
            client_secret,
            redirect_uri: self.client.redirect_uri.clone(),
            scopes: self.client.scopes.clone(),
            base_url: self.provider.base_url.clone(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.http.max_attempts,
            Duration::from_millis(self.http.retry_base_delay_ms),
        )
    }

    /// Path component of the redirect URI, e.g. `/callback`. Always starts with `/`.
    pub fn callback_path(&self) -> String {
        url::Url::parse(&self.client.redirect_uri)
            .ok()
            .filter(|u| !u.cannot_be_a_base())
            .map(|u| u.path().to_string())
            .unwrap_or_else(|| "/callback".into())
    }

    /// Port the redirect URI points at, used to bind the one-shot login listener.
    pub fn callback_port(&self) -> u16 {
        url::Url::parse(&self.client.redirect_uri)
            .ok()
            .and_then(|u| u.port_or_known_default())
            .unwrap_or(self.server.port)
    }
}
