use std::fmt;

use {
    secrecy::{ExposeSecret, SecretString},
    serde::{Deserialize, Serialize},
};

use crate::error::{OAuthError, Result};

/// Path of the provider's user-facing login page, relative to the base URL.
pub const AUTHORIZE_PATH: &str = "/authorize";
/// Path of the provider's token endpoint, relative to the base URL.
pub const TOKEN_PATH: &str = "/api/token";

/// OAuth 2.0 client configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    /// Must match the URI registered with the provider, and is sent with
    /// both the authorization request and the code exchange.
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Provider root, e.g. `https://accounts.spotify.com`.
    pub base_url: String,
}

impl OAuthConfig {
    pub fn auth_url(&self) -> String {
        format!("{}{AUTHORIZE_PATH}", self.base_url.trim_end_matches('/'))
    }

    pub fn token_url(&self) -> String {
        format!("{}{TOKEN_PATH}", self.base_url.trim_end_matches('/'))
    }

    /// Check that every field the flow relies on is present and well formed.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(OAuthError::Configuration("client_id is empty".into()));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(OAuthError::Configuration("client_secret is empty".into()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(OAuthError::Configuration("redirect_uri is empty".into()));
        }
        let redirect = url::Url::parse(&self.redirect_uri).map_err(|e| {
            OAuthError::Configuration(format!(
                "redirect_uri '{}' is not a URL: {e}",
                self.redirect_uri
            ))
        })?;
        // The callback is served locally, so it needs an HTTP path to route on.
        if redirect.cannot_be_a_base() || !matches!(redirect.scheme(), "http" | "https") {
            return Err(OAuthError::Configuration(format!(
                "redirect_uri '{}' must be an http or https URL",
                self.redirect_uri
            )));
        }
        let base = url::Url::parse(&self.base_url).map_err(|e| {
            OAuthError::Configuration(format!("base_url '{}' is not a URL: {e}", self.base_url))
        })?;
        if base.cannot_be_a_base() {
            return Err(OAuthError::Configuration(format!(
                "base_url '{}' cannot be used as a base URL",
                self.base_url
            )));
        }
        Ok(())
    }
}

/// Single-use code handed back by the provider after consent.
///
/// Deliberately not `Clone`: exchanging a code consumes it.
pub struct AuthorizationCode(String);

impl AuthorizationCode {
    pub fn new(code: impl Into<String>) -> Result<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(OAuthError::Protocol("authorization code is empty".into()));
        }
        Ok(Self(code))
    }

    pub(crate) fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for AuthorizationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationCode([REDACTED])")
    }
}

/// Token set returned by the token endpoint for both grant types.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
    /// Providers may omit this on refresh; see [`TokenResponse::retain_refresh_token`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Space-separated list of granted scopes.
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    /// Keep the previously held refresh token when the provider did not issue a new one.
    ///
    /// Absence of `refresh_token` in a refresh response never means revocation.
    pub fn retain_refresh_token(mut self, previous: Option<&str>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.map(str::to_string);
        }
        self
    }

    /// Value for the `Authorization` header of subsequent API calls.
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    /// Unix timestamp at which the access token expires, given when it was issued.
    pub fn expires_at(&self, issued_at: u64) -> u64 {
        issued_at.saturating_add(self.expires_in)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("scope", &self.scope)
            .finish()
    }
}

/// Query parameters the provider appends when redirecting back to us.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub state: Option<String>,
}

impl CallbackParams {
    /// Parse from a raw query string (with or without the leading `?`).
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = value.into_owned();
            match key.as_ref() {
                "code" => params.code = Some(value),
                "error" => params.error = Some(value),
                "error_description" => params.error_description = Some(value),
                "state" => params.state = Some(value),
                _ => {},
            }
        }
        params
    }

    /// Parse the query component of a full callback URL.
    pub fn from_url(callback_url: &str) -> Result<Self> {
        let url = url::Url::parse(callback_url)
            .map_err(|e| OAuthError::Protocol(format!("invalid callback URL: {e}")))?;
        Ok(Self::from_query(url.query().unwrap_or_default()))
    }

    /// Resolve the callback into a code to exchange.
    ///
    /// An `error` parameter takes precedence over `code`.
    pub fn into_code(self) -> Result<AuthorizationCode> {
        if let Some(reason) = self.error {
            return Err(OAuthError::AuthorizationDenied {
                reason,
                description: self.error_description,
            });
        }
        match self.code {
            Some(code) => AuthorizationCode::new(code),
            None => Err(OAuthError::Protocol(
                "callback carried neither 'code' nor 'error'".into(),
            )),
        }
    }
}
