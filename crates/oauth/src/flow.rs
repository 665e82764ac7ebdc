use std::time::Duration;

use crate::{
    auth_url::build_auth_url,
    error::{OAuthError, Result},
    exchange, refresh,
    transport::{DEFAULT_TIMEOUT, HttpTransport, ReqwestTransport, RetryPolicy, RetryingTransport},
    types::{AuthorizationCode, CallbackParams, OAuthConfig, TokenResponse},
};

/// Authorization-code flow bound to one client configuration.
///
/// Holds no per-request state: codes and refresh tokens are always passed in,
/// so a single instance can be shared across concurrent callers.
pub struct OAuthFlow {
    config: OAuthConfig,
    transport: Box<dyn HttpTransport>,
}

impl OAuthFlow {
    /// Flow over the reqwest transport with the default request timeout.
    pub fn new(config: OAuthConfig) -> Result<Self> {
        Self::with_timeout(config, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(config: OAuthConfig, timeout: Duration) -> Result<Self> {
        let transport = ReqwestTransport::new(timeout)?;
        Self::with_transport(config, transport)
    }

    pub fn with_transport(
        config: OAuthConfig,
        transport: impl HttpTransport + 'static,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            transport: Box::new(transport),
        })
    }

    /// Retry transport failures according to `policy`. A single-attempt policy is a no-op.
    pub fn with_retry(self, policy: RetryPolicy) -> Self {
        if policy.max_attempts <= 1 {
            return self;
        }
        Self {
            config: self.config,
            transport: Box::new(RetryingTransport::new(self.transport, policy)),
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// URL to redirect the user to.
    pub fn authorization_url(&self) -> Result<String> {
        build_auth_url(&self.config)
    }

    pub async fn exchange_code(&self, code: AuthorizationCode) -> Result<TokenResponse> {
        exchange::exchange_code(&self.transport, &self.config, code).await
    }

    pub async fn handle_callback(&self, params: CallbackParams) -> Result<TokenResponse> {
        exchange::handle_callback(&self.transport, &self.config, params).await
    }

    /// Refresh with an explicit refresh token. The response is returned as is.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        refresh::refresh_token(&self.transport, &self.config, refresh_token).await
    }

    /// Refresh `current`, carrying its refresh token over when the provider
    /// does not rotate it.
    pub async fn refresh(&self, current: &TokenResponse) -> Result<TokenResponse> {
        let Some(previous) = current.refresh_token.as_deref() else {
            return Err(OAuthError::Configuration(
                "token set has no refresh token".into(),
            ));
        };
        let fresh = self.refresh_token(previous).await?;
        Ok(fresh.retain_refresh_token(Some(previous)))
    }
}
