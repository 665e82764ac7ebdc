use {
    base64::{Engine, engine::general_purpose::STANDARD},
    secrecy::ExposeSecret,
    tracing::info,
};

use crate::{
    error::{OAuthError, Result},
    token::request_token,
    transport::{HttpTransport, TokenRequest},
    types::{OAuthConfig, TokenResponse},
};

/// `base64(client_id ":" client_secret)`, the HTTP Basic credential (RFC 7617).
pub fn basic_credential(config: &OAuthConfig) -> String {
    let raw = format!(
        "{}:{}",
        config.client_id,
        config.client_secret.expose_secret()
    );
    STANDARD.encode(raw.as_bytes())
}

/// Build the `refresh_token` grant request. Client credentials travel in the
/// `Authorization` header, never in the body.
pub fn refresh_request(config: &OAuthConfig, refresh_token: &str) -> TokenRequest {
    TokenRequest::new(config.token_url())
        .header("Authorization", format!("Basic {}", basic_credential(config)))
        .param("grant_type", "refresh_token")
        .param("refresh_token", refresh_token)
}

/// Obtain a new access token with a previously issued refresh token.
///
/// The response may omit `refresh_token`; callers keep the one they already
/// hold (see [`TokenResponse::retain_refresh_token`]).
pub async fn refresh_token<T: HttpTransport + ?Sized>(
    transport: &T,
    config: &OAuthConfig,
    refresh_token: &str,
) -> Result<TokenResponse> {
    config.validate()?;
    if refresh_token.trim().is_empty() {
        return Err(OAuthError::Configuration("refresh token is empty".into()));
    }

    let tokens = request_token(transport, refresh_request(config, refresh_token)).await?;
    info!(
        client_id = %config.client_id,
        rotated = tokens.refresh_token.is_some(),
        "access token refreshed"
    );
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::{
        error::TransportError,
        transport::{DEFAULT_TIMEOUT, HttpResponse, ReqwestTransport, tests::ScriptedTransport},
    };

    fn config(base_url: &str) -> OAuthConfig {
        OAuthConfig {
            client_id: "abc".into(),
            client_secret: SecretString::new("xyz".into()),
            redirect_uri: "http://localhost/cb".into(),
            scopes: vec!["read".into()],
            base_url: base_url.into(),
        }
    }

    #[test]
    fn test_basic_credential() {
        assert_eq!(basic_credential(&config("https://provider")), "YWJjOnh5eg==");
    }

    #[test]
    fn test_basic_credential_is_utf8_bytes() {
        let mut cfg = config("https://provider");
        cfg.client_id = "clïent".into();
        cfg.client_secret = SecretString::new("s:e/c+r".into());
        let decoded = STANDARD.decode(basic_credential(&cfg)).unwrap();
        assert_eq!(decoded, "clïent:s:e/c+r".as_bytes());
    }

    #[tokio::test]
    async fn test_refresh_request_shape() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
            200,
            r#"{"access_token":"at-2","token_type":"Bearer","expires_in":3600,"scope":"read"}"#,
        ))]);

        let tokens = refresh_token(&transport, &config("https://provider"), "rt-1")
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "at-2");
        assert!(tokens.refresh_token.is_none());

        let req = transport.last_request();
        assert_eq!(req.url, "https://provider/api/token");
        assert_eq!(req.header_value("authorization"), Some("Basic YWJjOnh5eg=="));
        assert_eq!(
            req.header_value("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(req.form_value("grant_type"), Some("refresh_token"));
        assert_eq!(req.form_value("refresh_token"), Some("rt-1"));
        assert!(req.form_value("client_secret").is_none());
        assert!(req.form_value("client_id").is_none());
    }

    #[tokio::test]
    async fn test_refresh_against_mock_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .match_header("authorization", "Basic YWJjOnh5eg==")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                mockito::Matcher::UrlEncoded("refresh_token".into(), "rt-1".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"access_token":"at-2","token_type":"Bearer","expires_in":3600,"refresh_token":"rt-2","scope":"read"}"#,
            )
            .create_async()
            .await;

        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
        let tokens = refresh_token(&transport, &config(&server.url()), "rt-1")
            .await
            .unwrap();
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-2"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_revoked_refresh_token_is_exchange_error() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(
            400,
            r#"{"error":"invalid_grant","error_description":"Refresh token revoked"}"#,
        ))]);

        let err = refresh_token(&transport, &config("https://provider"), "rt-1")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::Exchange { status_code: 400, .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::new("connection refused"))]);
        let err = refresh_token(&transport, &config("https://provider"), "rt-1")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::Transport(_)));
    }

    #[tokio::test]
    async fn test_empty_refresh_token_fails_before_network() {
        let transport = ScriptedTransport::new(vec![]);
        let err = refresh_token(&transport, &config("https://provider"), "  ")
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::Configuration(_)));
        assert_eq!(transport.calls(), 0);
    }
}
