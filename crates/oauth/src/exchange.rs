use {
    secrecy::ExposeSecret,
    tracing::{info, warn},
};

use crate::{
    error::{OAuthError, Result},
    token::request_token,
    transport::{HttpTransport, TokenRequest},
    types::{AuthorizationCode, CallbackParams, OAuthConfig, TokenResponse},
};

/// Build the `authorization_code` grant request. Client credentials travel in the body.
pub fn code_request(config: &OAuthConfig, code: AuthorizationCode) -> TokenRequest {
    TokenRequest::new(config.token_url())
        .param("grant_type", "authorization_code")
        .param("code", code.into_inner())
        .param("redirect_uri", config.redirect_uri.as_str())
        .param("client_id", config.client_id.as_str())
        .param("client_secret", config.client_secret.expose_secret().as_str())
}

/// Exchange an authorization code for a token set.
///
/// The code is consumed; a provider will reject a second exchange of the same
/// value with HTTP 400, which surfaces as [`OAuthError::Exchange`].
pub async fn exchange_code<T: HttpTransport + ?Sized>(
    transport: &T,
    config: &OAuthConfig,
    code: AuthorizationCode,
) -> Result<TokenResponse> {
    config.validate()?;
    let tokens = request_token(transport, code_request(config, code)).await?;
    info!(client_id = %config.client_id, "authorization code exchanged");
    Ok(tokens)
}

/// Handle the provider's redirect back to us.
///
/// A callback carrying `error` is reported as [`OAuthError::AuthorizationDenied`]
/// without contacting the token endpoint.
pub async fn handle_callback<T: HttpTransport + ?Sized>(
    transport: &T,
    config: &OAuthConfig,
    params: CallbackParams,
) -> Result<TokenResponse> {
    let code = params.into_code().inspect_err(|e| {
        if let OAuthError::AuthorizationDenied { reason, .. } = e {
            warn!(%reason, "authorization denied by provider");
        }
    })?;
    exchange_code(transport, config, code).await
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Mutex, time::Duration};

    use {async_trait::async_trait, secrecy::SecretString};

    use super::*;
    use crate::{
        error::TransportError,
        transport::{
            DEFAULT_TIMEOUT, HttpResponse, ReqwestTransport, tests::ScriptedTransport,
        },
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

    const TOKEN_BODY: &str = r#"{"access_token":"at-1","token_type":"Bearer","expires_in":3600,"refresh_token":"rt-1","scope":"read"}"#;

    /// Provider double that accepts each issued code exactly once.
    struct SingleUseProvider {
        issued: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl HttpTransport for SingleUseProvider {
        async fn send(&self, request: TokenRequest) -> Result<HttpResponse, TransportError> {
            let code = request.form_value("code").unwrap_or_default().to_string();
            if self.issued.lock().unwrap().remove(&code) {
                Ok(HttpResponse::new(200, TOKEN_BODY))
            } else {
                Ok(HttpResponse::new(
                    400,
                    r#"{"error":"invalid_grant","error_description":"Invalid authorization code"}"#,
                ))
            }
        }
    }

    #[tokio::test]
    async fn test_exchange_sends_form_body() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, TOKEN_BODY))]);
        let cfg = config("https://provider");

        let tokens = exchange_code(&transport, &cfg, AuthorizationCode::new("c0de").unwrap())
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("rt-1"));

        let req = transport.last_request();
        assert_eq!(req.url, "https://provider/api/token");
        assert_eq!(req.form_value("grant_type"), Some("authorization_code"));
        assert_eq!(req.form_value("code"), Some("c0de"));
        assert_eq!(req.form_value("redirect_uri"), Some("http://localhost/cb"));
        assert_eq!(req.form_value("client_id"), Some("abc"));
        assert_eq!(req.form_value("client_secret"), Some("xyz"));
        assert!(req.header_value("authorization").is_none());
    }

    #[tokio::test]
    async fn test_reused_code_is_rejected() {
        let provider = SingleUseProvider {
            issued: Mutex::new(HashSet::from(["once".to_string()])),
        };
        let cfg = config("https://provider");

        let first = exchange_code(&provider, &cfg, AuthorizationCode::new("once").unwrap()).await;
        assert!(first.is_ok());

        let second = exchange_code(&provider, &cfg, AuthorizationCode::new("once").unwrap()).await;
        match second {
            Err(OAuthError::Exchange { status_code, body }) => {
                assert_eq!(status_code, 400);
                assert!(body.contains("invalid_grant"));
            },
            other => panic!("expected Exchange error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_invalid_grant_is_exchange_error_not_transport() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
        let err = exchange_code(
            &transport,
            &config(&server.url()),
            AuthorizationCode::new("expired").unwrap(),
        )
        .await
        .unwrap_err();

        match err {
            OAuthError::Exchange { status_code, body } => {
                assert_eq!(status_code, 400);
                assert!(body.contains("invalid_grant"));
            },
            other => panic!("expected Exchange error, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_exchange_against_mock_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/token")
            .match_header("content-type", "application/x-www-form-urlencoded")
            .match_body(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
                mockito::Matcher::UrlEncoded("code".into(), "AQD+x/y".into()),
                mockito::Matcher::UrlEncoded("redirect_uri".into(), "http://localhost/cb".into()),
                mockito::Matcher::UrlEncoded("client_id".into(), "abc".into()),
                mockito::Matcher::UrlEncoded("client_secret".into(), "xyz".into()),
            ]))
            .with_status(200)
            .with_body(TOKEN_BODY)
            .create_async()
            .await;

        let transport = ReqwestTransport::new(DEFAULT_TIMEOUT).unwrap();
        let tokens = exchange_code(
            &transport,
            &config(&server.url()),
            AuthorizationCode::new("AQD+x/y").unwrap(),
        )
        .await
        .unwrap();

        assert_eq!(tokens.scope, "read");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_unparseable_success_body_is_protocol_error() {
        let transport =
            ScriptedTransport::new(vec![Ok(HttpResponse::new(200, "<html>oops</html>"))]);
        let err = exchange_code(
            &transport,
            &config("https://provider"),
            AuthorizationCode::new("c").unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OAuthError::Protocol(_)));
    }

    #[tokio::test]
    async fn test_network_failure_is_transport_error() {
        let transport =
            ScriptedTransport::new(vec![Err(TransportError::timeout("operation timed out"))]);
        let err = exchange_code(
            &transport,
            &config("https://provider"),
            AuthorizationCode::new("c").unwrap(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OAuthError::Transport(ref t) if t.timed_out));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_unresponsive_provider_times_out() {
        // Accepts connections and never writes a response.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let transport = ReqwestTransport::new(Duration::from_millis(200)).unwrap();
        let started = tokio::time::Instant::now();
        let err = exchange_code(
            &transport,
            &config(&format!("http://{addr}")),
            AuthorizationCode::new("c").unwrap(),
        )
        .await
        .unwrap_err();

        match err {
            OAuthError::Transport(t) => assert!(t.timed_out, "not a timeout: {}", t.message),
            other => panic!("expected Transport error, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_denied_callback_never_posts() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, TOKEN_BODY))]);
        let params = CallbackParams::from_query("?error=access_denied");

        let err = handle_callback(&transport, &config("https://provider"), params)
            .await
            .unwrap_err();

        match err {
            OAuthError::AuthorizationDenied { reason, .. } => assert_eq!(reason, "access_denied"),
            other => panic!("expected AuthorizationDenied, got {other:?}"),
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_callback_with_code_is_exchanged() {
        let transport = ScriptedTransport::new(vec![Ok(HttpResponse::new(200, TOKEN_BODY))]);
        let params = CallbackParams::from_query("code=abc123");

        let tokens = handle_callback(&transport, &config("https://provider"), params)
            .await
            .unwrap();
        assert_eq!(tokens.access_token, "at-1");
        assert_eq!(transport.last_request().form_value("code"), Some("abc123"));
    }

    #[tokio::test]
    async fn test_missing_secret_fails_before_network() {
        let transport = ScriptedTransport::new(vec![]);
        let mut cfg = config("https://provider");
        cfg.client_secret = SecretString::new(String::new());

        let err = exchange_code(&transport, &cfg, AuthorizationCode::new("c").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::Configuration(_)));
        assert_eq!(transport.calls(), 0);
    }
}
