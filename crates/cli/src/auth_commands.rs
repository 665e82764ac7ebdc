use std::time::Duration;

use {
    anyhow::{Context, Result},
    authcode_config::AppConfig,
    authcode_oauth::{AuthorizationCode, CallbackServer, OAuthFlow, TokenResponse},
    tracing::warn,
};

/// Flow configured from `config`: validated credentials, request timeout and retry policy.
pub fn build_flow(config: &AppConfig) -> Result<OAuthFlow> {
    let oauth = config.oauth_config()?;
    let flow = OAuthFlow::with_timeout(oauth, config.timeout())?.with_retry(config.retry_policy());
    Ok(flow)
}

pub fn print_url(config: &AppConfig) -> Result<()> {
    let flow = build_flow(config)?;
    println!("{}", flow.authorization_url()?);
    Ok(())
}

pub async fn login(config: &AppConfig, timeout_secs: u64) -> Result<()> {
    let flow = build_flow(config)?;
    let url = flow.authorization_url()?;

    eprintln!("Opening browser for authentication...");
    if let Err(e) = open::that(&url) {
        warn!(error = %e, "could not open browser");
        eprintln!("Could not open browser. Please visit:\n{url}");
    }

    let port = config.callback_port();
    let path = config.callback_path();
    eprintln!("Waiting for callback on {} ...", config.client.redirect_uri);
    let params = CallbackServer::wait_for_callback(
        &config.server.bind,
        port,
        &path,
        Duration::from_secs(timeout_secs),
    )
    .await
    .with_context(|| format!("failed to receive callback on port {port}"))?;

    eprintln!("Exchanging code for tokens...");
    let tokens = flow.handle_callback(params).await?;
    print_tokens(&tokens)
}

pub async fn exchange(config: &AppConfig, code: String) -> Result<()> {
    let flow = build_flow(config)?;
    let tokens = flow.exchange_code(AuthorizationCode::new(code)?).await?;
    print_tokens(&tokens)
}

pub async fn refresh(config: &AppConfig, refresh_token: &str) -> Result<()> {
    let flow = build_flow(config)?;
    let tokens = flow.refresh_token(refresh_token).await?;
    if tokens.refresh_token.is_none() {
        eprintln!("Provider did not rotate the refresh token; keep using the current one.");
    }
    print_tokens(&tokens.retain_refresh_token(Some(refresh_token)))
}

fn print_tokens(tokens: &TokenResponse) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(tokens)?);
    Ok(())
}
