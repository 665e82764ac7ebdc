use crate::{
    error::{OAuthError, Result},
    types::OAuthConfig,
};

/// Build the provider login URL the user is redirected to.
///
/// Pure string construction; fails only when `config` is incomplete.
pub fn build_auth_url(config: &OAuthConfig) -> Result<String> {
    config.validate()?;

    let mut url = url::Url::parse(&config.auth_url())
        .map_err(|e| OAuthError::Configuration(format!("invalid authorization endpoint: {e}")))?;

    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", "code")
        .append_pair("redirect_uri", &config.redirect_uri)
        .append_pair("scope", &config.scopes.join(" "));

    Ok(url.into())
}
