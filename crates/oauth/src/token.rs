use tracing::{debug, warn};

use crate::{
    error::{OAuthError, Result},
    transport::{HttpTransport, TokenRequest},
    types::TokenResponse,
};

/// Send a token request and classify the outcome.
///
/// 200 with a parseable body is a token set, 200 with anything else is a
/// protocol error, every other status is an exchange error carrying the raw body.
pub(crate) async fn request_token<T: HttpTransport + ?Sized>(
    transport: &T,
    request: TokenRequest,
) -> Result<TokenResponse> {
    let grant_type = request.grant_type().to_string();
    let url = request.url.clone();
    debug!(%url, %grant_type, "requesting token");

    let resp = transport.send(request).await.map_err(|e| {
        warn!(%url, %grant_type, error = %e, "token endpoint unreachable");
        OAuthError::Transport(e)
    })?;

    if resp.status != 200 {
        warn!(%url, %grant_type, status = resp.status, "token endpoint rejected request");
        return Err(OAuthError::Exchange {
            status_code: resp.status,
            body: resp.body,
        });
    }

    let tokens: TokenResponse = serde_json::from_str(&resp.body).map_err(|e| {
        OAuthError::Protocol(format!("token endpoint returned an unreadable body: {e}"))
    })?;

    debug!(
        %grant_type,
        token_type = %tokens.token_type,
        expires_in = tokens.expires_in,
        has_refresh_token = tokens.refresh_token.is_some(),
        "token issued"
    );
    Ok(tokens)
}
