use std::sync::Arc;

use {
    anyhow::Context,
    authcode_config::AppConfig,
    authcode_oauth::{CallbackParams, OAuthError, OAuthFlow},
    axum::{
        Json, Router,
        extract::{Query, State},
        http::StatusCode,
        response::{IntoResponse, Redirect, Response},
        routing::get,
    },
    tokio::net::TcpListener,
    tracing::{info, warn},
};

use crate::auth_commands::build_flow;

pub async fn start_server(config: &AppConfig, bind: &str, port: u16) -> anyhow::Result<()> {
    let flow = Arc::new(build_flow(config)?);
    let callback_path = config.callback_path();
    if callback_path == "/" {
        anyhow::bail!(
            "redirect_uri must use a path other than / to be served alongside the login redirect"
        );
    }
    let app = router(flow, &callback_path);

    let listener = TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(addr = %listener.local_addr()?, "serving authorization flow");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// `GET /` redirects to the provider login page, `GET <callback_path>` finishes the flow.
pub fn router(flow: Arc<OAuthFlow>, callback_path: &str) -> Router {
    Router::new()
        .route("/", get(index))
        .route(callback_path, get(callback))
        .with_state(flow)
}

async fn index(State(flow): State<Arc<OAuthFlow>>) -> Response {
    match flow.authorization_url() {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(e) => error_response(&e),
    }
}

async fn callback(
    State(flow): State<Arc<OAuthFlow>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    match flow.handle_callback(params).await {
        Ok(tokens) => {
            info!(expires_in = tokens.expires_in, "authorization completed");
            Json(tokens).into_response()
        },
        Err(e) => {
            warn!(error = %e, "authorization failed");
            error_response(&e)
        },
    }
}

fn status_for(err: &OAuthError) -> StatusCode {
    match err {
        OAuthError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        OAuthError::AuthorizationDenied { .. } => StatusCode::FORBIDDEN,
        OAuthError::Exchange { .. } | OAuthError::Protocol(_) => StatusCode::BAD_GATEWAY,
        OAuthError::Transport(_) => StatusCode::GATEWAY_TIMEOUT,
    }
}

fn error_response(err: &OAuthError) -> Response {
    let body = match err {
        OAuthError::Configuration(msg) => serde_json::json!({
            "error": "configuration",
            "message": msg,
        }),
        OAuthError::AuthorizationDenied {
            reason,
            description,
        } => serde_json::json!({
            "error": "authorization_denied",
            "reason": reason,
            "description": description,
        }),
        OAuthError::Exchange { status_code, body } => serde_json::json!({
            "error": "exchange_failed",
            "status_code": status_code,
            "body": body,
        }),
        OAuthError::Transport(e) => serde_json::json!({
            "error": "transport",
            "message": e.message,
            "timed_out": e.timed_out,
        }),
        OAuthError::Protocol(msg) => serde_json::json!({
            "error": "protocol",
            "message": msg,
        }),
    };
    (status_for(err), Json(body)).into_response()
}
