use std::{io, time::Duration};

use {
    axum::{Router, extract::Query, response::Html, routing::get},
    tokio::{
        net::TcpListener,
        sync::{mpsc, oneshot},
    },
    tracing::{debug, info},
};

use crate::types::CallbackParams;

const DONE_PAGE: &str = "<!doctype html><html><body>\
<h1>Authorization received</h1>\
<p>You can close this window and return to the terminal.</p>\
</body></html>";

/// One-shot local HTTP server that captures the provider's redirect.
pub struct CallbackServer;

impl CallbackServer {
    /// Bind `bind:port`, wait for the first request to `path` and return its
    /// query parameters. Gives up with `TimedOut` after `timeout`.
    pub async fn wait_for_callback(
        bind: &str,
        port: u16,
        path: &str,
        timeout: Duration,
    ) -> io::Result<CallbackParams> {
        let listener = TcpListener::bind((bind, port)).await?;
        Self::serve_once(listener, path, timeout).await
    }

    /// Same as [`CallbackServer::wait_for_callback`] on an already bound listener.
    pub async fn serve_once(
        listener: TcpListener,
        path: &str,
        timeout: Duration,
    ) -> io::Result<CallbackParams> {
        if !path.starts_with('/') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("callback path '{path}' must start with '/'"),
            ));
        }
        let addr = listener.local_addr()?;
        let (tx, mut rx) = mpsc::channel::<CallbackParams>(1);

        let app = Router::new().route(
            path,
            get(move |Query(params): Query<CallbackParams>| {
                let tx = tx.clone();
                async move {
                    // Only the first callback matters; later ones find the channel full.
                    let _ = tx.try_send(params);
                    Html(DONE_PAGE)
                }
            }),
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!(%addr, path, "waiting for OAuth callback");

        let received = tokio::time::timeout(timeout, rx.recv()).await;

        let _ = shutdown_tx.send(());
        if tokio::time::timeout(Duration::from_secs(2), server).await.is_err() {
            debug!(%addr, "callback server did not drain in time");
        }

        match received {
            Ok(Some(params)) => {
                debug!(
                    has_code = params.code.is_some(),
                    error = params.error.as_deref().unwrap_or(""),
                    "callback received"
                );
                Ok(params)
            },
            Ok(None) => Err(io::Error::other("callback server stopped unexpectedly")),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no callback received on {addr}{path} within {timeout:?}"),
            )),
        }
    }
}
