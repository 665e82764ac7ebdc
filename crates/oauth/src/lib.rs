//! OAuth 2.0 authorization-code flow client.
//!
//! Three independent operations over an immutable [`OAuthConfig`]:
//! [`build_auth_url`] for the login redirect, [`exchange_code`] on callback,
//! and [`refresh_token`] whenever the caller decides a token needs renewal.
//! Network access goes through the [`HttpTransport`] seam.

pub mod auth_url;
pub mod callback_server;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod refresh;
mod token;
pub mod transport;
pub mod types;

pub use {
    auth_url::build_auth_url,
    callback_server::CallbackServer,
    error::{OAuthError, TransportError},
    exchange::{exchange_code, handle_callback},
    flow::OAuthFlow,
    refresh::{basic_credential, refresh_token},
    transport::{
        DEFAULT_TIMEOUT, HttpResponse, HttpTransport, ReqwestTransport, RetryPolicy,
        RetryingTransport, TokenRequest,
    },
    types::{AuthorizationCode, CallbackParams, OAuthConfig, TokenResponse},
};
