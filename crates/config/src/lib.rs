//! Configuration for the authcode client.
//!
//! Values come from a TOML file, then `AUTHCODE_*` environment variables
//! override individual keys. Client credentials have no defaults.

pub mod loader;
pub mod schema;

pub use {
    loader::{default_config_path, discover_and_load, load_from_path},
    schema::{AppConfig, ClientConfig, HttpConfig, ProviderConfig, ServerConfig},
};
