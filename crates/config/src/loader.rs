use std::path::{Path, PathBuf};

use {
    anyhow::{Context, Result},
    secrecy::SecretString,
    tracing::{debug, info},
};

use crate::schema::AppConfig;

pub const ENV_CLIENT_ID: &str = "AUTHCODE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AUTHCODE_CLIENT_SECRET";
pub const ENV_REDIRECT_URI: &str = "AUTHCODE_REDIRECT_URI";
pub const ENV_SCOPES: &str = "AUTHCODE_SCOPES";
pub const ENV_BASE_URL: &str = "AUTHCODE_BASE_URL";

/// `<platform config dir>/authcode/config.toml`, if a home directory is known.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "authcode")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Parse a config file without applying environment overrides.
pub fn load_from_path(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = parse_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))?;
    debug!(path = %path.display(), "loaded config file");
    Ok(cfg)
}

pub fn parse_toml(raw: &str) -> Result<AppConfig> {
    Ok(toml::from_str(raw)?)
}

/// Load the effective configuration.
///
/// An explicit `path` must exist. Without one, the default location is used
/// when present and built-in defaults otherwise. Environment overrides are
/// applied last in both cases.
pub fn discover_and_load(path: Option<&Path>) -> Result<AppConfig> {
    let mut cfg = match path {
        Some(path) => load_from_path(path)?,
        None => match default_config_path().filter(|p| p.is_file()) {
            Some(default) => load_from_path(&default)?,
            None => {
                info!("no config file found, using defaults and environment");
                AppConfig::default()
            },
        },
    };
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok());
    Ok(cfg)
}

/// Overlay `AUTHCODE_*` values obtained through `lookup` onto `cfg`.
///
/// Empty values are ignored so an unset-but-exported variable does not wipe
/// a file value.
pub fn apply_env_overrides(cfg: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get(ENV_CLIENT_ID) {
        debug!(key = ENV_CLIENT_ID, "override from environment");
        cfg.client.client_id = Some(v);
    }
    if let Some(v) = get(ENV_CLIENT_SECRET) {
        debug!(key = ENV_CLIENT_SECRET, "override from environment");
        cfg.client.client_secret = Some(SecretString::new(v));
    }
    if let Some(v) = get(ENV_REDIRECT_URI) {
        debug!(key = ENV_REDIRECT_URI, "override from environment");
        cfg.client.redirect_uri = v;
    }
    if let Some(v) = get(ENV_SCOPES) {
        debug!(key = ENV_SCOPES, "override from environment");
        cfg.client.scopes = v
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(v) = get(ENV_BASE_URL) {
        debug!(key = ENV_BASE_URL, "override from environment");
        cfg.provider.base_url = v;
    }
}
