//! TOML configuration with an environment overlay for billing and session secrets.
//!
//! Structural settings live in the file; secrets are normally supplied through
//! the environment and always win over file values:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `PADDLE_API_KEY` | `billing.api_key` |
//! | `PADDLE_PRICE_ID` | `billing.price_id` |
//! | `PADDLE_CLIENT_TOKEN` | `billing.client_token` |
//! | `NICHEFIRE_SESSION_SECRET` | `auth.session_secret` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::SortKey;

/// A required value that is absent from both the file and the environment.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    Missing(&'static str),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Directory served under `/static`, relative to the working directory.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub outliers_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub session_secret: Option<String>,
    #[serde(default = "default_sign_in_path")]
    pub sign_in_path: String,
    #[serde(default = "default_sign_up_path")]
    pub sign_up_path: String,
    /// Hosted sign-in page of the identity provider, linked from `/sign-in`.
    #[serde(default)]
    pub hosted_sign_in_url: Option<String>,
    /// Hosted sign-up page of the identity provider, linked from `/sign-up`.
    #[serde(default)]
    pub hosted_sign_up_url: Option<String>,
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_secret: None,
            sign_in_path: default_sign_in_path(),
            sign_up_path: default_sign_up_path(),
            hosted_sign_in_url: None,
            hosted_sign_up_url: None,
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_cookie_name() -> String {
    "__session".to_string()
}
fn default_sign_in_path() -> String {
    "/sign-in".to_string()
}
fn default_sign_up_path() -> String {
    "/sign-up".to_string()
}
fn default_session_ttl_secs() -> i64 {
    7 * 24 * 60 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct BillingConfig {
    #[serde(default = "default_billing_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub price_id: Option<String>,
    #[serde(default)]
    pub client_token: Option<String>,
    #[serde(default = "default_script_url")]
    pub script_url: String,
    /// `sandbox` or `production`; passed to the client script.
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            api_base: default_billing_api_base(),
            api_key: None,
            price_id: None,
            client_token: None,
            script_url: default_script_url(),
            environment: default_environment(),
        }
    }
}

fn default_billing_api_base() -> String {
    "https://sandbox-api.paddle.com".to_string()
}
fn default_script_url() -> String {
    "https://cdn.paddle.com/paddle/v2/paddle.js".to_string()
}
fn default_environment() -> String {
    "sandbox".to_string()
}

/// Borrowed view of the three billing values once all are known to be present.
#[derive(Debug, Clone, Copy)]
pub struct BillingCredentials<'a> {
    pub api_key: &'a str,
    pub price_id: &'a str,
    pub client_token: &'a str,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RoutesConfig {
    #[serde(default = "default_excluded_routes")]
    pub excluded: Vec<String>,
    #[serde(default = "default_public_routes")]
    pub public: Vec<String>,
    #[serde(default = "default_protected_routes")]
    pub protected: Vec<String>,
    /// What to do with a path that matches no rule: `allow` or `protect`.
    #[serde(default = "default_unclassified")]
    pub unclassified: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            excluded: default_excluded_routes(),
            public: default_public_routes(),
            protected: default_protected_routes(),
            unclassified: default_unclassified(),
        }
    }
}

fn default_excluded_routes() -> Vec<String> {
    vec![
        "/_next/*".to_string(),
        "/static/*".to_string(),
        "/*.{css,js,map,png,jpg,jpeg,gif,svg,ico,webp,woff,woff2,txt}".to_string(),
    ]
}
fn default_public_routes() -> Vec<String> {
    vec![
        "/".to_string(),
        "/sign-in*".to_string(),
        "/sign-up*".to_string(),
    ]
}
fn default_protected_routes() -> Vec<String> {
    vec!["/dashboard*".to_string(), "/subscribe*".to_string()]
}
fn default_unclassified() -> String {
    "allow".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_sort")]
    pub default_sort: SortKey,
    #[serde(default = "default_fallback_thumbnail")]
    pub fallback_thumbnail: String,
    #[serde(default = "default_video_url_base")]
    pub video_url_base: String,
    #[serde(default = "default_thumbnail_url_base")]
    pub thumbnail_url_base: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            default_sort: default_sort(),
            fallback_thumbnail: default_fallback_thumbnail(),
            video_url_base: default_video_url_base(),
            thumbnail_url_base: default_thumbnail_url_base(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    300
}
fn default_sort() -> SortKey {
    SortKey::ViralScore
}
fn default_fallback_thumbnail() -> String {
    "/static/fallback-thumbnail.jpg".to_string()
}
fn default_video_url_base() -> String {
    "https://www.youtube.com/shorts".to_string()
}
fn default_thumbnail_url_base() -> String {
    "https://i.ytimg.com/vi".to_string()
}

impl Config {
    /// Returns the billing API key, price id and client token, or names the
    /// first one that is missing.
    pub fn billing_credentials(&self) -> Result<BillingCredentials<'_>, ConfigError> {
        let api_key = non_empty(&self.billing.api_key).ok_or(ConfigError::Missing("PADDLE_API_KEY"))?;
        let price_id =
            non_empty(&self.billing.price_id).ok_or(ConfigError::Missing("PADDLE_PRICE_ID"))?;
        let client_token = non_empty(&self.billing.client_token)
            .ok_or(ConfigError::Missing("PADDLE_CLIENT_TOKEN"))?;
        Ok(BillingCredentials {
            api_key,
            price_id,
            client_token,
        })
    }

    pub fn session_secret(&self) -> Result<&str, ConfigError> {
        non_empty(&self.auth.session_secret).ok_or(ConfigError::Missing("NICHEFIRE_SESSION_SECRET"))
    }

    /// Everything `serve` needs before it binds a socket.
    pub fn validate_for_serve(&self) -> Result<()> {
        self.billing_credentials()?;
        self.session_secret()?;
        Ok(())
    }

    /// Applies environment overrides from the given lookup function.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("PADDLE_API_KEY") {
            self.billing.api_key = Some(v);
        }
        if let Some(v) = lookup("PADDLE_PRICE_ID") {
            self.billing.price_id = Some(v);
        }
        if let Some(v) = lookup("PADDLE_CLIENT_TOKEN") {
            self.billing.client_token = Some(v);
        }
        if let Some(v) = lookup("NICHEFIRE_SESSION_SECRET") {
            self.auth.session_secret = Some(v);
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let mut config = parse_config(&content)?;
    config.apply_env(|name| std::env::var(name).ok());
    Ok(config)
}

/// Parses and validates a configuration document without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    let url = &config.data.outliers_url;
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        anyhow::bail!("data.outliers_url must be an absolute http(s) URL, got '{}'", url);
    }

    if config.dashboard.debounce_ms > 5000 {
        anyhow::bail!("dashboard.debounce_ms must be <= 5000");
    }

    match config.routes.unclassified.as_str() {
        "allow" | "protect" => {}
        other => anyhow::bail!(
            "Unknown routes.unclassified policy: '{}'. Must be allow or protect.",
            other
        ),
    }

    if let Some(p) = config
        .routes
        .public
        .iter()
        .find(|p| config.routes.protected.contains(p))
    {
        anyhow::bail!("route pattern '{}' is listed as both public and protected", p);
    }

    if !config.auth.sign_in_path.starts_with('/') {
        anyhow::bail!("auth.sign_in_path must start with '/'");
    }

    Ok(config)
}
