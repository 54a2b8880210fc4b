//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The iRacing password is loaded from the IRACING_PASSWORD env var or
//! password_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub iracing: IracingConfig,
    /// Present only in browser-login deployments
    #[serde(default)]
    pub oauth: Option<OAuthConfig>,
    #[serde(default)]
    pub reauth: ReauthConfig,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Origin allowed by CORS; the frontend this relay serves
    #[serde(default = "default_frontend_origin")]
    pub frontend_origin: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Upstream members-API settings
#[derive(Debug, Deserialize)]
pub struct IracingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Path to a file containing the password (alternative to IRACING_PASSWORD)
    #[serde(default)]
    pub password_file: Option<PathBuf>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// OAuth PKCE settings; client_id and redirect_uri have no sane defaults
#[derive(Debug, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_profile_url")]
    pub profile_url: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

/// Re-authentication gate tuning
#[derive(Debug, Deserialize)]
pub struct ReauthConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3001))
}

fn default_frontend_origin() -> String {
    "https://www.speedtrapbets.com".to_string()
}

fn default_max_connections() -> usize {
    1024
}

fn default_base_url() -> String {
    iracing_auth::MEMBERS_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_authorize_url() -> String {
    iracing_auth::AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_url() -> String {
    iracing_auth::TOKEN_ENDPOINT.to_string()
}

fn default_profile_url() -> String {
    iracing_auth::PROFILE_ENDPOINT.to_string()
}

fn default_scope() -> String {
    iracing_auth::SCOPES.to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_cooldown_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            frontend_origin: default_frontend_origin(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for IracingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            email: None,
            password: None,
            password_file: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for ReauthConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Credential resolution order:
    /// 1. IRACING_EMAIL / IRACING_PASSWORD env vars
    /// 2. email from config / password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(email) = std::env::var("IRACING_EMAIL") {
            if !email.is_empty() {
                config.iracing.email = Some(email);
            }
        }

        // Resolve password: env var takes precedence over file
        if let Ok(password) = std::env::var("IRACING_PASSWORD") {
            if !password.is_empty() {
                config.iracing.password = Some(Secret::new(password));
            }
        }
        if config.iracing.password.is_none() {
            if let Some(ref password_file) = config.iracing.password_file {
                let password = std::fs::read_to_string(password_file).map_err(|e| {
                    common::Error::Config(format!(
                        "failed to read password_file {}: {e}",
                        password_file.display()
                    ))
                })?;
                let password = password.trim().to_owned();
                if !password.is_empty() {
                    config.iracing.password = Some(Secret::new(password));
                }
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        require_http_url("base_url", &self.iracing.base_url)?;
        require_http_url("frontend_origin", &self.server.frontend_origin)?;
        if let Some(ref oauth) = self.oauth {
            require_http_url("oauth.authorize_url", &oauth.authorize_url)?;
            require_http_url("oauth.token_url", &oauth.token_url)?;
            require_http_url("oauth.profile_url", &oauth.profile_url)?;
        }

        if self.iracing.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.reauth.max_attempts == 0 {
            return Err(common::Error::Config(
                "max_attempts must be greater than 0".into(),
            ));
        }

        // Both halves or neither: a lone email can never log in
        if self.iracing.email.is_some() != self.iracing.password.is_some() {
            return Err(common::Error::Config(
                "email and password must be configured together".into(),
            ));
        }

        if self.iracing.email.is_none() && self.oauth.is_none() {
            return Err(common::Error::Config(
                "no login mode configured: set iRacing credentials or an [oauth] section".into(),
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("iracing-member-relay.toml")
    }
}

fn require_http_url(name: &str, url: &str) -> common::Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(common::Error::Config(format!(
            "{name} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}
