use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main configuration for the notegate service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    pub notes: NotesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

/// Authentication configuration.
///
/// `secret` is the process-wide MAC/signing secret. It must be
/// cryptographically random and at least 128 bits; rotating it invalidates
/// every outstanding pending token and session.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub secret: String,
    /// Issuer label shown in authenticator apps and in the otpauth URI.
    #[serde(default = "default_totp_issuer")]
    pub totp_issuer: String,
    /// Lifetime of the pending MFA token, in seconds.
    #[serde(default = "default_pending_token_ttl")]
    pub pending_token_ttl: u64,
    /// Access token lifetime, in seconds.
    #[serde(default = "default_access_token_ttl")]
    pub access_token_ttl: u64,
    /// Refresh token lifetime, in seconds.
    #[serde(default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotesConfig {
    /// Directory where note files are written.
    #[serde(default = "default_notes_dir")]
    pub dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            auth: AuthConfig::default(),
            notes: NotesConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            totp_issuer: default_totp_issuer(),
            pending_token_ttl: default_pending_token_ttl(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
        }
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            dir: default_notes_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_totp_issuer() -> String {
    "notegate".to_string()
}

fn default_pending_token_ttl() -> u64 {
    300
}

fn default_access_token_ttl() -> u64 {
    15 * 60
}

fn default_refresh_token_ttl() -> u64 {
    7 * 24 * 60 * 60
}

fn default_notes_dir() -> PathBuf {
    PathBuf::from("media/notes")
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

/// Builder for Config with environment variable support.
#[must_use = "builder does nothing until you call build()"]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.server.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.auth.secret = secret.into();
        self
    }

    pub fn with_totp_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.config.auth.totp_issuer = issuer.into();
        self
    }

    pub fn with_notes_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.notes.dir = dir.into();
        self
    }

    /// Populate the config from `NOTEGATE_*` environment variables.
    pub fn from_env(mut self) -> Self {
        if let Ok(host) = std::env::var("NOTEGATE_HOST") {
            self.config.server.host = host;
        }
        if let Ok(port) = std::env::var("NOTEGATE_PORT") {
            if let Ok(port) = port.parse() {
                self.config.server.port = port;
            }
        }
        if let Ok(level) = std::env::var("NOTEGATE_LOG_LEVEL") {
            self.config.logging.level = level;
        }
        if let Ok(json) = std::env::var("NOTEGATE_LOG_JSON") {
            self.config.logging.json = json.parse().unwrap_or(false);
        }
        if let Ok(secret) = std::env::var("NOTEGATE_SECRET_KEY") {
            self.config.auth.secret = secret;
        }
        if let Ok(issuer) = std::env::var("NOTEGATE_TOTP_ISSUER") {
            self.config.auth.totp_issuer = issuer;
        }
        if let Ok(dir) = std::env::var("NOTEGATE_NOTES_DIR") {
            self.config.notes.dir = PathBuf::from(dir);
        }
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
