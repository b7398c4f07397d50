//! Application configuration module
//!
//! Settings come from three layers, later layers winning:
//! built-in defaults, an optional `complaintdesk.toml` (plus `COMPLAINTDESK__*`
//! environment overrides), and the well-known variables such as `PORT` or
//! `DATABASE_URL`.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load environment variables: {0}")]
    EnvLoad(#[from] dotenvy::Error),

    #[error("Failed to read configuration sources: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_pool_size: usize,
    pub require_tls: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            database: "complaintdesk".to_string(),
            max_pool_size: 10,
            require_tls: false,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Token signing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_minutes: i64,
    pub refresh_token_days: i64,
}

/// Development-only secret, replaced by `JWT_SECRET` in any real deployment.
pub const DEV_JWT_SECRET: &str = "complaintdesk-dev-secret-change-in-production";

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
        }
    }
}

/// Uploaded files and profile pictures
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    /// Directory blobs are written under
    pub root: PathBuf,
    /// Public URL prefix blobs are served from
    pub url_prefix: String,
    /// Picture reference given to users that never uploaded one
    pub default_profile_picture: String,
    pub max_upload_bytes: usize,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("media"),
            url_prefix: "/media".to_string(),
            default_profile_picture: "/media/profile_pictures/default_pic.jpg".to_string(),
            max_upload_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Initial superuser created at startup when missing
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub admin_username: Option<String>,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Optional file/env layer read through the `config` crate. Every field is
/// optional so a partial file only overrides what it names.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    host: Option<Ipv4Addr>,
    port: Option<u16>,
    database_url: Option<String>,
    db_max_connections: Option<usize>,
    allowed_origins: Option<Vec<String>>,
    jwt_secret: Option<String>,
    media_root: Option<PathBuf>,
    media_url: Option<String>,
    default_profile_picture: Option<String>,
    max_upload_bytes: Option<usize>,
    admin_username: Option<String>,
    admin_email: Option<String>,
    admin_password: Option<String>,
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    /// None selects the in-memory store
    pub database: Option<DatabaseConfig>,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub bootstrap: BootstrapConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: None,
            cors: CorsConfig::default(),
            auth: AuthConfig::default(),
            media: MediaConfig::default(),
            bootstrap: BootstrapConfig {
                admin_username: None,
                admin_email: None,
                admin_password: None,
            },
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(format!("{} has an invalid value: {}", name, raw))),
        None => Ok(None),
    }
}

/// A missing `.env` is fine; a broken one is not
fn env_file_loaded(result: Result<(), dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Err(e) if !e.not_found() => Err(e.into()),
        _ => Ok(()),
    }
}

impl Settings {
    /// Load settings from the config file layer and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        env_file_loaded(dotenvy::dotenv().map(|_| ()))?;

        let file: FileSettings = config::Config::builder()
            .add_source(config::File::with_name("complaintdesk").required(false))
            .add_source(config::Environment::with_prefix("COMPLAINTDESK").separator("__"))
            .build()?
            .try_deserialize()?;

        let mut settings = Settings::default();

        settings.server.host = env_parsed("HOST")?
            .or(file.host)
            .unwrap_or(settings.server.host);
        settings.server.port = env_parsed("PORT")?
            .or(file.port)
            .unwrap_or(settings.server.port);

        if let Some(url) = env_var("DATABASE_URL").or(file.database_url) {
            let mut database = Self::parse_database_url(&url)?;
            if let Some(max) = env_parsed("DB_MAX_CONNECTIONS")?.or(file.db_max_connections) {
                database.max_pool_size = max;
            }
            settings.database = Some(database);
        }

        if let Some(origins) = env_var("ALLOWED_ORIGINS")
            .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
            .or(file.allowed_origins)
        {
            settings.cors.allowed_origins = origins;
        }

        if let Some(secret) = env_var("JWT_SECRET").or(file.jwt_secret) {
            settings.auth.jwt_secret = secret;
        }

        if let Some(root) = env_var("MEDIA_ROOT").map(PathBuf::from).or(file.media_root) {
            settings.media.root = root;
        }
        if let Some(prefix) = env_var("MEDIA_URL").or(file.media_url) {
            settings.media.url_prefix = prefix.trim_end_matches('/').to_string();
        }
        if let Some(picture) = env_var("DEFAULT_PROFILE_PICTURE").or(file.default_profile_picture) {
            settings.media.default_profile_picture = picture;
        }
        if let Some(max) = env_parsed("MAX_UPLOAD_BYTES")?.or(file.max_upload_bytes) {
            settings.media.max_upload_bytes = max;
        }

        settings.bootstrap = BootstrapConfig {
            admin_username: env_var("ADMIN_USERNAME").or(file.admin_username),
            admin_email: env_var("ADMIN_EMAIL").or(file.admin_email),
            admin_password: env_var("ADMIN_PASSWORD").or(file.admin_password),
        };

        Ok(settings)
    }

    /// Parse a DATABASE_URL connection string (postgresql://...)
    fn parse_database_url(url: &str) -> Result<DatabaseConfig, ConfigError> {
        let parsed = url::Url::parse(url).map_err(|_| {
            ConfigError::InvalidValue(
                "Invalid DATABASE_URL format (expected postgresql://...)".to_string(),
            )
        })?;

        if !matches!(parsed.scheme(), "postgres" | "postgresql") {
            return Err(ConfigError::InvalidValue(format!(
                "Unsupported DATABASE_URL scheme: {}",
                parsed.scheme()
            )));
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ConfigError::InvalidValue("Missing host in DATABASE_URL".to_string()))?
            .to_string();

        let database = parsed.path().trim_start_matches('/').to_string();
        if database.is_empty() {
            return Err(ConfigError::InvalidValue(
                "Missing database name in DATABASE_URL".to_string(),
            ));
        }

        let require_tls = parsed
            .query_pairs()
            .any(|(k, v)| k == "sslmode" && v == "require");

        Ok(DatabaseConfig {
            port: parsed.port().unwrap_or(5432),
            user: parsed.username().to_string(),
            password: parsed.password().map(|p| p.to_string()).unwrap_or_default(),
            require_tls,
            host,
            database,
            ..DatabaseConfig::default()
        })
    }
}
