//! Configuration module
//!
//! All settings come from the environment (optionally seeded from a `.env`
//! file). Every value except the secrets has a default so a local
//! deployment only needs `DATABASE_URL`, `JWT_SECRET` and `SCHEDULER_SECRET`.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const HTTP_TIMEOUT_SECS: u64 = 300;
const CONTAINER_POLL_MAX_ATTEMPTS: u32 = 60;
const CONTAINER_POLL_INTERVAL_MS: u64 = 5_000;
const FIRST_COMMENT_DELAY_SECS: u64 = 10;
const FIRST_COMMENT_MAX_ATTEMPTS: u32 = 3;
const FIRST_COMMENT_BACKOFF_MS: u64 = 2_000;
const WEBHOOK_TIMEOUT_SECS: u64 = 30;
const WEBHOOK_MAX_CONCURRENT: usize = 10;

/// Server, database and auth settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    pub database_url: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    /// HS256 secret for human session tokens
    pub jwt_secret: String,
    /// Shared secret presented by the external scheduler
    pub scheduler_secret: String,
}

/// Publish pipeline tuning
#[derive(Clone, Debug)]
pub struct PublishConfig {
    /// Prefix for storage-relative media URLs (e.g. "https://app.example.com")
    pub public_media_base_url: Option<String>,
    /// URL prefix of the media proxy whose `url` query parameter holds the real location
    pub media_proxy_prefix: Option<String>,
    /// Directory for disk-buffered uploads
    pub upload_temp_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub container_poll_max_attempts: u32,
    pub container_poll_interval_ms: u64,
    pub first_comment_delay_secs: u64,
    pub first_comment_max_attempts: u32,
    pub first_comment_backoff_ms: u64,
    /// Run side effects on a background task instead of inside the request
    pub defer_side_effects: bool,
    pub webhook_timeout_secs: u64,
    pub webhook_max_concurrent: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            public_media_base_url: None,
            media_proxy_prefix: None,
            upload_temp_dir: env::temp_dir(),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            container_poll_max_attempts: CONTAINER_POLL_MAX_ATTEMPTS,
            container_poll_interval_ms: CONTAINER_POLL_INTERVAL_MS,
            first_comment_delay_secs: FIRST_COMMENT_DELAY_SECS,
            first_comment_max_attempts: FIRST_COMMENT_MAX_ATTEMPTS,
            first_comment_backoff_ms: FIRST_COMMENT_BACKOFF_MS,
            defer_side_effects: true,
            webhook_timeout_secs: WEBHOOK_TIMEOUT_SECS,
            webhook_max_concurrent: WEBHOOK_MAX_CONCURRENT,
        }
    }
}

/// OAuth client credentials used to refresh expiring bearer tokens
#[derive(Clone, Debug, Default)]
pub struct OAuthClientConfig {
    pub google_client_id: Option<String>,
    pub google_client_secret: Option<String>,
    pub google_token_url: String,
    pub tiktok_client_key: Option<String>,
    pub tiktok_client_secret: Option<String>,
    pub tiktok_token_url: String,
}

/// Base URLs of the external networks (overridable for sandboxes and tests)
#[derive(Clone, Debug)]
pub struct PlatformEndpoints {
    pub graph_api_base: String,
    pub youtube_api_base: String,
    pub youtube_upload_base: String,
    pub tiktok_api_base: String,
    pub x_api_base: String,
    pub x_upload_base: String,
    pub bluesky_pds_base: String,
}

impl Default for PlatformEndpoints {
    fn default() -> Self {
        Self {
            graph_api_base: "https://graph.facebook.com/v21.0".to_string(),
            youtube_api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            youtube_upload_base: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            tiktok_api_base: "https://open.tiktokapis.com".to_string(),
            x_api_base: "https://api.twitter.com".to_string(),
            x_upload_base: "https://upload.twitter.com".to_string(),
            bluesky_pds_base: "https://bsky.social".to_string(),
        }
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub publish: PublishConfig,
    pub oauth: OAuthClientConfig,
    pub endpoints: PlatformEndpoints,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let cors_origins = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let scheduler_secret = env::var("SCHEDULER_SECRET")
            .map_err(|_| anyhow::anyhow!("SCHEDULER_SECRET must be set"))?;

        let base = BaseConfig {
            server_port: env_or("SERVER_PORT", SERVER_PORT),
            environment,
            cors_origins,
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: env_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret,
            scheduler_secret,
        };

        let publish = PublishConfig {
            public_media_base_url: env_opt("PUBLIC_MEDIA_BASE_URL"),
            media_proxy_prefix: env_opt("MEDIA_PROXY_PREFIX"),
            upload_temp_dir: env_opt("UPLOAD_TEMP_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS),
            container_poll_max_attempts: env_or(
                "CONTAINER_POLL_MAX_ATTEMPTS",
                CONTAINER_POLL_MAX_ATTEMPTS,
            ),
            container_poll_interval_ms: env_or(
                "CONTAINER_POLL_INTERVAL_MS",
                CONTAINER_POLL_INTERVAL_MS,
            ),
            first_comment_delay_secs: env_or("FIRST_COMMENT_DELAY_SECS", FIRST_COMMENT_DELAY_SECS),
            first_comment_max_attempts: env_or(
                "FIRST_COMMENT_MAX_ATTEMPTS",
                FIRST_COMMENT_MAX_ATTEMPTS,
            ),
            first_comment_backoff_ms: env_or("FIRST_COMMENT_BACKOFF_MS", FIRST_COMMENT_BACKOFF_MS),
            defer_side_effects: env_or("DEFER_SIDE_EFFECTS", true),
            webhook_timeout_secs: env_or("WEBHOOK_TIMEOUT_SECS", WEBHOOK_TIMEOUT_SECS),
            webhook_max_concurrent: env_or("WEBHOOK_MAX_CONCURRENT", WEBHOOK_MAX_CONCURRENT),
        };

        let oauth = OAuthClientConfig {
            google_client_id: env_opt("GOOGLE_CLIENT_ID"),
            google_client_secret: env_opt("GOOGLE_CLIENT_SECRET"),
            google_token_url: env_opt("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|| "https://oauth2.googleapis.com/token".to_string()),
            tiktok_client_key: env_opt("TIKTOK_CLIENT_KEY"),
            tiktok_client_secret: env_opt("TIKTOK_CLIENT_SECRET"),
            tiktok_token_url: env_opt("TIKTOK_TOKEN_URL")
                .unwrap_or_else(|| "https://open.tiktokapis.com/v2/oauth/token/".to_string()),
        };

        let defaults = PlatformEndpoints::default();
        let endpoints = PlatformEndpoints {
            graph_api_base: env_opt("GRAPH_API_BASE").unwrap_or(defaults.graph_api_base),
            youtube_api_base: env_opt("YOUTUBE_API_BASE").unwrap_or(defaults.youtube_api_base),
            youtube_upload_base: env_opt("YOUTUBE_UPLOAD_BASE")
                .unwrap_or(defaults.youtube_upload_base),
            tiktok_api_base: env_opt("TIKTOK_API_BASE").unwrap_or(defaults.tiktok_api_base),
            x_api_base: env_opt("X_API_BASE").unwrap_or(defaults.x_api_base),
            x_upload_base: env_opt("X_UPLOAD_BASE").unwrap_or(defaults.x_upload_base),
            bluesky_pds_base: env_opt("BLUESKY_PDS_BASE").unwrap_or(defaults.bluesky_pds_base),
        };

        let config = Config {
            base,
            publish,
            oauth,
            endpoints,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if self.base.scheduler_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "SCHEDULER_SECRET must be at least 32 characters long"
            ));
        }

        if !self.base.database_url.starts_with("postgres://")
            && !self.base.database_url.starts_with("postgresql://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.is_production() && self.base.cors_origins.iter().any(|o| o == "*") {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        if self.publish.container_poll_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "CONTAINER_POLL_MAX_ATTEMPTS must be greater than zero"
            ));
        }

        if self.publish.first_comment_max_attempts == 0 {
            return Err(anyhow::anyhow!(
                "FIRST_COMMENT_MAX_ATTEMPTS must be greater than zero"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            base: BaseConfig {
                server_port: SERVER_PORT,
                environment: "development".to_string(),
                cors_origins: vec!["*".to_string()],
                database_url: "postgresql://localhost/crosspost".to_string(),
                db_max_connections: MAX_CONNECTIONS,
                db_timeout_seconds: CONNECTION_TIMEOUT_SECS,
                jwt_secret: "a".repeat(32),
                scheduler_secret: "b".repeat(32),
            },
            publish: PublishConfig::default(),
            oauth: OAuthClientConfig::default(),
            endpoints: PlatformEndpoints::default(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_secrets_rejected() {
        let mut config = valid_config();
        config.base.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());

        let mut config = valid_config();
        config.base.scheduler_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_database_url_must_be_postgres() {
        let mut config = valid_config();
        config.base.database_url = "mysql://localhost/crosspost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let mut config = valid_config();
        config.base.environment = "production".to_string();
        assert!(config.is_production());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_publish_defaults() {
        let publish = PublishConfig::default();
        assert_eq!(publish.first_comment_max_attempts, 3);
        assert_eq!(publish.container_poll_max_attempts, 60);
        assert!(publish.defer_side_effects);
    }
}
