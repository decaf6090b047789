use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context};
use once_cell::sync::OnceCell;

use crate::utils::env_bool;

static DEBUG: OnceCell<bool> = OnceCell::new();

pub fn debug() -> bool {
    *DEBUG.get_or_init(|| env::var("DEBUG").map(env_bool).unwrap_or(false))
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String, anyhow::Error> {
    var(key).ok_or_else(|| anyhow!("The environment variable {} is not set", key))
}

fn parsed<T>(key: &str, default: T) -> Result<T, anyhow::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("The environment variable {} is malformed", key)),
        None => Ok(default),
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub postgres: tokio_postgres::Config,
    pub pool_size: usize,
    pub pool_max: usize,
}

impl DatabaseConfig {
    /// `DATABASE_URL` wins; otherwise the connection is assembled from `DB_HOST`,
    /// `DB_NAME`, `DB_USER` and `DB_PASSWORD`.
    pub fn from_env() -> Result<DatabaseConfig, anyhow::Error> {
        let postgres = if let Some(url) = var("DATABASE_URL") {
            url.parse().context("DATABASE_URL is not a valid connection string")?
        } else {
            let mut config = tokio_postgres::Config::new();
            config
                .host(&required("DB_HOST")?)
                .port(parsed("DB_PORT", 5432)?)
                .dbname(&required("DB_NAME")?)
                .user(&required("DB_USER")?);
            if let Some(password) = var("DB_PASSWORD") {
                config.password(password);
            }
            config
        };
        Ok(DatabaseConfig {
            postgres,
            pool_size: parsed("DB_POOL_SIZE", 8)?,
            pool_max: parsed("DB_POOL_MAX", 32)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
    pub session_token: Option<String>,
    /// Custom endpoint (e.g. MinIO); switches to path-style addressing.
    pub endpoint: Option<String>,
    pub presign_ttl: u64,
}

impl StorageConfig {
    pub fn from_env() -> Result<StorageConfig, anyhow::Error> {
        Ok(StorageConfig {
            bucket: required("S3_BUCKET")?,
            region: required("S3_REGION")?,
            access_key: required("AWS_ACCESS_KEY_ID")?,
            secret_key: required("AWS_SECRET_ACCESS_KEY")?,
            session_token: var("AWS_SESSION_TOKEN"),
            endpoint: var("S3_ENDPOINT"),
            presign_ttl: parsed("PRESIGN_TTL", 3600)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

impl GeocoderConfig {
    pub fn from_env() -> Result<GeocoderConfig, anyhow::Error> {
        Ok(GeocoderConfig {
            url: var("GEOCODER_URL").unwrap_or_else(|| "https://nominatim.openstreetmap.org/search".to_string()),
            user_agent: var("GEOCODER_USER_AGENT").unwrap_or_else(|| "FindMyCrowd/1.0".to_string()),
            timeout: Duration::from_secs(parsed("HTTP_TIMEOUT_SECS", 10)?),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: std::net::IpAddr,
    pub port: u16,
    pub log_file: Option<String>,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub geocoder: GeocoderConfig,
}

impl Config {
    pub fn from_env() -> Result<Config, anyhow::Error> {
        Ok(Config {
            host: parsed("HOST", std::net::IpAddr::from([127, 0, 0, 1]))?,
            port: parsed("PORT", 5000)?,
            log_file: var("LOG_FILE"),
            database: DatabaseConfig::from_env()?,
            storage: StorageConfig::from_env()?,
            geocoder: GeocoderConfig::from_env()?,
        })
    }
}
