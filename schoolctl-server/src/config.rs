//! Database configuration from the environment
//!
//! `DATABASE_URL` wins when set. Otherwise the URL is assembled from
//! `DB_HOST`, `DB_PORT`, `DB_USER`, `DB_PASSWORD` and `DB_NAME`.

use crate::db::DEFAULT_MAX_CONNECTIONS;

const DEFAULT_DB_HOST: &str = "localhost";
const DEFAULT_DB_PORT: u16 = 5432;

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("database not configured: set DATABASE_URL or DB_USER and DB_NAME")]
    MissingDatabase,

    #[error("invalid {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Connection settings for the Postgres pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Load from a key lookup, usually the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "DB_MAX_CONNECTIONS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        if let Some(url) = get("DATABASE_URL") {
            return Ok(Self {
                url,
                max_connections,
            });
        }

        let (Some(user), Some(name)) = (get("DB_USER"), get("DB_NAME")) else {
            return Err(ConfigError::MissingDatabase);
        };
        let host = get("DB_HOST").unwrap_or_else(|| DEFAULT_DB_HOST.to_string());
        let port = match get("DB_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                var: "DB_PORT",
                value: raw.clone(),
            })?,
            None => DEFAULT_DB_PORT,
        };

        let credentials = match get("DB_PASSWORD") {
            Some(password) => format!(
                "{}:{}",
                urlencoding::encode(&user),
                urlencoding::encode(&password)
            ),
            None => urlencoding::encode(&user).into_owned(),
        };

        Ok(Self {
            url: format!(
                "postgres://{}@{}:{}/{}",
                credentials,
                host,
                port,
                urlencoding::encode(&name)
            ),
            max_connections,
        })
    }

    /// URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let Some((userinfo, host)) = rest.rsplit_once('@') else {
            return self.url.clone();
        };
        match userinfo.split_once(':') {
            Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
            None => self.url.clone(),
        }
    }
}
