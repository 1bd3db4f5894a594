use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo, RedisConnectionInfo};
use sendhooks_events::IngestionConfig;

/// Configuration error raised while loading settings from the environment.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value:?}")]
    Invalid { var: &'static str, value: String },
}

// ---------------------------------------------------------------------------
// Pieces
// ---------------------------------------------------------------------------

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for the ingestion task (default: `30`).
    pub shutdown_timeout_secs: u64,
}

/// Where the stream backend lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    /// Full URL; when set, the other fields are ignored.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
}

impl RedisSettings {
    /// Connection parameters for the client. The password is passed as a
    /// field, never spliced into a URL.
    pub fn connection_info(&self) -> Result<ConnectionInfo, ConfigError> {
        if let Some(url) = &self.url {
            return url
                .as_str()
                .into_connection_info()
                .map_err(|_| ConfigError::Invalid {
                    var: "REDIS_URL",
                    value: "<redacted>".into(),
                });
        }
        Ok(ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        })
    }

    /// Host and port for log lines; never includes the password.
    pub fn display_target(&self) -> String {
        match &self.url {
            Some(_) => "REDIS_URL".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Log output format selected by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database_url: String,
    pub redis: RedisSettings,
    pub ingestion: IngestionConfig,
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `DATABASE_URL`             | required                |
    /// | `REDIS_URL`                | unset                   |
    /// | `REDIS_HOST`               | `127.0.0.1`             |
    /// | `REDIS_PORT`               | `6379`                  |
    /// | `REDIS_PASSWORD`           | unset                   |
    /// | `REDIS_DB`                 | `0`                     |
    /// | `STREAM_KEY`               | `hookStream`            |
    /// | `STREAM_GROUP`             | `sendhooks-group`       |
    /// | `STREAM_CONSUMER`          | `hooks-consumer`        |
    /// | `STREAM_BLOCK_MS`          | `1000`                  |
    /// | `STREAM_BATCH_SIZE`        | `16`                    |
    /// | `STREAM_ERROR_BACKOFF_MS`  | `500`                   |
    /// | `STREAM_RETRY_INTERVAL_MS` | `5000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `30`                    |
    /// | `LOG_FORMAT`               | `text`                  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup` instead of the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let cors_origins: Vec<String> = env
            .string("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if let Some(bad) = cors_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                value: bad.clone(),
            });
        }

        let server = ServerConfig {
            host: env.string("HOST", "0.0.0.0"),
            port: env.parse("PORT", 3000)?,
            cors_origins,
            request_timeout_secs: env.parse("REQUEST_TIMEOUT_SECS", 30)?,
            shutdown_timeout_secs: env.parse("SHUTDOWN_TIMEOUT_SECS", 30)?,
        };

        let database_url = env
            .optional("DATABASE_URL")
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let redis = RedisSettings {
            url: env.optional("REDIS_URL"),
            host: env.string("REDIS_HOST", "127.0.0.1"),
            port: env.parse("REDIS_PORT", 6379)?,
            password: env.optional("REDIS_PASSWORD"),
            db: env.parse("REDIS_DB", 0)?,
        };
        redis.connection_info()?;

        let batch_size: usize = env.parse("STREAM_BATCH_SIZE", 16)?;
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                var: "STREAM_BATCH_SIZE",
                value: "0".into(),
            });
        }

        let mut ingestion = IngestionConfig::new(
            env.string("STREAM_KEY", "hookStream"),
            env.string("STREAM_GROUP", "sendhooks-group"),
        );
        ingestion.consumer = env.string("STREAM_CONSUMER", &ingestion.consumer);
        ingestion.block = Duration::from_millis(env.parse("STREAM_BLOCK_MS", 1000)?);
        ingestion.batch_size = batch_size;
        ingestion.error_backoff = Duration::from_millis(env.parse("STREAM_ERROR_BACKOFF_MS", 500)?);
        ingestion.pending_retry_interval =
            Duration::from_millis(env.parse("STREAM_RETRY_INTERVAL_MS", 5000)?);

        let log_format = match env.optional("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(value) => value.parse().map_err(|()| ConfigError::Invalid {
                var: "LOG_FORMAT",
                value,
            })?,
        };

        Ok(Self {
            server,
            database_url,
            redis,
            ingestion,
            log_format,
        })
    }
}

/// Variable lookup with typed defaults. Empty values count as unset.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn optional(&self, var: &str) -> Option<String> {
        (self.0)(var).filter(|v| !v.trim().is_empty())
    }

    fn string(&self, var: &str, default: &str) -> String {
        self.optional(var).unwrap_or_else(|| default.to_string())
    }

    fn parse<T: FromStr>(&self, var: &'static str, default: T) -> Result<T, ConfigError> {
        match self.optional(var) {
            None => Ok(default),
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { var, value }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| vars.get(var).cloned())
    }

    const DB: (&str, &str) = ("DATABASE_URL", "postgres://localhost/sendhooks");

    #[test]
    fn defaults() {
        let config = load(&[DB]).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.cors_origins, ["http://localhost:5173"]);
        assert_eq!(config.ingestion.stream, "hookStream");
        assert_eq!(config.ingestion.group, "sendhooks-group");
        assert_eq!(config.ingestion.consumer, "hooks-consumer");
        assert_eq!(config.ingestion.block, Duration::from_millis(1000));
        assert_eq!(config.log_format, LogFormat::Text);
        let info = config.redis.connection_info().unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("127.0.0.1".into(), 6379));
        assert_eq!(info.redis.db, 0);
        assert_eq!(info.redis.password, None);
    }

    #[test]
    fn database_url_is_required() {
        assert_matches!(load(&[]), Err(ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn invalid_port_names_the_variable() {
        let err = load(&[DB, ("PORT", "eighty")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "PORT",
                value: "eighty".into()
            }
        );
    }

    #[test]
    fn stream_settings_are_overridable() {
        let config = load(&[
            DB,
            ("STREAM_KEY", "otherStream"),
            ("STREAM_GROUP", "g"),
            ("STREAM_CONSUMER", "c1"),
            ("STREAM_BLOCK_MS", "250"),
            ("STREAM_BATCH_SIZE", "4"),
            ("STREAM_RETRY_INTERVAL_MS", "0"),
        ])
        .unwrap();

        assert_eq!(config.ingestion.stream, "otherStream");
        assert_eq!(config.ingestion.group, "g");
        assert_eq!(config.ingestion.consumer, "c1");
        assert_eq!(config.ingestion.block, Duration::from_millis(250));
        assert_eq!(config.ingestion.batch_size, 4);
        assert!(config.ingestion.pending_retry_interval.is_zero());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        assert_matches!(
            load(&[DB, ("STREAM_BATCH_SIZE", "0")]),
            Err(ConfigError::Invalid { var: "STREAM_BATCH_SIZE", .. })
        );
    }

    #[test]
    fn redis_url_wins_over_host_and_port() {
        let config = load(&[
            DB,
            ("REDIS_URL", "redis://cache:6380/2"),
            ("REDIS_HOST", "ignored"),
        ])
        .unwrap();
        let info = config.redis.connection_info().unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("cache".into(), 6380));
        assert_eq!(info.redis.db, 2);
    }

    #[test]
    fn malformed_redis_url_is_rejected_at_load() {
        assert_matches!(
            load(&[DB, ("REDIS_URL", "not a url")]),
            Err(ConfigError::Invalid { var: "REDIS_URL", .. })
        );
    }

    #[test]
    fn redis_password_with_reserved_characters_is_kept_verbatim() {
        let config = load(&[
            DB,
            ("REDIS_HOST", "cache"),
            ("REDIS_PASSWORD", "p@ss/w#rd:%41"),
            ("REDIS_DB", "3"),
        ])
        .unwrap();

        let info = config.redis.connection_info().unwrap();
        assert_eq!(info.addr, ConnectionAddr::Tcp("cache".into(), 6379));
        assert_eq!(info.redis.db, 3);
        assert_eq!(info.redis.password.as_deref(), Some("p@ss/w#rd:%41"));
        assert!(redis::Client::open(info).is_ok());
        assert!(!config.redis.display_target().contains("p@ss"));
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(load(&[DB, ("LOG_FORMAT", "JSON")]).unwrap().log_format, LogFormat::Json);
        assert_matches!(
            load(&[DB, ("LOG_FORMAT", "xml")]),
            Err(ConfigError::Invalid { var: "LOG_FORMAT", .. })
        );
    }

    #[test]
    fn cors_origins_are_split_and_validated() {
        let config = load(&[DB, ("CORS_ORIGINS", "http://a.test, http://b.test,")]).unwrap();
        assert_eq!(config.server.cors_origins, ["http://a.test", "http://b.test"]);

        assert_matches!(
            load(&[DB, ("CORS_ORIGINS", "http://bad\norigin")]),
            Err(ConfigError::Invalid { var: "CORS_ORIGINS", .. })
        );
    }
}
