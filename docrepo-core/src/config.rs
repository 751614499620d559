//! Connection configuration.

use std::{env, time::Duration};

use serde::Deserialize;

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Bound applied to connecting and the startup health check together.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound applied to releasing the client on disconnect.
pub const DEFAULT_DISCONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable holding the server URI.
pub const ENV_URI: &str = "MONGO_URI";
/// Environment variable holding the database name.
pub const ENV_DATABASE: &str = "MONGO_DATABASE";
/// Environment variable enabling retryable writes (`true`/`1`/`yes`).
pub const ENV_RETRY_WRITES: &str = "MONGO_RETRY_WRITES";

/// Parameters needed to open a database connection.
///
/// The connection string is derived as `<uri>/<database>`, suffixed with
/// `?retryWrites=true` when `retry_writes` is set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    /// Server URI without a database path, e.g. `mongodb://localhost:27017`.
    pub uri: String,
    /// Name of the database to select.
    pub database: String,
    /// Whether to request retryable writes.
    #[serde(default)]
    pub retry_writes: bool,
    /// Bound for connect plus health check.
    #[serde(default = "default_connect_timeout", with = "duration_secs")]
    pub connect_timeout: Duration,
    /// Bound for disconnect.
    #[serde(default = "default_disconnect_timeout", with = "duration_secs")]
    pub disconnect_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_disconnect_timeout() -> Duration {
    DEFAULT_DISCONNECT_TIMEOUT
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

impl ConnectionConfig {
    /// Creates a configuration with the default timeouts.
    pub fn new(uri: impl Into<String>, database: impl Into<String>, retry_writes: bool) -> Self {
        Self {
            uri: uri.into(),
            database: database.into(),
            retry_writes,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            disconnect_timeout: DEFAULT_DISCONNECT_TIMEOUT,
        }
    }

    /// Reads the configuration from `MONGO_URI`, `MONGO_DATABASE` and `MONGO_RETRY_WRITES`.
    ///
    /// Missing variables become empty strings so that [`ConnectionConfig::validate`] reports
    /// them the same way as explicitly empty values.
    pub fn from_env() -> Self {
        let retry_writes = env::var(ENV_RETRY_WRITES)
            .map(|value| matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Self::new(
            env::var(ENV_URI).unwrap_or_default(),
            env::var(ENV_DATABASE).unwrap_or_default(),
            retry_writes,
        )
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// Rejects an empty URI or database name.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        if self.uri.is_empty() {
            return Err(DocumentStoreError::Configuration("uri is required".into()));
        }
        if self.database.is_empty() {
            return Err(DocumentStoreError::Configuration("database name is required".into()));
        }

        Ok(())
    }

    /// Builds the connection string handed to the driver.
    pub fn connection_string(&self) -> String {
        let mut connection_string = format!("{}/{}", self.uri, self.database);

        if self.retry_writes {
            connection_string.push_str("?retryWrites=true");
        }

        connection_string
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_string_with_retry_writes() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "testdb", true);

        assert_eq!(
            config.connection_string(),
            "mongodb://localhost:27017/testdb?retryWrites=true"
        );
    }

    #[test]
    fn test_connection_string_without_retry_writes() {
        let config = ConnectionConfig::new("mongodb://localhost:27017", "testdb", false);

        assert_eq!(config.connection_string(), "mongodb://localhost:27017/testdb");
    }

    #[test]
    fn test_validate_rejects_empty_values() {
        let missing_uri = ConnectionConfig::new("", "testdb", false);
        let missing_name = ConnectionConfig::new("mongodb://localhost:27017", "", false);

        assert!(matches!(
            missing_uri.validate(),
            Err(DocumentStoreError::Configuration(msg)) if msg == "uri is required"
        ));
        assert!(matches!(
            missing_name.validate(),
            Err(DocumentStoreError::Configuration(msg)) if msg == "database name is required"
        ));
    }

    fn set_env(key: &str, value: Option<&str>) {
        // SAFETY: only `test_from_env` touches these variables.
        unsafe {
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    // One test covers every case so the variables are never mutated concurrently.
    #[test]
    fn test_from_env() {
        let original: Vec<_> = [ENV_URI, ENV_DATABASE, ENV_RETRY_WRITES]
            .into_iter()
            .map(|key| (key, env::var(key).ok()))
            .collect();

        set_env(ENV_URI, Some("mongodb://db:27017"));
        set_env(ENV_DATABASE, Some("app"));
        for (raw, expected) in [(Some("TRUE"), true), (Some(" yes "), true), (Some("0"), false), (None, false)] {
            set_env(ENV_RETRY_WRITES, raw);

            let config = ConnectionConfig::from_env();

            assert_eq!(config.retry_writes, expected, "MONGO_RETRY_WRITES={raw:?}");
            assert_eq!(config.uri, "mongodb://db:27017");
            assert_eq!(config.database, "app");
            assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
            assert!(config.validate().is_ok());
        }

        set_env(ENV_URI, None);
        let missing_uri = ConnectionConfig::from_env();
        assert_eq!(missing_uri.uri, "");
        assert!(matches!(
            missing_uri.validate(),
            Err(DocumentStoreError::Configuration(msg)) if msg == "uri is required"
        ));

        set_env(ENV_URI, Some("mongodb://db:27017"));
        set_env(ENV_DATABASE, None);
        assert!(matches!(
            ConnectionConfig::from_env().validate(),
            Err(DocumentStoreError::Configuration(msg)) if msg == "database name is required"
        ));

        for (key, value) in original {
            set_env(key, value.as_deref());
        }
    }

    #[test]
    fn test_deserialize_applies_default_timeouts() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{ "uri": "mongodb://db:27017", "database": "app", "connect_timeout": 3 }"#,
        )
        .unwrap();

        assert!(!config.retry_writes);
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.disconnect_timeout, DEFAULT_DISCONNECT_TIMEOUT);
    }
}
