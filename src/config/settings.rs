use std::{path::Path, time::Duration};

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::{
    client::ClientConfig,
    dump::{DumpOptions, DEFAULT_MAX_DB_INDEX},
    error::SettingsError,
    logging::{LogFormat, LoggingConfig},
    serializer::Serializer,
};

/// Prefix of the environment overrides (`ZUMIC_DUMP_PORT=6380`).
pub const ENV_PREFIX: &str = "ZUMIC_DUMP";

/// Everything a dump run can be configured with.
///
/// Sources, lowest priority first: built-in defaults, an optional TOML file,
/// `ZUMIC_DUMP_*` environment variables. Command line flags are applied on
/// top by the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpSettings {
    pub host: String,
    pub port: u16,
    /// Single database to dump; the whole server when unset
    pub db: Option<u32>,
    pub workers: usize,
    pub batch_size: usize,
    pub output: Serializer,
    pub with_ttl: bool,
    /// Key glob
    pub filter: String,
    /// Highest database index accepted (inclusive)
    pub max_db_index: u32,
    pub username: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// No progress display
    pub silent: bool,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for DumpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            db: None,
            workers: 10,
            batch_size: 100,
            output: Serializer::Resp,
            with_ttl: true,
            filter: "*".to_string(),
            max_db_index: DEFAULT_MAX_DB_INDEX,
            username: None,
            password: None,
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
            write_timeout_secs: 10,
            silent: false,
            log_level: "warn".to_string(),
            log_format: LogFormat::Compact,
        }
    }
}

impl DumpSettings {
    /// Loads defaults, then `path` (must exist when given), then the
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(path, ENV_PREFIX)
    }

    fn load_with_env(
        path: Option<&Path>,
        env_prefix: &str,
    ) -> Result<Self, SettingsError> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("workers", defaults.workers as i64)?
            .set_default("batch_size", defaults.batch_size as i64)?
            .set_default("output", defaults.output.name())?
            .set_default("with_ttl", defaults.with_ttl)?
            .set_default("filter", defaults.filter)?
            .set_default("max_db_index", i64::from(defaults.max_db_index))?
            .set_default("connect_timeout_secs", defaults.connect_timeout_secs as i64)?
            .set_default("read_timeout_secs", defaults.read_timeout_secs as i64)?
            .set_default("write_timeout_secs", defaults.write_timeout_secs as i64)?
            .set_default("silent", defaults.silent)?
            .set_default("log_level", defaults.log_level)?
            .set_default("log_format", "compact")?;

        if let Some(path) = path {
            if !path.exists() {
                return Err(SettingsError::MissingFile(path.display().to_string()));
            }
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }

        let settings: Self = builder
            .add_source(Environment::with_prefix(env_prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        let at_least_one = |field, ok: bool| {
            if ok {
                Ok(())
            } else {
                Err(SettingsError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                })
            }
        };
        at_least_one("workers", self.workers > 0)?;
        at_least_one("batch_size", self.batch_size > 0)?;

        if self.host.is_empty() {
            return Err(SettingsError::Invalid {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(db) = self.db {
            if db > self.max_db_index {
                return Err(SettingsError::Invalid {
                    field: "db",
                    reason: format!("{db} exceeds max_db_index ({})", self.max_db_index),
                });
            }
        }
        Ok(())
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn dump_options(&self) -> DumpOptions {
        DumpOptions {
            workers: self.workers,
            batch_size: self.batch_size,
            with_ttl: self.with_ttl,
            max_db_index: self.max_db_index,
            key_pattern: self.filter.clone(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            password: self.password.clone(),
            username: self.username.clone(),
        }
    }

    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            ..Default::default()
        }
    }
}
