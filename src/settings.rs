//! Connection settings.
//!
//! [`ConnectSettings`] holds everything a client needs to reach a
//! PostgreSQL server: connection parameters, pool sizing bounds and the
//! template root directory. Driver-level connect options are built on
//! demand; the password never appears in `Debug` or `Display` output.

use crate::error::{DbError, DbResult};
use sqlx::postgres::PgConnectOptions;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DBNAME: &str = "public";
pub const DEFAULT_APPLICATION_NAME: &str = "pgtempl";

// Pool sizing defaults
pub const DEFAULT_MIN_POOL_SIZE: u32 = 4;
/// Fallback upper bound when `max_size` is unset. sqlx pools are always
/// bounded, so "no limit" is approximated by a generous cap.
pub const DEFAULT_MAX_POOL_SIZE: u32 = 16;

/// PostgreSQL connection settings and pool configuration.
///
/// `user` and `password` are mandatory; everything else has a default.
/// Validation happens in [`ConnectSettings::validate`], which is also
/// invoked by [`ConnectSettings::connect_options`] and by client
/// construction.
#[derive(Clone)]
pub struct ConnectSettings {
    /// Database server hostname or IP address.
    pub host: String,
    /// PostgreSQL server port.
    pub port: u16,
    /// Database name to connect to.
    pub dbname: String,
    /// Username for authentication. Required.
    pub user: String,
    /// Password for authentication. Required; redacted from Debug output.
    pub password: String,
    /// Directory containing SQL template files.
    pub template_dir: PathBuf,
    /// Minimum number of connections kept in the pool.
    pub min_size: u32,
    /// Maximum number of connections in the pool.
    /// `None` falls back to [`DEFAULT_MAX_POOL_SIZE`].
    pub max_size: Option<u32>,
    /// Application name reported to the server.
    pub application_name: String,
}

impl ConnectSettings {
    /// Create settings for the given credentials with all other fields at
    /// their defaults.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            dbname: DEFAULT_DBNAME.to_string(),
            user: user.into(),
            password: password.into(),
            template_dir: PathBuf::from("."),
            min_size: DEFAULT_MIN_POOL_SIZE,
            max_size: None,
            application_name: DEFAULT_APPLICATION_NAME.to_string(),
        }
    }

    /// Set the server hostname.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the database name.
    pub fn dbname(mut self, dbname: impl Into<String>) -> Self {
        self.dbname = dbname.into();
        self
    }

    /// Set the template root directory.
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = dir.into();
        self
    }

    /// Set the minimum pool size.
    pub fn min_size(mut self, min_size: u32) -> Self {
        self.min_size = min_size;
        self
    }

    /// Set the maximum pool size.
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Set the application name reported to the server.
    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Get the effective maximum pool size.
    pub fn max_size_or_default(&self) -> u32 {
        self.max_size.unwrap_or(DEFAULT_MAX_POOL_SIZE)
    }

    /// Validate the settings.
    pub fn validate(&self) -> DbResult<()> {
        if self.user.is_empty() {
            return Err(DbError::configuration("user must not be empty"));
        }
        if self.password.is_empty() {
            return Err(DbError::configuration("password must not be empty"));
        }
        if self.port == 0 {
            return Err(DbError::configuration("port must be a positive integer"));
        }
        if let Some(max) = self.max_size {
            if max == 0 {
                return Err(DbError::configuration("max_size must be greater than 0"));
            }
            if max < self.min_size {
                return Err(DbError::configuration(format!(
                    "max_size ({}) must not be less than min_size ({})",
                    max, self.min_size
                )));
            }
        }
        Ok(())
    }

    /// Build driver-level connect options. Not cached: settings are
    /// effectively immutable per client instance.
    pub fn connect_options(&self) -> DbResult<PgConnectOptions> {
        self.validate()?;
        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.dbname)
            .username(&self.user)
            .password(&self.password)
            .application_name(&self.application_name))
    }

    /// Template root directory.
    pub fn template_root(&self) -> &Path {
        &self.template_dir
    }
}

impl std::fmt::Display for ConnectSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.dbname)
    }
}

impl std::fmt::Debug for ConnectSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"***")
            .field("template_dir", &self.template_dir)
            .field("min_size", &self.min_size)
            .field("max_size", &self.max_size)
            .field("application_name", &self.application_name)
            .finish()
    }
}
