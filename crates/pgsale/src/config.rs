//! YAML database configuration.
//!
//! The file maps environment names to connection settings, in the familiar
//! `database.yml` layout:
//!
//! ```yaml
//! production:
//!   username: erp
//!   password: secret
//!   database: erp_production
//!   host: db.internal   # optional, default the local Unix socket
//!   port: 5433          # optional, default 5432
//! ```
//!
//! `<<: *anchor` merge keys are resolved before the sections are read.

use std::collections::HashMap;
use std::path::Path;

use pgsale_core::{Error, Result};
use pgsale_postgres::PgConfig;
use serde::Deserialize;

/// Connection settings of one environment. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DatabaseSettings {
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl DatabaseSettings {
    /// Build driver settings. User and database fall back to `postgres`.
    pub fn to_pg_config(&self) -> PgConfig {
        let mut config = PgConfig::default();
        if let Some(host) = &self.host {
            config = config.host(host.as_str());
        }
        if let Some(port) = self.port {
            config = config.port(port);
        }
        if let Some(user) = &self.username {
            config = config.user(user.as_str());
        }
        if let Some(password) = &self.password {
            config = config.password(password.as_str());
        }
        if let Some(database) = &self.database {
            config = config.database(database.as_str());
        }
        config
    }
}

/// Read `path` and return the settings of `env`.
pub fn load(path: &Path, env: &str) -> Result<DatabaseSettings> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
    let settings = from_yaml(&text, env)
        .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), env, "Loaded database configuration");
    Ok(settings)
}

/// Parse a configuration document and pick the `env` section.
pub fn from_yaml(text: &str, env: &str) -> std::result::Result<DatabaseSettings, String> {
    let mut document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| format!("invalid YAML: {e}"))?;
    document
        .apply_merge()
        .map_err(|e| format!("invalid YAML merge key: {e}"))?;
    let mut environments: HashMap<String, DatabaseSettings> =
        serde_yaml::from_value(document).map_err(|e| format!("invalid settings: {e}"))?;
    environments
        .remove(env)
        .ok_or_else(|| format!("no '{env}' environment"))
}
