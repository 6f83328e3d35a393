//! PostgreSQL connection configuration.

use std::fmt;
#[cfg(unix)]
use std::path::PathBuf;
use std::time::Duration;

/// Directory holding the server's Unix socket when no host is given.
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/postgresql";

/// Where a connection is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `host:port`
    Tcp(String),
    /// Path of the `.s.PGSQL.<port>` socket file
    #[cfg(unix)]
    Unix(PathBuf),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Tcp(addr) => f.write_str(addr),
            #[cfg(unix)]
            Endpoint::Unix(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Connection parameters for a [`crate::PgConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// Hostname, IP address or socket directory. `None` means the local
    /// Unix socket.
    pub host: Option<String>,
    /// Port number (default: 5432)
    pub port: u16,
    /// Role to authenticate as
    pub user: String,
    /// Password, if the server asks for one
    pub password: Option<String>,
    /// Database to connect to
    pub database: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Reported to the server as `application_name`
    pub application_name: Option<String>,
}

impl Default for PgConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 5432,
            user: "postgres".to_string(),
            password: None,
            database: "postgres".to_string(),
            connect_timeout: Duration::from_secs(10),
            application_name: Some("pg_sale".to_string()),
        }
    }
}

impl PgConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            user: user.into(),
            database: database.into(),
            ..Self::default()
        }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = Some(name.into());
        self
    }

    /// Resolve the transport: a host starting with `/` is a socket
    /// directory, any other host is reached over TCP.
    pub fn endpoint(&self) -> Endpoint {
        match self.host.as_deref() {
            #[cfg(unix)]
            None => Endpoint::Unix(self.socket_path(DEFAULT_SOCKET_DIR)),
            #[cfg(not(unix))]
            None => Endpoint::Tcp(format!("localhost:{}", self.port)),
            #[cfg(unix)]
            Some(dir) if dir.starts_with('/') => Endpoint::Unix(self.socket_path(dir)),
            Some(host) => Endpoint::Tcp(format!("{host}:{}", self.port)),
        }
    }

    #[cfg(unix)]
    fn socket_path(&self, dir: &str) -> PathBuf {
        PathBuf::from(dir).join(format!(".s.PGSQL.{}", self.port))
    }

    /// Key/value pairs for the startup message.
    pub fn startup_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("user".to_string(), self.user.clone()),
            ("database".to_string(), self.database.clone()),
            ("client_encoding".to_string(), "UTF8".to_string()),
            ("DateStyle".to_string(), "ISO".to_string()),
        ];
        if let Some(name) = &self.application_name {
            params.push(("application_name".to_string(), name.clone()));
        }
        params
    }
}
