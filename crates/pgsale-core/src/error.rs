//! Error types shared by every pgsale crate.
//!
//! The taxonomy separates operator mistakes ([`Error::Validation`]) from
//! everything else. Validation failures are reported and the process exits
//! cleanly; every other variant is fatal and propagates to the top untouched.

use std::fmt;

/// Result alias used across the workspace.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All errors produced by pgsale.
#[derive(Debug)]
pub enum Error {
    /// A command-line argument is missing or has the wrong shape.
    Validation(ValidationError),
    /// An upsert referenced a column the table does not have.
    UnknownColumn {
        /// Table that was introspected
        table: String,
        /// Offending column key
        column: String,
    },
    /// A column type has no semantic kind the codec can handle.
    ///
    /// Carries the catalog type name, or `None` when the type OID was not in
    /// the registry at all.
    UnknownType(Option<String>),
    /// Text returned by the database could not be parsed for its kind.
    Decode {
        /// Kind the text was decoded as
        kind: &'static str,
        /// Raw text received
        text: String,
    },
    /// An upsert request that can never produce a valid statement.
    InvalidRequest(String),
    /// A required lookup row does not exist.
    NotFound(String),
    /// Configuration file problem.
    Config(String),
    /// Connecting to or talking with the server failed.
    Connection(ConnectionError),
    /// The server rejected a statement.
    Query(QueryError),
    /// The server sent something the driver could not understand.
    Protocol(String),
}

impl Error {
    /// Whether this error should be reported through the clean-exit path.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Validation(e) => write!(f, "{e}"),
            Error::UnknownColumn { table, column } => {
                write!(f, "Unknown column {column} in table {table}")
            }
            Error::UnknownType(Some(name)) => write!(f, "Unknown type: {name}"),
            Error::UnknownType(None) => write!(f, "Unknown type: unregistered type oid"),
            Error::Decode { kind, text } => write!(f, "Cannot decode {text:?} as {kind}"),
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {msg}"),
            Error::NotFound(msg) => write!(f, "Not found: {msg}"),
            Error::Config(msg) => write!(f, "Configuration error: {msg}"),
            Error::Connection(e) => write!(f, "{e}"),
            Error::Query(e) => write!(f, "{e}"),
            Error::Protocol(msg) => write!(f, "Protocol error: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|s| s as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

// ==================== Validation ====================

/// The shape an argument had, or was expected to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Not given at all
    Missing,
    /// A plain `key=value` leaf
    Value,
    /// A nested `key.sub=value` group
    Mapping,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Missing => write!(f, "missing"),
            Shape::Value => write!(f, "value"),
            Shape::Mapping => write!(f, "mapping"),
        }
    }
}

/// A command-line argument did not have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Operator-facing hint, e.g. `Needs 'client.code=XXX' parameter`
    pub message: String,
    /// Shape that was required
    pub expected: Shape,
    /// Shape that was found
    pub got: Shape,
}

impl ValidationError {
    pub fn new(message: impl Into<String>, expected: Shape, got: Shape) -> Self {
        Self {
            message: message.into(),
            expected,
            got,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} expected, {} got)",
            self.message, self.expected, self.got
        )
    }
}

impl std::error::Error for ValidationError {}

// ==================== Connection ====================

/// Broad category of a connection failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// TCP connect or address resolution failed
    Connect,
    /// Server actively refused the connection
    Refused,
    /// Credentials were rejected or missing
    Authentication,
    /// The socket closed or failed mid-conversation
    Disconnected,
}

/// Failure to establish or keep a connection.
#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying I/O error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Connection error ({:?}): {}", self.kind, self.message)
    }
}

// ==================== Query ====================

/// Category of a server-side statement failure, derived from SQLSTATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Class 42: syntax error or access rule violation
    Syntax,
    /// Class 23: integrity constraint violation
    Constraint,
    /// Class 22: invalid data, e.g. a malformed literal
    Data,
    /// Anything else reported by the server
    Database,
}

impl QueryErrorKind {
    /// Classify a SQLSTATE code.
    pub fn from_sqlstate(code: &str) -> Self {
        match code.get(..2) {
            Some("42") => QueryErrorKind::Syntax,
            Some("23") => QueryErrorKind::Constraint,
            Some("22") => QueryErrorKind::Data,
            _ => QueryErrorKind::Database,
        }
    }
}

/// A statement the server refused to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
    pub sqlstate: Option<String>,
    pub sql: Option<String>,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            sqlstate: None,
            sql: None,
            detail: None,
            hint: None,
        }
    }

    /// Remember which statement failed.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Query error ({:?}): {}", self.kind, self.message)?;
        if let Some(code) = &self.sqlstate {
            write!(f, " [{code}]")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, "\nDETAIL: {detail}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\nHINT: {hint}")?;
        }
        if let Some(sql) = &self.sql {
            write!(f, "\nSQL: {sql}")?;
        }
        Ok(())
    }
}
