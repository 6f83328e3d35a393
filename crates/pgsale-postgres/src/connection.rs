//! Blocking PostgreSQL connection.
//!
//! One TCP or Unix-domain stream, one statement at a time, simple query
//! protocol only.
//! Results stay in text format and are handed to the caller as
//! [`QueryResult`]s.

use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use pgsale_core::{
    ColumnInfo, ConnectionError, ConnectionErrorKind, Error, Executor, QueryError,
    QueryErrorKind, QueryResult, Result, Row,
};

use crate::auth::{ScramClient, md5_password};
use crate::config::{Endpoint, PgConfig};
use crate::protocol::{
    BackendMessage, Diagnostic, FrontendMessage, MessageReader, MessageWriter, PROTOCOL_VERSION,
    SCRAM_SHA_256,
};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Authenticating,
    Ready,
    InQuery,
    Error,
    Closed,
}

/// The socket under a connection.
#[derive(Debug)]
enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn open(endpoint: &Endpoint, timeout: std::time::Duration) -> io::Result<Self> {
        match endpoint {
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect_timeout(&resolve(addr)?, timeout)?;
                stream.set_nodelay(true).ok();
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => Ok(Stream::Unix(UnixStream::connect(path)?)),
        }
    }

    fn shutdown(&self) {
        let _ = match self {
            Stream::Tcp(s) => s.shutdown(Shutdown::Both),
            #[cfg(unix)]
            Stream::Unix(s) => s.shutdown(Shutdown::Both),
        };
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

/// A synchronous connection to a PostgreSQL server.
pub struct PgConnection {
    stream: Stream,
    state: ConnectionState,
    process_id: i32,
    parameters: HashMap<String, String>,
    config: PgConfig,
    reader: MessageReader,
    writer: MessageWriter,
    read_buf: Vec<u8>,
}

impl std::fmt::Debug for PgConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("state", &self.state)
            .field("process_id", &self.process_id)
            .field("endpoint", &self.config.endpoint())
            .field("database", &self.config.database)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Open the socket, authenticate and wait for the first ReadyForQuery.
    #[tracing::instrument(level = "debug", skip(config), fields(endpoint = %config.endpoint()))]
    pub fn connect(config: PgConfig) -> Result<Self> {
        let endpoint = config.endpoint();

        let stream = Stream::open(&endpoint, config.connect_timeout).map_err(|e| {
            let kind = match e.kind() {
                ErrorKind::ConnectionRefused | ErrorKind::NotFound => ConnectionErrorKind::Refused,
                _ => ConnectionErrorKind::Connect,
            };
            Error::Connection(
                ConnectionError::new(kind, format!("Failed to connect to {endpoint}: {e}"))
                    .with_source(e),
            )
        })?;

        let mut conn = Self {
            stream,
            state: ConnectionState::Authenticating,
            process_id: 0,
            parameters: HashMap::new(),
            config,
            reader: MessageReader::new(),
            writer: MessageWriter::new(),
            read_buf: vec![0_u8; 8192],
        };

        let params = conn.config.startup_params();
        conn.send(&FrontendMessage::Startup {
            version: PROTOCOL_VERSION,
            params,
        })?;
        conn.handle_auth()?;
        conn.read_startup_messages()?;

        tracing::debug!(
            process_id = conn.process_id,
            server_version = conn.parameter("server_version").unwrap_or("unknown"),
            "Connected"
        );
        Ok(conn)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Backend process id reported at startup.
    pub fn process_id(&self) -> i32 {
        self.process_id
    }

    /// A server parameter reported through ParameterStatus.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    /// Run one statement through the simple query protocol.
    pub fn simple_query(&mut self, sql: &str) -> Result<QueryResult> {
        if self.state != ConnectionState::Ready {
            return Err(Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Disconnected,
                format!("Connection is not ready ({:?})", self.state),
            )));
        }

        tracing::trace!(sql, "Sending simple query");
        self.send(&FrontendMessage::Query(sql.to_string()))?;
        self.state = ConnectionState::InQuery;

        let mut result = QueryResult::default();
        let mut failure: Option<Error> = None;
        loop {
            match self.receive()? {
                BackendMessage::RowDescription(fields) => {
                    result.columns = fields
                        .into_iter()
                        .map(|f| ColumnInfo::new(f.name, f.type_oid))
                        .collect();
                    result.rows.clear();
                }
                BackendMessage::DataRow(values) => {
                    let values = values
                        .into_iter()
                        .map(|v| v.map(String::from_utf8).transpose())
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|e| protocol_error(format!("Non UTF-8 column text: {e}")))?;
                    result.rows.push(Row::new(values));
                }
                BackendMessage::CommandComplete(tag) => result.command_tag = Some(tag),
                BackendMessage::EmptyQueryResponse => result.command_tag = None,
                BackendMessage::ErrorResponse(diag) => {
                    // The server still sends ReadyForQuery after an error.
                    failure.get_or_insert_with(|| server_error(&diag, Some(sql)));
                }
                BackendMessage::NoticeResponse(notice) => {
                    tracing::debug!(notice = %notice, "Server notice");
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::ReadyForQuery => {
                    self.state = ConnectionState::Ready;
                    break;
                }
                other => {
                    self.state = ConnectionState::Error;
                    return Err(protocol_error(format!(
                        "Unexpected message during query: {other:?}"
                    )));
                }
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(result),
        }
    }

    /// Send Terminate and shut the socket down.
    pub fn close(mut self) -> Result<()> {
        if matches!(self.state, ConnectionState::Closed) {
            return Ok(());
        }
        self.send(&FrontendMessage::Terminate)?;
        self.state = ConnectionState::Closed;
        self.stream.shutdown();
        Ok(())
    }

    fn require_password(&self, mechanism: &str) -> Result<&str> {
        self.config.password.as_deref().ok_or_else(|| {
            auth_error(format!(
                "Server requested {mechanism} authentication but no password is configured"
            ))
        })
    }

    fn handle_auth(&mut self) -> Result<()> {
        loop {
            match self.receive()? {
                BackendMessage::AuthenticationOk => return Ok(()),
                BackendMessage::AuthenticationCleartextPassword => {
                    let password = self.require_password("cleartext")?.to_string();
                    self.send(&FrontendMessage::PasswordMessage(password))?;
                }
                BackendMessage::AuthenticationMD5Password(salt) => {
                    let hash = md5_password(&self.config.user, self.require_password("md5")?, salt);
                    self.send(&FrontendMessage::PasswordMessage(hash))?;
                }
                BackendMessage::AuthenticationSASL(mechanisms) => {
                    if !mechanisms.iter().any(|m| m == SCRAM_SHA_256) {
                        return Err(auth_error(format!(
                            "Unsupported SASL mechanisms: {mechanisms:?}"
                        )));
                    }
                    self.scram_auth()?;
                    return Ok(());
                }
                BackendMessage::ErrorResponse(e) => {
                    self.state = ConnectionState::Error;
                    return Err(server_error(&e, None));
                }
                BackendMessage::NegotiateProtocolVersion { unrecognized } => {
                    tracing::debug!(?unrecognized, "Server ignored startup options");
                }
                other => {
                    return Err(protocol_error(format!(
                        "Unexpected message during auth: {other:?}"
                    )));
                }
            }
        }
    }

    fn scram_auth(&mut self) -> Result<()> {
        let mut client = ScramClient::new(&self.config.user, self.require_password(SCRAM_SHA_256)?);

        self.send(&FrontendMessage::SASLInitialResponse {
            mechanism: SCRAM_SHA_256.to_string(),
            data: client.client_first(),
        })?;

        let server_first = match self.receive()? {
            BackendMessage::AuthenticationSASLContinue(data) => data,
            BackendMessage::ErrorResponse(e) => {
                self.state = ConnectionState::Error;
                return Err(server_error(&e, None));
            }
            other => {
                return Err(protocol_error(format!(
                    "Expected SASL continue, got: {other:?}"
                )));
            }
        };

        let client_final = client.process_server_first(&server_first)?;
        self.send(&FrontendMessage::SASLResponse(client_final))?;

        let server_final = match self.receive()? {
            BackendMessage::AuthenticationSASLFinal(data) => data,
            BackendMessage::ErrorResponse(e) => {
                self.state = ConnectionState::Error;
                return Err(server_error(&e, None));
            }
            other => {
                return Err(protocol_error(format!(
                    "Expected SASL final, got: {other:?}"
                )));
            }
        };
        client.verify_server_final(&server_final)?;

        match self.receive()? {
            BackendMessage::AuthenticationOk => Ok(()),
            BackendMessage::ErrorResponse(e) => {
                self.state = ConnectionState::Error;
                Err(server_error(&e, None))
            }
            other => Err(protocol_error(format!(
                "Expected AuthenticationOk, got: {other:?}"
            ))),
        }
    }

    fn read_startup_messages(&mut self) -> Result<()> {
        loop {
            match self.receive()? {
                BackendMessage::BackendKeyData { process_id, .. } => {
                    self.process_id = process_id;
                }
                BackendMessage::ParameterStatus { name, value } => {
                    self.parameters.insert(name, value);
                }
                BackendMessage::ReadyForQuery => {
                    self.state = ConnectionState::Ready;
                    return Ok(());
                }
                BackendMessage::ErrorResponse(e) => {
                    self.state = ConnectionState::Error;
                    return Err(server_error(&e, None));
                }
                BackendMessage::NoticeResponse(_) => {}
                other => {
                    return Err(protocol_error(format!(
                        "Unexpected startup message: {other:?}"
                    )));
                }
            }
        }
    }

    // ==================== I/O ====================

    fn send(&mut self, msg: &FrontendMessage) -> Result<()> {
        let data = self.writer.write(msg);
        if let Err(e) = self.stream.write_all(data).and_then(|()| self.stream.flush()) {
            self.state = ConnectionState::Error;
            return Err(Error::Connection(
                ConnectionError::new(
                    ConnectionErrorKind::Disconnected,
                    format!("Failed to write to server: {e}"),
                )
                .with_source(e),
            ));
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<BackendMessage> {
        loop {
            match self.reader.next_message() {
                Ok(Some(msg)) => return Ok(msg),
                Ok(None) => {}
                Err(e) => {
                    self.state = ConnectionState::Error;
                    return Err(protocol_error(format!("Protocol error: {e}")));
                }
            }

            let n = match self.stream.read(&mut self.read_buf) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.state = ConnectionState::Error;
                    return Err(Error::Connection(
                        ConnectionError::new(
                            ConnectionErrorKind::Disconnected,
                            format!("Failed to read from server: {e}"),
                        )
                        .with_source(e),
                    ));
                }
            };
            if n == 0 {
                self.state = ConnectionState::Closed;
                return Err(Error::Connection(ConnectionError::new(
                    ConnectionErrorKind::Disconnected,
                    "Connection closed by server",
                )));
            }
            self.reader.push(&self.read_buf[..n]);
        }
    }
}

impl Executor for PgConnection {
    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.simple_query(sql)
    }
}

fn resolve(addr: &str) -> io::Result<SocketAddr> {
    addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(ErrorKind::AddrNotAvailable, format!("no address found for {addr}"))
    })
}

fn auth_error(msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError::new(
        ConnectionErrorKind::Authentication,
        msg,
    ))
}

fn protocol_error(msg: impl Into<String>) -> Error {
    Error::Protocol(msg.into())
}

/// Map a server error to the crate error, keeping the SQLSTATE.
fn server_error(diag: &Diagnostic, sql: Option<&str>) -> Error {
    match diag.class() {
        "08" => {
            return Error::Connection(ConnectionError::new(
                ConnectionErrorKind::Connect,
                diag.message.clone(),
            ));
        }
        "28" => return auth_error(diag.message.clone()),
        _ => {}
    }

    let mut err = QueryError::new(QueryErrorKind::from_sqlstate(&diag.code), diag.message.clone());
    err.sqlstate = Some(diag.code.clone());
    err.detail.clone_from(&diag.detail);
    err.hint.clone_from(&diag.hint);
    if let Some(sql) = sql {
        err = err.with_sql(sql);
    }
    Error::Query(err)
}
