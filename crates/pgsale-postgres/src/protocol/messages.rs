//! What travels between pgsale and the server.
//!
//! pgsale only speaks the simple query flow: each statement is one `Query`
//! and every column comes back as text.

use std::fmt;

/// Protocol 3.0, sent in the startup packet.
pub const PROTOCOL_VERSION: i32 = 3 << 16;

pub const SCRAM_SHA_256: &str = "SCRAM-SHA-256";

/// Client to server.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendMessage {
    /// Untagged first packet carrying `user`, `database` and friends
    Startup {
        version: i32,
        params: Vec<(String, String)>,
    },
    /// Cleartext password or `md5` digest
    PasswordMessage(String),
    SASLInitialResponse {
        mechanism: String,
        data: Vec<u8>,
    },
    SASLResponse(Vec<u8>),
    Query(String),
    Terminate,
}

/// Server to client.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendMessage {
    AuthenticationOk,
    AuthenticationCleartextPassword,
    AuthenticationMD5Password([u8; 4]),
    /// Offered SASL mechanisms
    AuthenticationSASL(Vec<String>),
    AuthenticationSASLContinue(Vec<u8>),
    AuthenticationSASLFinal(Vec<u8>),
    BackendKeyData { process_id: i32, secret_key: i32 },
    ParameterStatus { name: String, value: String },
    /// End of a startup or query cycle
    ReadyForQuery,
    RowDescription(Vec<ResultColumn>),
    /// One row, `None` for NULL
    DataRow(Vec<Option<Vec<u8>>>),
    CommandComplete(String),
    EmptyQueryResponse,
    ErrorResponse(Diagnostic),
    NoticeResponse(Diagnostic),
    /// Startup options the server did not recognise
    NegotiateProtocolVersion { unrecognized: Vec<String> },
}

/// The part of a RowDescription entry pgsale keeps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultColumn {
    pub name: String,
    pub type_oid: u32,
}

/// Body of an ErrorResponse or NoticeResponse.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Diagnostic {
    pub severity: String,
    /// SQLSTATE
    pub code: String,
    pub message: String,
    pub detail: Option<String>,
    pub hint: Option<String>,
}

impl Diagnostic {
    /// Two-character SQLSTATE class, e.g. `28` for authorization failures.
    pub fn class(&self) -> &str {
        self.code.get(..2).unwrap_or(&self.code)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.severity, self.code, self.message)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_class_and_text() {
        let diag = Diagnostic {
            severity: "ERROR".to_string(),
            code: "23505".to_string(),
            message: "duplicate key value violates unique constraint".to_string(),
            detail: Some("Key (code)=(C1) already exists.".to_string()),
            ..Default::default()
        };
        assert_eq!(diag.class(), "23");
        assert_eq!(
            diag.to_string(),
            "ERROR 23505: duplicate key value violates unique constraint \
             (Key (code)=(C1) already exists.)"
        );

        let short = Diagnostic {
            code: "X".to_string(),
            ..Default::default()
        };
        assert_eq!(short.class(), "X");
    }
}
