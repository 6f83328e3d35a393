//! Splitting the byte stream into backend messages.

use std::fmt;

use super::messages::{BackendMessage, Diagnostic, ResultColumn};

/// Largest frame accepted from the server.
pub const MAX_FRAME: usize = 8 << 20;

/// Backend message tags.
mod tag {
    pub const AUTH: u8 = b'R';
    pub const KEY_DATA: u8 = b'K';
    pub const PARAMETER: u8 = b'S';
    pub const READY: u8 = b'Z';
    pub const ROW_DESCRIPTION: u8 = b'T';
    pub const DATA_ROW: u8 = b'D';
    pub const COMPLETE: u8 = b'C';
    pub const EMPTY_QUERY: u8 = b'I';
    pub const ERROR: u8 = b'E';
    pub const NOTICE: u8 = b'N';
    pub const NEGOTIATE: u8 = b'v';
}

/// A frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Length prefix below 4
    BadLength(i32),
    TooLarge(usize),
    UnknownTag(u8),
    /// The body ended inside a field
    Truncated,
    NotUtf8,
    Malformed(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::BadLength(n) => write!(f, "bad frame length {n}"),
            DecodeError::TooLarge(n) => write!(f, "{n} byte frame exceeds {MAX_FRAME}"),
            DecodeError::UnknownTag(t) => write!(f, "unexpected message tag {:?}", char::from(*t)),
            DecodeError::Truncated => f.write_str("message body truncated"),
            DecodeError::NotUtf8 => f.write_str("string field is not UTF-8"),
            DecodeError::Malformed(what) => write!(f, "malformed {what}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Accumulates socket reads and yields complete messages.
#[derive(Debug, Default)]
pub struct MessageReader {
    pending: Vec<u8>,
}

impl MessageReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// The next whole message, or `None` until more bytes arrive.
    pub fn next_message(&mut self) -> Result<Option<BackendMessage>, DecodeError> {
        let Some(header) = self.pending.get(..5) else {
            return Ok(None);
        };
        let length = i32::from_be_bytes([header[1], header[2], header[3], header[4]]);
        let Some(body_len) = usize::try_from(length).ok().and_then(|n| n.checked_sub(4)) else {
            return Err(DecodeError::BadLength(length));
        };
        let frame_len = body_len + 5;
        if frame_len > MAX_FRAME {
            return Err(DecodeError::TooLarge(frame_len));
        }
        if self.pending.len() < frame_len {
            return Ok(None);
        }

        let frame: Vec<u8> = self.pending.drain(..frame_len).collect();
        decode(frame[0], &frame[5..]).map(Some)
    }
}

/// Decode the body of a message tagged `code`.
pub fn decode(code: u8, body: &[u8]) -> Result<BackendMessage, DecodeError> {
    let mut body = Body(body);
    let message = match code {
        tag::AUTH => authentication(&mut body)?,
        tag::KEY_DATA => BackendMessage::BackendKeyData {
            process_id: body.i32()?,
            secret_key: body.i32()?,
        },
        tag::PARAMETER => BackendMessage::ParameterStatus {
            name: body.cstr()?,
            value: body.cstr()?,
        },
        tag::READY => match body.u8()? {
            b'I' | b'T' | b'E' => BackendMessage::ReadyForQuery,
            _ => return Err(DecodeError::Malformed("transaction status")),
        },
        tag::ROW_DESCRIPTION => {
            let count = body.count()?;
            let mut columns = Vec::with_capacity(count);
            for _ in 0..count {
                let name = body.cstr()?;
                // table oid, attribute number
                body.take(6)?;
                let type_oid = body.u32()?;
                // type size, modifier, format
                body.take(8)?;
                columns.push(ResultColumn { name, type_oid });
            }
            BackendMessage::RowDescription(columns)
        }
        tag::DATA_ROW => {
            let count = body.count()?;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(match body.i32()? {
                    -1 => None,
                    n => {
                        let n = usize::try_from(n)
                            .map_err(|_| DecodeError::Malformed("column length"))?;
                        Some(body.take(n)?.to_vec())
                    }
                });
            }
            BackendMessage::DataRow(values)
        }
        tag::COMPLETE => BackendMessage::CommandComplete(body.cstr()?),
        tag::EMPTY_QUERY => BackendMessage::EmptyQueryResponse,
        tag::ERROR => BackendMessage::ErrorResponse(diagnostic(&mut body)?),
        tag::NOTICE => BackendMessage::NoticeResponse(diagnostic(&mut body)?),
        tag::NEGOTIATE => {
            // newest supported minor version
            body.i32()?;
            let count = usize::try_from(body.i32()?)
                .map_err(|_| DecodeError::Malformed("option count"))?;
            let mut unrecognized = Vec::with_capacity(count);
            for _ in 0..count {
                unrecognized.push(body.cstr()?);
            }
            BackendMessage::NegotiateProtocolVersion { unrecognized }
        }
        other => return Err(DecodeError::UnknownTag(other)),
    };
    Ok(message)
}

fn authentication(body: &mut Body<'_>) -> Result<BackendMessage, DecodeError> {
    Ok(match body.i32()? {
        0 => BackendMessage::AuthenticationOk,
        3 => BackendMessage::AuthenticationCleartextPassword,
        5 => {
            let mut salt = [0_u8; 4];
            salt.copy_from_slice(body.take(4)?);
            BackendMessage::AuthenticationMD5Password(salt)
        }
        10 => {
            let mut mechanisms = Vec::new();
            loop {
                let name = body.cstr()?;
                if name.is_empty() {
                    break;
                }
                mechanisms.push(name);
            }
            BackendMessage::AuthenticationSASL(mechanisms)
        }
        11 => BackendMessage::AuthenticationSASLContinue(body.rest()),
        12 => BackendMessage::AuthenticationSASLFinal(body.rest()),
        _ => return Err(DecodeError::Malformed("authentication request")),
    })
}

fn diagnostic(body: &mut Body<'_>) -> Result<Diagnostic, DecodeError> {
    let mut diag = Diagnostic::default();
    loop {
        let field = body.u8()?;
        if field == 0 {
            return Ok(diag);
        }
        let value = body.cstr()?;
        match field {
            b'S' => diag.severity = value,
            b'C' => diag.code = value,
            b'M' => diag.message = value,
            b'D' => diag.detail = Some(value),
            b'H' => diag.hint = Some(value),
            _ => {}
        }
    }
}

/// Unread remainder of a message body.
struct Body<'a>(&'a [u8]);

impl<'a> Body<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.0.len() < n {
            return Err(DecodeError::Truncated);
        }
        let (head, tail) = self.0.split_at(n);
        self.0 = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// An `int16` element count.
    fn count(&mut self) -> Result<usize, DecodeError> {
        let b = self.take(2)?;
        usize::try_from(i16::from_be_bytes([b[0], b[1]]))
            .map_err(|_| DecodeError::Malformed("element count"))
    }

    fn cstr(&mut self) -> Result<String, DecodeError> {
        let nul = self
            .0
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::Truncated)?;
        let text = self.take(nul)?;
        self.take(1)?;
        String::from_utf8(text.to_vec()).map_err(|_| DecodeError::NotUtf8)
    }

    fn rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.0).to_vec()
    }
}
