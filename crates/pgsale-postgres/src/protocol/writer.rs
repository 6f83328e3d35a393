//! Frontend message encoder.

use super::messages::FrontendMessage;

const PASSWORD: u8 = b'p';
const QUERY: u8 = b'Q';
const TERMINATE: u8 = b'X';

/// Encodes frontend messages into a reusable buffer.
#[derive(Debug, Default)]
pub struct MessageWriter {
    buf: Vec<u8>,
}

impl MessageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode `msg`, returning the bytes to put on the wire.
    pub fn write(&mut self, msg: &FrontendMessage) -> &[u8] {
        self.buf.clear();
        match msg {
            FrontendMessage::Startup { version, params } => {
                // No type byte; the length prefix is patched in below.
                self.buf.extend_from_slice(&[0; 4]);
                self.buf.extend_from_slice(&version.to_be_bytes());
                for (name, value) in params {
                    put_cstring(&mut self.buf, name);
                    put_cstring(&mut self.buf, value);
                }
                self.buf.push(0);
                let len = self.buf.len() as i32;
                self.buf[..4].copy_from_slice(&len.to_be_bytes());
            }
            FrontendMessage::PasswordMessage(password) => {
                self.typed(PASSWORD, |body| put_cstring(body, password));
            }
            FrontendMessage::SASLInitialResponse { mechanism, data } => {
                self.typed(PASSWORD, |body| {
                    put_cstring(body, mechanism);
                    body.extend_from_slice(&(data.len() as i32).to_be_bytes());
                    body.extend_from_slice(data);
                });
            }
            FrontendMessage::SASLResponse(data) => {
                self.typed(PASSWORD, |body| body.extend_from_slice(data));
            }
            FrontendMessage::Query(sql) => {
                self.typed(QUERY, |body| put_cstring(body, sql));
            }
            FrontendMessage::Terminate => self.typed(TERMINATE, |_| {}),
        }
        &self.buf
    }

    fn typed(&mut self, ty: u8, body: impl FnOnce(&mut Vec<u8>)) {
        self.buf.push(ty);
        self.buf.extend_from_slice(&[0; 4]);
        body(&mut self.buf);
        let len = (self.buf.len() - 1) as i32;
        self.buf[1..5].copy_from_slice(&len.to_be_bytes());
    }
}

fn put_cstring(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}
