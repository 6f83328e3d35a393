//! Password authentication: MD5 and SCRAM-SHA-256.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use hmac::{Hmac, Mac};
use pgsale_core::{ConnectionError, ConnectionErrorKind, Error, Result};
use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// GS2 header without channel binding, base64 encoded.
const CHANNEL_BINDING: &str = "biws";

const NONCE_LEN: usize = 18;

/// `md5` followed by hex(md5(hex(md5(password || user)) || salt)).
pub fn md5_password(user: &str, password: &str, salt: [u8; 4]) -> String {
    let inner = md5::compute(format!("{password}{user}").as_bytes());

    let mut outer_input = format!("{inner:x}").into_bytes();
    outer_input.extend_from_slice(&salt);
    let outer = md5::compute(&outer_input);

    let mut result = String::with_capacity(35);
    result.push_str("md5");
    let _ = write!(result, "{outer:x}");
    result
}

/// Client side of a single SCRAM-SHA-256 exchange.
#[derive(Debug)]
pub struct ScramClient {
    user: String,
    password: String,
    client_nonce: String,
    client_first_bare: String,
    auth_message: Option<String>,
    salted_password: Option<Vec<u8>>,
}

impl ScramClient {
    /// Start an exchange with a fresh random nonce.
    pub fn new(user: &str, password: &str) -> Self {
        let mut raw = [0_u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut raw);
        Self::with_nonce(user, password, &BASE64.encode(raw))
    }

    /// Start an exchange with a caller-supplied nonce.
    pub fn with_nonce(user: &str, password: &str, nonce: &str) -> Self {
        let client_first_bare = format!("n={},r={nonce}", sasl_name(user));
        Self {
            user: user.to_string(),
            password: password.to_string(),
            client_nonce: nonce.to_string(),
            client_first_bare,
            auth_message: None,
            salted_password: None,
        }
    }

    /// The client-first message: `n,,n=<user>,r=<nonce>`.
    pub fn client_first(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare).into_bytes()
    }

    /// Consume server-first and produce client-final with the proof.
    pub fn process_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        let server_first = std::str::from_utf8(data)
            .map_err(|_| auth_error("SCRAM server-first message is not UTF-8"))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            if let Some(v) = attr.strip_prefix("r=") {
                nonce = Some(v);
            } else if let Some(v) = attr.strip_prefix("s=") {
                salt = Some(v);
            } else if let Some(v) = attr.strip_prefix("i=") {
                iterations = Some(v);
            }
        }

        let nonce = nonce.ok_or_else(|| auth_error("SCRAM server-first without nonce"))?;
        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(auth_error("SCRAM server nonce does not extend client nonce"));
        }
        let salt = salt
            .and_then(|s| BASE64.decode(s).ok())
            .ok_or_else(|| auth_error("SCRAM server-first without a valid salt"))?;
        let iterations = iterations
            .and_then(|i| i.parse::<u32>().ok())
            .filter(|&i| i > 0)
            .ok_or_else(|| auth_error("SCRAM server-first without a valid iteration count"))?;

        let mut salted = [0_u8; 32];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.password.as_bytes(), &salt, iterations, &mut salted);

        let client_key = hmac(&salted, b"Client Key")?;
        let stored_key = Sha256::digest(&client_key);

        let without_proof = format!("c={CHANNEL_BINDING},r={nonce}");
        let auth_message = format!("{},{server_first},{without_proof}", self.client_first_bare);
        let signature = hmac(&stored_key, auth_message.as_bytes())?;

        let proof: Vec<u8> = client_key
            .iter()
            .zip(signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        tracing::debug!(user = %self.user, iterations, "SCRAM client proof computed");
        self.auth_message = Some(auth_message);
        self.salted_password = Some(salted.to_vec());
        Ok(format!("{without_proof},p={}", BASE64.encode(proof)).into_bytes())
    }

    /// Check the server signature carried by server-final.
    pub fn verify_server_final(&self, data: &[u8]) -> Result<()> {
        let (Some(auth_message), Some(salted)) = (&self.auth_message, &self.salted_password)
        else {
            return Err(auth_error("SCRAM server-final before server-first"));
        };
        let server_final = std::str::from_utf8(data)
            .map_err(|_| auth_error("SCRAM server-final message is not UTF-8"))?;

        if let Some(reason) = server_final.strip_prefix("e=") {
            return Err(auth_error(format!("SCRAM authentication failed: {reason}")));
        }
        let verifier = server_final
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .and_then(|v| BASE64.decode(v).ok())
            .ok_or_else(|| auth_error("SCRAM server-final without verifier"))?;

        let server_key = hmac(salted, b"Server Key")?;
        let expected = hmac(&server_key, auth_message.as_bytes())?;
        if bool::from(expected.ct_eq(&verifier)) {
            Ok(())
        } else {
            Err(auth_error("SCRAM server signature mismatch"))
        }
    }
}

fn hmac(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|_| auth_error("invalid HMAC key length"))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Escape `=` and `,` in a SCRAM user name.
fn sasl_name(user: &str) -> String {
    user.replace('=', "=3D").replace(',', "=2C")
}

fn auth_error(msg: impl Into<String>) -> Error {
    Error::Connection(ConnectionError::new(
        ConnectionErrorKind::Authentication,
        msg,
    ))
}
