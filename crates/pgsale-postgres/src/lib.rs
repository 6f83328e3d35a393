//! PostgreSQL driver for pgsale.
//!
//! This crate speaks the PostgreSQL wire protocol directly over a blocking
//! TCP or Unix-domain stream. It provides:
//!
//! - Message framing and parsing
//! - Authentication (cleartext, MD5, SCRAM-SHA-256)
//! - The simple query protocol, with results kept in text format
//! - [`PgConnection`], an implementation of [`pgsale_core::Executor`]

pub mod auth;
pub mod config;
pub mod connection;
pub mod protocol;

pub use config::{Endpoint, PgConfig};
pub use connection::PgConnection;
