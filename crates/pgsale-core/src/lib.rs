//! Core types and traits for pgsale.
//!
//! `pgsale-core` is the driver-agnostic layer of the workspace. It owns the
//! translation boundary between the untyped strings that arrive on the command
//! line and the typed values that live in database columns.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: [`Executor`] is the single capability a database driver
//!   must provide. Everything above it (type registry, codec, upsert engine)
//!   only ever sees SQL text going down and [`QueryResult`]s coming back.
//! - **Data model**: [`Value`] and [`Record`] represent decoded rows, [`SqlKind`]
//!   is the closed set of semantic column kinds the codec understands.
//! - **Codec**: [`codec::quote`] and [`codec::unquote`] convert between CLI text,
//!   SQL literals and native values.
//!
//! # Who Uses This Crate
//!
//! - `pgsale-postgres` implements [`Executor`] over the PostgreSQL wire protocol.
//! - `pgsale` builds the upsert engine and entity composer on top of the codec
//!   and the [`TypeRegistry`].

pub mod codec;
pub mod error;
pub mod executor;
pub mod identifiers;
pub mod kind;
pub mod record;
pub mod types;
pub mod value;

pub use error::{
    ConnectionError, ConnectionErrorKind, Error, QueryError, QueryErrorKind, Result, Shape,
    ValidationError,
};
pub use executor::{ColumnInfo, Executor, QueryResult, Row};
pub use identifiers::{normalize_column_name, quote_ident};
pub use kind::SqlKind;
pub use record::Record;
pub use types::TypeRegistry;
pub use value::Value;
