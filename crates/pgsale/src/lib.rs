//! Find-or-create a sales client from the command line.
//!
//! `pgsale` takes `key.sub=value` tokens, upserts the client they describe
//! together with its nature and default contact, and opens the sales order
//! page for that client.
//!
//! # Layers
//!
//! - [`args`] decodes tokens into a nested [`ArgMap`], [`cli`] validates it
//!   into an [`Invocation`].
//! - [`config`] reads the YAML connection settings.
//! - [`database`] pairs an [`Executor`] with its type registry;
//!   [`upsert`] adds the generic [`Database::get`] and [`composer`] the
//!   client workflow [`Database::upsert_entity`] on top of it.
//! - [`browser`] launches the order page.
//!
//! The upsert machinery only needs an [`Executor`], so everything below
//! [`run`] can be driven by something other than a live server.

pub mod args;
pub mod browser;
pub mod cli;
pub mod composer;
pub mod config;
pub mod database;
pub mod upsert;

pub use args::{ArgMap, ArgValue};
pub use cli::Invocation;
pub use database::{ColumnDescriptor, Columns, Database};
pub use pgsale_core::{Error, Executor, Record, Result, Value};

use pgsale_postgres::PgConnection;

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The stored client row
    pub client: Record,
    /// Sales order page for the client
    pub url: String,
}

/// Connect with the configured settings and run `invocation`.
pub fn run(invocation: &Invocation) -> Result<Outcome> {
    let settings = config::load(&invocation.dbconf, &invocation.env)?;
    let connection = PgConnection::connect(settings.to_pg_config())?;
    let (outcome, connection) = execute(invocation, connection)?;
    if let Err(e) = connection.close() {
        tracing::warn!(error = %e, "Closing the connection failed");
    }
    Ok(outcome)
}

/// Run `invocation` against `executor`, handing the executor back.
pub fn execute<E: Executor>(invocation: &Invocation, executor: E) -> Result<(Outcome, E)> {
    let mut db = Database::open(executor)?;
    let client = db.upsert_entity(
        &invocation.uid,
        &invocation.uid_value,
        invocation.client.clone(),
    )?;

    let url = invocation.order_url(client.get_or_null("id"));
    tracing::debug!(url = %url, "URL");
    if invocation.open_browser {
        browser::open(&url);
    }
    Ok((Outcome { client, url }, db.into_inner()))
}
