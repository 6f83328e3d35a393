//! Schema-introspecting find-or-create.
//!
//! [`Database::get`] knows nothing about any particular table. It asks the
//! server what columns the table has, quotes every value for its column's
//! kind, updates the first row matching the search columns or inserts a new
//! one, and hands back the stored row decoded into a [`Record`].
//!
//! The lookup and the write are separate statements. Two concurrent runs
//! against the same search key can both insert.

use std::collections::BTreeMap;

use pgsale_core::{Error, Executor, Record, Result, codec, quote_ident};

use crate::database::{ColumnDescriptor, Columns, Database, decode_row};

const ID: &str = "id";

impl<E: Executor> Database<E> {
    /// Find the row of `table` matching `search` and write `search` and
    /// `attributes` to it, inserting it when no row matches.
    ///
    /// On a key present in both maps the `attributes` value is written while
    /// the lookup uses the `search` value.
    #[tracing::instrument(level = "debug", skip(self, search, attributes))]
    pub fn get(
        &mut self,
        table: &str,
        search: &BTreeMap<String, String>,
        attributes: &BTreeMap<String, String>,
    ) -> Result<Record> {
        if search.is_empty() {
            return Err(Error::InvalidRequest(format!(
                "no search columns given for {table}"
            )));
        }
        let table_ident = quote_ident(table);

        let (_, columns) = self.select(&format!("SELECT * FROM {table_ident} LIMIT 0"))?;

        let mut values = search.clone();
        values.extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        for key in values.keys() {
            column(&columns, table, key)?;
        }

        let condition = search
            .iter()
            .map(|(key, value)| assignment(&columns, table, key, value))
            .collect::<Result<Vec<_>>>()?
            .join(" AND ");

        let found = self.exec(&format!(
            "SELECT {} FROM {table_ident} WHERE {condition}",
            quote_ident(ID)
        ))?;

        let id = if found.row_count() > 0 {
            let id = found
                .value(0, 0)
                .ok_or_else(|| Error::NotFound(format!("{table} row without {ID}")))?
                .to_string();
            let set = values
                .iter()
                .map(|(key, value)| assignment(&columns, table, key, value))
                .collect::<Result<Vec<_>>>()?
                .join(", ");
            let updated = self.exec(&format!(
                "UPDATE {table_ident} SET {set}, {}=CURRENT_TIMESTAMP WHERE {condition}",
                quote_ident("updated_at")
            ))?;
            tracing::debug!(table, id = %id, rows = ?updated.rows_affected(), "Updated");
            id
        } else {
            let mut names = Vec::with_capacity(values.len() + 2);
            let mut literals = Vec::with_capacity(values.len() + 2);
            for (key, value) in &values {
                let descriptor = column(&columns, table, key)?;
                names.push(quote_ident(&descriptor.name));
                literals.push(codec::quote(value, descriptor.kind()?));
            }
            names.push(quote_ident("created_at"));
            names.push(quote_ident("updated_at"));
            literals.push("CURRENT_TIMESTAMP".to_string());
            literals.push("CURRENT_TIMESTAMP".to_string());

            let inserted = self.exec(&format!(
                "INSERT INTO {table_ident} ({}) VALUES ({}) RETURNING {}",
                names.join(", "),
                literals.join(", "),
                quote_ident(ID)
            ))?;
            let id = inserted
                .value(0, 0)
                .ok_or_else(|| Error::Protocol(format!("INSERT INTO {table} returned no {ID}")))?
                .to_string();
            tracing::debug!(table, id = %id, "Inserted");
            id
        };

        let fetched = self.exec(&format!(
            "SELECT * FROM {table_ident} WHERE {}",
            assignment(&columns, table, ID, &id)?
        ))?;
        if fetched.row_count() == 0 {
            return Err(Error::NotFound(format!("{table} row with {ID}={id}")));
        }
        decode_row(table, &fetched, 0, &columns)
    }
}

fn column<'a>(columns: &'a Columns, table: &str, key: &str) -> Result<&'a ColumnDescriptor> {
    columns.get(key).ok_or_else(|| Error::UnknownColumn {
        table: table.to_string(),
        column: key.to_string(),
    })
}

/// `"column"=<literal>`, quoted for the column's kind.
fn assignment(columns: &Columns, table: &str, key: &str, value: &str) -> Result<String> {
    let descriptor = column(columns, table, key)?;
    Ok(format!(
        "{}={}",
        quote_ident(&descriptor.name),
        codec::quote(value, descriptor.kind()?)
    ))
}
