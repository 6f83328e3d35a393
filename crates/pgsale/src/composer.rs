//! Get-or-create a client with its nature and default contact.

use std::collections::BTreeMap;

use pgsale_core::{Error, Executor, Record, Result, Shape, ValidationError, quote_ident};

use crate::args::ArgMap;
use crate::database::Database;

pub const NATURES: &str = "entity_natures";
pub const CATEGORIES: &str = "entity_categories";
pub const ENTITIES: &str = "entities";
pub const CONTACTS: &str = "contacts";

/// Language given to new clients that do not name one.
pub const DEFAULT_LANGUAGE: &str = "fra";

impl<E: Executor> Database<E> {
    /// Upsert the client described by `entity`, identified by
    /// `uid_column = uid_value` within its company.
    ///
    /// `entity` carries `nature.*` and `contact.*` sub-maps. The nature is
    /// upserted first, then the client, then its default contact. Returns the
    /// stored client row.
    #[tracing::instrument(level = "debug", skip(self, entity))]
    pub fn upsert_entity(
        &mut self,
        uid_column: &str,
        uid_value: &str,
        mut entity: ArgMap,
    ) -> Result<Record> {
        let contact = entity
            .take_map("contact", "Needs 'client.contact.YYY=XXX' parameters")?
            .into_columns()?;
        let nature = entity
            .take_map("nature", "Needs 'client.nature.YYY=XXX' parameters")?
            .into_columns()?;
        let mut entity = entity.into_columns()?;

        let company_id = required(&entity, "company_id", "Needs 'client.company_id=XXX' parameter")?
            .to_string();
        let nature = self.upsert_nature(nature, &company_id)?;

        entity.insert("nature_id".to_string(), id_text(&nature, NATURES)?);
        entity
            .entry("language".to_string())
            .or_insert_with(|| DEFAULT_LANGUAGE.to_string());
        if !entity.contains_key("category_id") {
            let category_id = self.default_category(&company_id)?;
            entity.insert("category_id".to_string(), category_id);
        }
        entity.insert("full_name".to_string(), full_name(&entity, &nature));

        let search = BTreeMap::from([
            (uid_column.to_string(), uid_value.to_string()),
            ("company_id".to_string(), company_id),
        ]);
        let client = self.get(ENTITIES, &search, &entity)?;

        let mut contact = contact;
        contact.insert(
            "company_id".to_string(),
            client.get_or_null("company_id").to_text(),
        );
        let search = BTreeMap::from([
            ("entity_id".to_string(), id_text(&client, ENTITIES)?),
            ("by_default".to_string(), "true".to_string()),
        ]);
        let default_contact = self.get(CONTACTS, &search, &contact)?;

        tracing::info!(
            client_id = %client.get_or_null("id"),
            nature_id = %nature.get_or_null("id"),
            contact_id = %default_contact.get_or_null("id"),
            "Client ready"
        );
        Ok(client)
    }

    fn upsert_nature(
        &mut self,
        mut nature: BTreeMap<String, String>,
        company_id: &str,
    ) -> Result<Record> {
        let name = required(&nature, "name", "Needs 'client.nature.name=XXX' parameter")?
            .to_string();
        nature
            .entry("title".to_string())
            .or_insert_with(|| name.clone());
        let search = BTreeMap::from([
            ("name".to_string(), name),
            ("company_id".to_string(), company_id.to_string()),
        ]);
        self.get(NATURES, &search, &nature)
    }

    /// Lowest category id of the company.
    fn default_category(&mut self, company_id: &str) -> Result<String> {
        let company: i64 = company_id.trim().parse().map_err(|_| {
            Error::InvalidRequest(format!("company_id must be an integer, got {company_id:?}"))
        })?;
        let id = quote_ident("id");
        let result = self.exec(&format!(
            "SELECT {id} FROM {} WHERE {}={company} ORDER BY {id}",
            quote_ident(CATEGORIES),
            quote_ident("company_id"),
        ))?;
        result
            .value(0, 0)
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound(format!("no {CATEGORIES} row for company {company}")))
    }
}

/// `last_name first_name`, prefixed by the nature title unless the nature
/// says the title is already part of the name.
fn full_name(entity: &BTreeMap<String, String>, nature: &Record) -> String {
    let field = |key: &str| entity.get(key).map_or("", String::as_str);
    let name = format!("{} {}", field("last_name"), field("first_name"))
        .trim()
        .to_string();
    if nature.get_or_null("in_name").is_truthy() {
        name
    } else {
        format!("{} {name}", nature.get_or_null("title"))
            .trim()
            .to_string()
    }
}

fn required<'a>(
    columns: &'a BTreeMap<String, String>,
    key: &str,
    message: &str,
) -> Result<&'a str> {
    columns.get(key).map(String::as_str).ok_or_else(|| {
        Error::Validation(ValidationError::new(message, Shape::Value, Shape::Missing))
    })
}

/// The record's id as CLI text.
fn id_text(record: &Record, table: &str) -> Result<String> {
    record
        .id()
        .map(pgsale_core::Value::to_text)
        .ok_or_else(|| Error::NotFound(format!("{table} row without id")))
}
