//! The query executor contract.
//!
//! Drivers hand back rows exactly as the server rendered them in text format,
//! together with each column's type OID. Interpreting that text is the job of
//! [`crate::codec`], not of the driver.

use crate::error::Result;

/// Name and type of one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name as reported by the server
    pub name: String,
    /// OID of the column's data type
    pub type_oid: u32,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_oid: u32) -> Self {
        Self {
            name: name.into(),
            type_oid,
        }
    }
}

/// One data row in text format. `None` is SQL NULL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: Vec<Option<String>>,
}

impl Row {
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self { values }
    }

    /// Text of the field at `index`, `None` for NULL or out of range.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over the raw field texts.
    pub fn iter(&self) -> impl Iterator<Item = Option<&str>> {
        self.values.iter().map(|v| v.as_deref())
    }
}

/// Everything a single statement produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    /// Result columns; empty for statements without a row description
    pub columns: Vec<ColumnInfo>,
    /// Data rows in server order
    pub rows: Vec<Row>,
    /// Command tag, e.g. `INSERT 0 1`
    pub command_tag: Option<String>,
}

impl QueryResult {
    /// Number of rows returned.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Text of the field at (`row`, `column`).
    pub fn value(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// Rows affected, parsed from the trailing number of the command tag.
    pub fn rows_affected(&self) -> Option<u64> {
        self.command_tag
            .as_deref()?
            .split_whitespace()
            .last()
            .and_then(|n| n.parse().ok())
    }
}

/// The single capability the upsert machinery needs from a database driver.
///
/// Statements are complete SQL text; literals have already been rendered by
/// the codec. Execution is blocking and strictly sequential.
pub trait Executor {
    /// Run one statement and collect its result.
    fn query(&mut self, sql: &str) -> Result<QueryResult>;
}

impl<E: Executor + ?Sized> Executor for &mut E {
    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        (**self).query(sql)
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        (**self).query(sql)
    }
}
