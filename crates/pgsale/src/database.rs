//! Database session: an executor plus the type registry loaded for it.

use std::collections::HashMap;

use pgsale_core::{
    Error, Executor, QueryResult, Record, Result, SqlKind, TypeRegistry, codec,
    normalize_column_name,
};

/// What a result column is, as seen through the type registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Catalog type name, `None` when the OID is not a registered base type
    pub type_name: Option<String>,
    /// Column name exactly as the server reported it
    pub name: String,
    /// Position in the result
    pub index: usize,
}

impl ColumnDescriptor {
    /// The codec kind for this column.
    pub fn kind(&self) -> Result<SqlKind> {
        SqlKind::resolve(self.type_name.as_deref())
    }
}

/// Result columns keyed by normalized column name.
pub type Columns = HashMap<String, ColumnDescriptor>;

/// A connection with its type registry.
///
/// Column descriptors are rebuilt on every [`Database::select`]; only the
/// registry is loaded once.
#[derive(Debug)]
pub struct Database<E> {
    executor: E,
    types: TypeRegistry,
}

impl<E: Executor> Database<E> {
    /// Wrap `executor`, loading the type registry through it.
    pub fn open(mut executor: E) -> Result<Self> {
        let types = TypeRegistry::load(&mut executor)?;
        Ok(Self { executor, types })
    }

    pub fn into_inner(self) -> E {
        self.executor
    }

    /// Run `sql` and describe its result columns.
    pub fn select(&mut self, sql: &str) -> Result<(QueryResult, Columns)> {
        let result = self.exec(sql)?;
        let columns = describe(&self.types, &result);
        Ok((result, columns))
    }

    /// Run `sql` for its effect or its rows.
    pub fn exec(&mut self, sql: &str) -> Result<QueryResult> {
        tracing::debug!(sql, "SQL");
        self.executor.query(sql)
    }
}

/// Build descriptors for the columns of `result`. Later duplicates of a
/// normalized name win.
pub fn describe(types: &TypeRegistry, result: &QueryResult) -> Columns {
    result
        .columns
        .iter()
        .enumerate()
        .map(|(index, column)| {
            (
                normalize_column_name(&column.name),
                ColumnDescriptor {
                    type_name: types.name_of(column.type_oid).map(str::to_string),
                    name: column.name.clone(),
                    index,
                },
            )
        })
        .collect()
}

/// Decode row `row` of `result` into a [`Record`], taking each column's kind
/// from `columns`.
pub fn decode_row(
    table: &str,
    result: &QueryResult,
    row: usize,
    columns: &Columns,
) -> Result<Record> {
    let Some(data) = result.rows.get(row) else {
        return Err(Error::NotFound(format!("row {row} of {table}")));
    };
    let mut record = Record::new();
    for (index, column) in result.columns.iter().enumerate() {
        let key = normalize_column_name(&column.name);
        let descriptor = columns.get(&key).ok_or_else(|| Error::UnknownColumn {
            table: table.to_string(),
            column: key.clone(),
        })?;
        let value = codec::unquote(data.get(index), descriptor.kind()?)?;
        record.insert(key, value);
    }
    Ok(record)
}
