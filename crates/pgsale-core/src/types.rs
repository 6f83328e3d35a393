//! Registry of base type names, keyed by type OID.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::executor::Executor;

/// Base types only: no composite row types, no array types.
pub const TYPE_CATALOG_QUERY: &str =
    "SELECT oid, typname FROM pg_type WHERE typrelid=0 AND typelem=0";

/// Type OID to catalog type name, loaded once per connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeRegistry {
    names: HashMap<u32, String>,
}

impl TypeRegistry {
    /// Read the base-type catalog through `executor`.
    pub fn load<E: Executor + ?Sized>(executor: &mut E) -> Result<Self> {
        let result = executor.query(TYPE_CATALOG_QUERY)?;
        let mut names = HashMap::with_capacity(result.row_count());
        for row in &result.rows {
            let (Some(oid), Some(name)) = (row.get(0), row.get(1)) else {
                return Err(Error::Protocol(
                    "type catalog row without oid or typname".to_string(),
                ));
            };
            let oid = oid
                .parse::<u32>()
                .map_err(|_| Error::Protocol(format!("invalid type oid {oid:?}")))?;
            names.insert(oid, name.to_string());
        }
        tracing::debug!(types = names.len(), "Loaded type registry");
        Ok(Self { names })
    }

    /// Name of the type with `oid`.
    pub fn name_of(&self, oid: u32) -> Option<&str> {
        self.names.get(&oid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<(u32, String)> for TypeRegistry {
    fn from_iter<I: IntoIterator<Item = (u32, String)>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}
