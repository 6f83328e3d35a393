//! Semantic column kinds.

use std::fmt;

use crate::error::{Error, Result};

/// The abstract value category that drives coercion, independent of the
/// catalog's concrete type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlKind {
    /// `bool`
    Bool,
    /// `int2`
    SmallInt,
    /// `int4`
    Int,
    /// `int8`
    BigInt,
    /// `numeric`
    Numeric,
    /// `float4`
    Real,
    /// `float8`
    Double,
    /// `date`
    Date,
    /// `timestamp` (without time zone)
    Timestamp,
    /// `varchar`, `text`, `bpchar`
    Text,
}

impl SqlKind {
    /// Map a catalog type name to its kind, if the codec supports it.
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "bool" => SqlKind::Bool,
            "int2" => SqlKind::SmallInt,
            "int4" => SqlKind::Int,
            "int8" => SqlKind::BigInt,
            "numeric" => SqlKind::Numeric,
            "float4" => SqlKind::Real,
            "float8" => SqlKind::Double,
            "date" => SqlKind::Date,
            "timestamp" | "time_stamp" => SqlKind::Timestamp,
            "varchar" | "string" | "text" | "bpchar" => SqlKind::Text,
            _ => return None,
        };
        Some(kind)
    }

    /// Resolve a column's type name, failing with [`Error::UnknownType`].
    ///
    /// `None` means the type OID was not present in the registry.
    pub fn resolve(type_name: Option<&str>) -> Result<Self> {
        type_name
            .and_then(Self::from_type_name)
            .ok_or_else(|| Error::UnknownType(type_name.map(str::to_string)))
    }

    /// Stable lowercase name used in logs and errors.
    pub const fn as_str(self) -> &'static str {
        match self {
            SqlKind::Bool => "bool",
            SqlKind::SmallInt => "smallint",
            SqlKind::Int => "integer",
            SqlKind::BigInt => "bigint",
            SqlKind::Numeric => "numeric",
            SqlKind::Real => "real",
            SqlKind::Double => "double",
            SqlKind::Date => "date",
            SqlKind::Timestamp => "timestamp",
            SqlKind::Text => "text",
        }
    }
}

impl fmt::Display for SqlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
