//! Identifier handling for column and table names.

use std::sync::OnceLock;

use regex::Regex;

fn non_word() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new(r"[^0-9A-Za-z_]").expect("static pattern compiles"))
}

/// Turn a column name into the key used by column descriptors and records.
///
/// Every character outside `[0-9A-Za-z_]` becomes `_`, so `"unit price"` is
/// addressed as `unit_price`.
pub fn normalize_column_name(name: &str) -> String {
    non_word().replace_all(name, "_").into_owned()
}

/// Quote an identifier for PostgreSQL, doubling embedded double quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
