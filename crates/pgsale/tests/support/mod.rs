//! In-memory stand-in for a PostgreSQL server.
//!
//! [`MemoryDb`] understands exactly the statements the upsert engine and the
//! entity composer emit, and stores every value the way the server renders
//! it in text format (`t`/`f` for booleans, `None` for NULL).

#![allow(dead_code)]

use std::collections::BTreeMap;

use pgsale_core::types::TYPE_CATALOG_QUERY;
use pgsale_core::{
    ColumnInfo, Error, Executor, QueryError, QueryErrorKind, QueryResult, Result, Row,
};

pub mod oid {
    pub const BOOL: u32 = 16;
    pub const INT8: u32 = 20;
    pub const INT2: u32 = 21;
    pub const INT4: u32 = 23;
    pub const TEXT: u32 = 25;
    pub const FLOAT8: u32 = 701;
    pub const VARCHAR: u32 = 1043;
    pub const DATE: u32 = 1082;
    pub const TIMESTAMP: u32 = 1114;
    pub const NUMERIC: u32 = 1700;
}

const TYPE_NAMES: [(u32, &str); 10] = [
    (oid::BOOL, "bool"),
    (oid::INT8, "int8"),
    (oid::INT2, "int2"),
    (oid::INT4, "int4"),
    (oid::TEXT, "text"),
    (oid::FLOAT8, "float8"),
    (oid::VARCHAR, "varchar"),
    (oid::DATE, "date"),
    (oid::TIMESTAMP, "timestamp"),
    (oid::NUMERIC, "numeric"),
];

/// What `CURRENT_TIMESTAMP` evaluates to.
pub const NOW: &str = "2024-05-06 07:08:09.123456";

pub type StoredRow = BTreeMap<String, Option<String>>;

#[derive(Debug, Clone)]
struct Table {
    columns: Vec<(String, u32)>,
    rows: Vec<Vec<Option<String>>>,
    next_id: i64,
}

impl Table {
    fn position(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|(name, _)| name == column)
            .ok_or_else(|| {
                server_error(
                    "42703",
                    format!("column \"{column}\" does not exist"),
                )
            })
    }

    fn matches(&self, row: &[Option<String>], condition: &[(String, Option<String>)]) -> Result<bool> {
        for (column, expected) in condition {
            let index = self.position(column)?;
            // NULL never equals anything.
            if expected.is_none() || row[index] != *expected {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn result_columns(&self) -> Vec<ColumnInfo> {
        self.columns
            .iter()
            .map(|(name, oid)| ColumnInfo::new(name.clone(), *oid))
            .collect()
    }
}

/// A tiny table store driven by SQL text.
#[derive(Debug, Default)]
pub struct MemoryDb {
    tables: BTreeMap<String, Table>,
    /// Every statement received, in order
    pub statements: Vec<String>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Natures, categories, clients and contacts, with categories seeded for
    /// companies 1 and 2. The lowest category of company 1 has id 4.
    pub fn sales_schema() -> Self {
        let mut db = Self::new();
        let stamps = [("created_at", oid::TIMESTAMP), ("updated_at", oid::TIMESTAMP)];

        let mut natures = vec![
            ("id", oid::INT4),
            ("name", oid::VARCHAR),
            ("title", oid::VARCHAR),
            ("in_name", oid::BOOL),
            ("active", oid::BOOL),
            ("company_id", oid::INT4),
        ];
        natures.extend(stamps);
        db.create_table("entity_natures", &natures);

        let mut categories = vec![
            ("id", oid::INT4),
            ("name", oid::VARCHAR),
            ("company_id", oid::INT4),
        ];
        categories.extend(stamps);
        db.create_table("entity_categories", &categories);

        let mut entities = vec![
            ("id", oid::INT4),
            ("code", oid::VARCHAR),
            ("external_id", oid::VARCHAR),
            ("last_name", oid::VARCHAR),
            ("first_name", oid::VARCHAR),
            ("full_name", oid::VARCHAR),
            ("language", oid::VARCHAR),
            ("born_on", oid::DATE),
            ("reduction_rate", oid::NUMERIC),
            ("active", oid::BOOL),
            ("nature_id", oid::INT4),
            ("category_id", oid::INT4),
            ("company_id", oid::INT4),
        ];
        entities.extend(stamps);
        db.create_table("entities", &entities);

        let mut contacts = vec![
            ("id", oid::INT4),
            ("entity_id", oid::INT4),
            ("by_default", oid::BOOL),
            ("email", oid::VARCHAR),
            ("phone", oid::VARCHAR),
            ("line_6", oid::VARCHAR),
            ("company_id", oid::INT4),
        ];
        contacts.extend(stamps);
        db.create_table("contacts", &contacts);

        db.insert_row(
            "entity_categories",
            &[("id", "7"), ("name", "Others"), ("company_id", "1")],
        );
        db.insert_row(
            "entity_categories",
            &[("id", "4"), ("name", "Default"), ("company_id", "1")],
        );
        db.insert_row(
            "entity_categories",
            &[("id", "2"), ("name", "Default"), ("company_id", "2")],
        );
        db
    }

    pub fn create_table(&mut self, name: &str, columns: &[(&str, u32)]) {
        self.tables.insert(
            name.to_string(),
            Table {
                columns: columns
                    .iter()
                    .map(|(n, oid)| ((*n).to_string(), *oid))
                    .collect(),
                rows: Vec::new(),
                next_id: 1,
            },
        );
    }

    /// Seed a row directly, bypassing SQL. Returns its id.
    pub fn insert_row(&mut self, table: &str, values: &[(&str, &str)]) -> i64 {
        let table = self.tables.get_mut(table).expect("table exists");
        let mut row = vec![None; table.columns.len()];
        for (column, value) in values {
            let index = table.position(column).expect("column exists");
            row[index] = Some((*value).to_string());
        }
        let id_index = table.position("id").expect("id column");
        let id = match &row[id_index] {
            Some(id) => id.parse::<i64>().expect("numeric id"),
            None => {
                let id = table.next_id;
                row[id_index] = Some(id.to_string());
                id
            }
        };
        table.next_id = table.next_id.max(id + 1);
        table.rows.push(row);
        id
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    /// All rows of `table` as column maps.
    pub fn rows(&self, table: &str) -> Vec<StoredRow> {
        let Some(table) = self.tables.get(table) else {
            return Vec::new();
        };
        table
            .rows
            .iter()
            .map(|row| {
                table
                    .columns
                    .iter()
                    .map(|(name, _)| name.clone())
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    /// The stored text of `column` in the row of `table` with `id`.
    pub fn cell(&self, table: &str, id: i64, column: &str) -> Option<String> {
        let id = id.to_string();
        self.rows(table)
            .into_iter()
            .find(|row| row.get("id").cloned().flatten().as_deref() == Some(id.as_str()))
            .and_then(|row| row.get(column).cloned().flatten())
    }

    /// Statements that start with `prefix`.
    pub fn statements_starting_with(&self, prefix: &str) -> Vec<&str> {
        self.statements
            .iter()
            .filter(|s| s.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    fn table(&self, name: &str) -> Result<&Table> {
        self.tables.get(name).ok_or_else(|| {
            server_error("42P01", format!("relation \"{name}\" does not exist"))
        })
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables.get_mut(name).ok_or_else(|| {
            server_error("42P01", format!("relation \"{name}\" does not exist"))
        })
    }

    fn catalog(&self) -> QueryResult {
        QueryResult {
            columns: vec![ColumnInfo::new("oid", 26), ColumnInfo::new("typname", 19)],
            rows: TYPE_NAMES
                .iter()
                .map(|(oid, name)| Row::new(vec![Some(oid.to_string()), Some((*name).to_string())]))
                .collect(),
            command_tag: Some(format!("SELECT {}", TYPE_NAMES.len())),
        }
    }

    fn select(&self, p: &mut Parser) -> Result<QueryResult> {
        let projection = if p.eat_punct('*') {
            None
        } else {
            Some(p.ident()?)
        };
        p.keyword("FROM")?;
        let table = self.table(&p.ident()?)?;

        let mut rows: Vec<&Vec<Option<String>>> = Vec::new();
        if p.eat_keyword("LIMIT") {
            let limit: usize = p.word()?.parse().map_err(|_| syntax("LIMIT"))?;
            rows.extend(table.rows.iter().take(limit));
        } else {
            p.keyword("WHERE")?;
            let condition = p.condition()?;
            for row in &table.rows {
                if table.matches(row, &condition)? {
                    rows.push(row);
                }
            }
            if p.eat_keyword("ORDER") {
                p.keyword("BY")?;
                let index = table.position(&p.ident()?)?;
                rows.sort_by_key(|row| {
                    row[index]
                        .as_deref()
                        .and_then(|v| v.parse::<i64>().ok())
                        .unwrap_or(i64::MAX)
                });
            }
        }
        p.end()?;

        let (columns, rows) = match projection {
            None => (
                table.result_columns(),
                rows.into_iter().map(|r| Row::new(r.clone())).collect::<Vec<_>>(),
            ),
            Some(column) => {
                let index = table.position(&column)?;
                (
                    vec![ColumnInfo::new(column, table.columns[index].1)],
                    rows.into_iter()
                        .map(|r| Row::new(vec![r[index].clone()]))
                        .collect(),
                )
            }
        };
        let tag = format!("SELECT {}", rows.len());
        Ok(QueryResult {
            columns,
            rows,
            command_tag: Some(tag),
        })
    }

    fn update(&mut self, p: &mut Parser) -> Result<QueryResult> {
        let name = p.ident()?;
        p.keyword("SET")?;
        let mut assignments = vec![p.assignment()?];
        while p.eat_punct(',') {
            assignments.push(p.assignment()?);
        }
        p.keyword("WHERE")?;
        let condition = p.condition()?;
        p.end()?;

        let table = self.table_mut(&name)?;
        let targets = assignments
            .into_iter()
            .map(|(column, value)| Ok((table.position(&column)?, value)))
            .collect::<Result<Vec<_>>>()?;
        let mut updated = 0;
        for i in 0..table.rows.len() {
            if table.matches(&table.rows[i], &condition)? {
                for (index, value) in &targets {
                    table.rows[i][*index].clone_from(value);
                }
                updated += 1;
            }
        }
        Ok(QueryResult {
            command_tag: Some(format!("UPDATE {updated}")),
            ..QueryResult::default()
        })
    }

    fn insert(&mut self, p: &mut Parser) -> Result<QueryResult> {
        p.keyword("INTO")?;
        let name = p.ident()?;
        p.punct('(')?;
        let mut columns = vec![p.ident()?];
        while p.eat_punct(',') {
            columns.push(p.ident()?);
        }
        p.punct(')')?;
        p.keyword("VALUES")?;
        p.punct('(')?;
        let mut values = vec![p.literal()?];
        while p.eat_punct(',') {
            values.push(p.literal()?);
        }
        p.punct(')')?;
        p.keyword("RETURNING")?;
        let returning = p.ident()?;
        p.end()?;
        if columns.len() != values.len() {
            return Err(syntax("INSERT has more target columns than expressions"));
        }

        let table = self.table_mut(&name)?;
        let mut row = vec![None; table.columns.len()];
        for (column, value) in columns.iter().zip(values) {
            row[table.position(column)?] = value;
        }
        let id_index = table.position("id")?;
        if row[id_index].is_none() {
            row[id_index] = Some(table.next_id.to_string());
            table.next_id += 1;
        }
        let returned = table.position(&returning)?;
        let result_row = Row::new(vec![row[returned].clone()]);
        let oid = table.columns[returned].1;
        table.rows.push(row);

        Ok(QueryResult {
            columns: vec![ColumnInfo::new(returning, oid)],
            rows: vec![result_row],
            command_tag: Some("INSERT 0 1".to_string()),
        })
    }
}

impl Executor for MemoryDb {
    fn query(&mut self, sql: &str) -> Result<QueryResult> {
        self.statements.push(sql.to_string());
        if sql == TYPE_CATALOG_QUERY {
            return Ok(self.catalog());
        }

        let mut p = Parser::new(sql)?;
        let result = match p.word()?.to_ascii_uppercase().as_str() {
            "SELECT" => self.select(&mut p),
            "UPDATE" => self.update(&mut p),
            "INSERT" => self.insert(&mut p),
            other => Err(syntax(other)),
        };
        result.map_err(|e| match e {
            Error::Query(q) => Error::Query(q.with_sql(sql)),
            other => other,
        })
    }
}

// ==================== SQL subset parser ====================

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Word(String),
    Punct(char),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(sql: &str) -> Result<Self> {
        Ok(Self {
            tokens: tokenize(sql)?,
            pos: 0,
        })
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn word(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Word(w)) => Ok(w),
            other => Err(syntax(&format!("expected word, got {other:?}"))),
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(syntax(&format!("expected quoted identifier, got {other:?}"))),
        }
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(syntax(&format!("expected {keyword}, got {:?}", self.peek())))
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn punct(&mut self, c: char) -> Result<()> {
        if self.eat_punct(c) {
            Ok(())
        } else {
            Err(syntax(&format!("expected '{c}', got {:?}", self.peek())))
        }
    }

    fn eat_punct(&mut self, c: char) -> bool {
        if self.peek() == Some(&Token::Punct(c)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn end(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(syntax(&format!("unexpected trailing {token:?}"))),
        }
    }

    /// A literal as the server would store it.
    fn literal(&mut self) -> Result<Option<String>> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Some(s)),
            Some(Token::Word(w)) => match w.to_ascii_uppercase().as_str() {
                "NULL" => Ok(None),
                "TRUE" => Ok(Some("t".to_string())),
                "FALSE" => Ok(Some("f".to_string())),
                "CURRENT_TIMESTAMP" => Ok(Some(NOW.to_string())),
                _ if w.parse::<f64>().is_ok() => Ok(Some(w)),
                _ => Err(syntax(&format!("invalid literal {w}"))),
            },
            other => Err(syntax(&format!("expected literal, got {other:?}"))),
        }
    }

    fn assignment(&mut self) -> Result<(String, Option<String>)> {
        let column = self.ident()?;
        self.punct('=')?;
        Ok((column, self.literal()?))
    }

    fn condition(&mut self) -> Result<Vec<(String, Option<String>)>> {
        let mut terms = vec![self.assignment()?];
        while self.eat_keyword("AND") {
            terms.push(self.assignment()?);
        }
        Ok(terms)
    }
}

fn tokenize(sql: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = sql.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            if chars.peek() == Some(&c) {
                                chars.next();
                                text.push(c);
                            } else {
                                break;
                            }
                        }
                        Some(other) => text.push(other),
                        None => return Err(syntax("unterminated quote")),
                    }
                }
                tokens.push(if c == '"' {
                    Token::Ident(text)
                } else {
                    Token::Str(text)
                });
            }
            '=' | ',' | '(' | ')' | '*' => {
                chars.next();
                tokens.push(Token::Punct(c));
            }
            _ => {
                let mut word = String::new();
                while let Some(&w) = chars.peek() {
                    if w.is_whitespace() || "=,()*\"'".contains(w) {
                        break;
                    }
                    word.push(w);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }
    Ok(tokens)
}

fn server_error(sqlstate: &str, message: String) -> Error {
    let mut err = QueryError::new(QueryErrorKind::from_sqlstate(sqlstate), message);
    err.sqlstate = Some(sqlstate.to_string());
    Error::Query(err)
}

fn syntax(message: &str) -> Error {
    server_error("42601", format!("syntax error: {message}"))
}
