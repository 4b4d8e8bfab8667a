//! CREATE TABLE script parser
//!
//! A structural extractor, not a SQL validator: it recovers the table name
//! and a flat column list (name, type text, NOT NULL flag) from a
//! `CREATE TABLE` script so the applier can diff it against the live table.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::schema::sqlgen::unquote_ident;
use crate::schema::types::{ColumnDef, TableDef};

static CREATE_TABLE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)CREATE\s+TABLE\s+("(?:[^"]|"")*"|[A-Za-z0-9_]+)\s*\("#)
        .expect("static header pattern")
});

fn malformed(file: &Path, reason: &str) -> Error {
    Error::MalformedScript {
        file: file.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Parse a `CREATE TABLE` script into a [`TableDef`].
///
/// The column list runs from the `(` after the table name to the closing
/// parenthesis nearest the end of the text (a trailing `;` is tolerated).
/// Each non-blank line contributes one column: the first whitespace-delimited
/// or double-quoted token is the column name, the remainder is the type
/// clause, with a trailing case-insensitive `NOT NULL` stripped into a flag.
pub fn parse_create_table(sql: &str, file: &Path) -> Result<TableDef> {
    let caps = CREATE_TABLE_HEADER
        .captures(sql)
        .ok_or_else(|| malformed(file, "not a CREATE TABLE script in expected format"))?;

    let name = caps
        .get(1)
        .map(|m| unquote_ident(m.as_str()))
        .ok_or_else(|| malformed(file, "missing table name"))?;
    let header_end = caps
        .get(0)
        .map(|m| m.end())
        .ok_or_else(|| malformed(file, "missing table header"))?;

    let end = sql
        .rfind(");")
        .filter(|&e| e >= header_end)
        .or_else(|| sql.rfind(')').filter(|&e| e >= header_end))
        .ok_or_else(|| malformed(file, "could not find the end of the column list"))?;

    let mut columns = Vec::new();
    for raw in sql[header_end..end].split(['\r', '\n']) {
        let line = raw.trim().trim_end_matches(',');
        if line.trim().is_empty() {
            continue;
        }

        let (token, remainder) = split_first_token(line);
        let remainder = remainder.trim();
        let (sql_type, not_null) = strip_not_null(remainder);

        columns.push(ColumnDef {
            name: unquote_ident(token),
            sql_type: sql_type.to_string(),
            not_null,
        });
    }

    Ok(TableDef { name, columns })
}

/// Split off the first token of a column line. Handles quoted identifiers,
/// honoring `""` as an escaped quote.
fn split_first_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    if s.starts_with('"') {
        let bytes = s.as_bytes();
        let mut i = 1;
        while i < bytes.len() {
            if bytes[i] == b'"' {
                if i + 1 < bytes.len() && bytes[i + 1] == b'"' {
                    i += 2;
                    continue;
                }
                i += 1;
                break;
            }
            i += 1;
        }
        (&s[..i], &s[i..])
    } else {
        match s.find(char::is_whitespace) {
            Some(idx) => (&s[..idx], &s[idx..]),
            None => (s, ""),
        }
    }
}

/// Detect and strip a trailing `NOT NULL`, case-insensitively.
fn strip_not_null(type_clause: &str) -> (&str, bool) {
    const SUFFIX: &str = "NOT NULL";
    if type_clause.to_ascii_uppercase().ends_with(SUFFIX) {
        let cut = type_clause.len() - SUFFIX.len();
        (type_clause[..cut].trim_end(), true)
    } else {
        (type_clause, false)
    }
}
