//! Type definitions for schema objects
//!
//! These are the shapes shared by the apply and export directions: scripts
//! read from disk, transient parse results, and typed catalog metadata.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// The kinds of schema object the engine knows how to apply and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScriptKind {
    Domain,
    Table,
    Procedure,
}

impl ScriptKind {
    /// Folder name holding scripts of this kind under a scripts root.
    pub fn folder(&self) -> &'static str {
        match self {
            ScriptKind::Domain => "domains",
            ScriptKind::Table => "tables",
            ScriptKind::Procedure => "procedures",
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ScriptKind::Domain => "domain",
            ScriptKind::Table => "table",
            ScriptKind::Procedure => "procedure",
        };
        f.write_str(label)
    }
}

/// A SQL script read from the script source. The object name is the file
/// stem; identity is `(kind, name)`, compared case-insensitively.
#[derive(Debug, Clone)]
pub struct ScriptObject {
    pub kind: ScriptKind,
    pub name: String,
    pub path: PathBuf,
    pub text: String,
}

/// One column extracted from a `CREATE TABLE` script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
    pub not_null: bool,
}

/// A parsed `CREATE TABLE` script: table name plus columns in declaration
/// order. Used only transiently while diffing against the live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

/// A field definition (domain) row from the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainMeta {
    pub name: String,
    pub field_type: i32,
    pub length: i32,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

/// A table column row from the catalog, in field-position order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    pub name: String,
    pub field_source: String,
    pub not_null: bool,
    pub field_type: i32,
    pub length: i32,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

/// Whether a procedure parameter is an input or an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDirection {
    Input,
    Output,
}

/// A procedure parameter row from the catalog, in parameter-number order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcParam {
    pub name: String,
    pub field_source: String,
    pub direction: ParamDirection,
    pub field_type: i32,
    pub length: i32,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

/// A procedure row from the catalog. `source` is the stored body text, when
/// the database kept one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcMeta {
    pub name: String,
    pub source: Option<String>,
}
