//! In-memory session for unit tests
//!
//! Answers the engine's catalog queries from plain collections and records
//! every executed statement. Failures can be forced per statement substring
//! to exercise the deferral and stall paths.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::db::session::{SqlSession, TextRow};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub(crate) struct FakeDomain {
    pub name: String,
    pub field_type: i32,
    pub length: i32,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeColumn {
    pub name: String,
    pub field_source: String,
    pub not_null: bool,
    pub field_type: i32,
    pub length: i32,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeParam {
    pub name: String,
    pub direction: i32,
    pub number: i32,
    pub field_source: String,
    pub field_type: i32,
    pub length: i32,
    pub precision: Option<i32>,
    pub scale: Option<i32>,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeProc {
    pub name: String,
    pub source: Option<String>,
    pub params: Vec<FakeParam>,
}

#[derive(Debug, Default)]
pub(crate) struct FakeSession {
    pub domains: Vec<FakeDomain>,
    pub tables: IndexMap<String, Vec<FakeColumn>>,
    pub procedures: Vec<FakeProc>,
    pub db_name: Option<String>,
    pub executed: Vec<String>,
    /// statement substring -> number of executions left to fail
    pub failures: HashMap<String, usize>,
}

impl FakeSession {
    pub fn add_domain(&mut self, name: &str, field_type: i32, length: i32) {
        self.domains.push(FakeDomain {
            name: name.to_string(),
            field_type,
            length,
            precision: None,
            scale: None,
        });
    }

    /// Register a table whose columns are simple VARCHAR(20) fields; tests
    /// that care about column metadata adjust the entries afterwards.
    pub fn add_table(&mut self, name: &str, columns: &[&str]) {
        let columns = columns
            .iter()
            .map(|col| FakeColumn {
                name: col.to_string(),
                field_source: format!("RDB${}", col),
                not_null: false,
                field_type: 37,
                length: 20,
                precision: None,
                scale: None,
            })
            .collect();
        self.tables.insert(name.to_string(), columns);
    }

    pub fn add_procedure(&mut self, name: &str, source: Option<&str>) {
        self.procedures.push(FakeProc {
            name: name.to_string(),
            source: source.map(str::to_string),
            params: Vec::new(),
        });
    }

    pub fn add_proc_param(
        &mut self,
        procedure: &str,
        name: &str,
        direction: i32,
        field_source: &str,
        field_type: i32,
        length: i32,
    ) {
        let proc = self
            .procedures
            .iter_mut()
            .find(|p| p.name == procedure)
            .expect("procedure registered");
        let number = proc.params.len() as i32;
        proc.params.push(FakeParam {
            name: name.to_string(),
            direction,
            number,
            field_source: field_source.to_string(),
            field_type,
            length,
            precision: None,
            scale: None,
        });
    }

    pub fn fail_times(&mut self, statement_substring: &str, times: usize) {
        self.failures.insert(statement_substring.to_string(), times);
    }

    /// Executed statements minus the savepoint bracketing.
    pub fn executed_ddl(&self) -> Vec<&str> {
        self.executed
            .iter()
            .map(String::as_str)
            .filter(|sql| !sql.starts_with("SAVEPOINT") && !sql.starts_with("ROLLBACK TO"))
            .collect()
    }
}

fn cell(value: &str) -> Option<String> {
    Some(value.to_string())
}

fn int_cell(value: i32) -> Option<String> {
    Some(value.to_string())
}

fn opt_int_cell(value: Option<i32>) -> Option<String> {
    value.map(|v| v.to_string())
}

impl SqlSession for FakeSession {
    fn execute(&mut self, sql: &str) -> Result<()> {
        for (needle, left) in self.failures.iter_mut() {
            if *left > 0 && sql.contains(needle.as_str()) {
                *left -= 1;
                return Err(Error::Database(format!("forced failure executing: {sql}")));
            }
        }
        self.executed.push(sql.to_string());
        Ok(())
    }

    fn query(&mut self, sql: &str, params: &[&str], columns: usize) -> Result<Vec<TextRow>> {
        if sql.contains("rdb$relation_fields") {
            let table = params[0];
            let cols = self.tables.get(table).cloned().unwrap_or_default();
            if columns == 1 {
                return Ok(cols.iter().map(|c| vec![cell(&c.name)]).collect());
            }
            return Ok(cols
                .iter()
                .map(|c| {
                    vec![
                        cell(&c.name),
                        cell(&c.field_source),
                        int_cell(if c.not_null { 1 } else { 0 }),
                        int_cell(c.field_type),
                        int_cell(c.length),
                        opt_int_cell(c.precision),
                        opt_int_cell(c.scale),
                    ]
                })
                .collect());
        }

        if sql.contains("rdb$procedure_parameters") {
            let procedure = params[0];
            let mut rows: Vec<&FakeParam> = self
                .procedures
                .iter()
                .filter(|p| p.name == procedure)
                .flat_map(|p| p.params.iter())
                .collect();
            rows.sort_by_key(|p| (p.direction, p.number));
            return Ok(rows
                .into_iter()
                .map(|p| {
                    vec![
                        cell(&p.name),
                        int_cell(p.direction),
                        cell(&p.field_source),
                        int_cell(p.field_type),
                        int_cell(p.length),
                        opt_int_cell(p.precision),
                        opt_int_cell(p.scale),
                    ]
                })
                .collect());
        }

        if sql.contains("rdb$database") {
            return Ok(vec![vec![self.db_name.clone()]]);
        }

        if sql.contains("rdb$relations") {
            let mut names: Vec<&String> = self.tables.keys().collect();
            names.sort();
            if let Some(wanted) = params.first() {
                names.retain(|name| name.as_str() == *wanted);
            }
            return Ok(names.into_iter().map(|name| vec![cell(name)]).collect());
        }

        if sql.contains("rdb$procedures") {
            let mut rows: Vec<&FakeProc> = self.procedures.iter().collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            return Ok(rows
                .into_iter()
                .map(|p| vec![cell(&p.name), p.source.clone()])
                .collect());
        }

        if sql.contains("rdb$fields") {
            let mut rows: Vec<&FakeDomain> = self.domains.iter().collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            if let Some(wanted) = params.first() {
                rows.retain(|d| d.name.as_str() == *wanted);
                return Ok(rows.into_iter().map(|d| vec![cell(&d.name)]).collect());
            }
            return Ok(rows
                .into_iter()
                .map(|d| {
                    vec![
                        cell(&d.name),
                        int_cell(d.field_type),
                        int_cell(d.length),
                        opt_int_cell(d.precision),
                        opt_int_cell(d.scale),
                    ]
                })
                .collect());
        }

        Err(Error::Database(format!("unexpected query: {sql}")))
    }
}
