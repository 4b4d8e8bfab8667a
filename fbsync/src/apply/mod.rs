//! Idempotent script application
//!
//! Applies a scripts root (`domains/`, `tables/`, `procedures/`) against a
//! live database: domains are created only when absent, tables are created
//! or additively altered to match their script, procedures are delegated to
//! the dependency [`resolver`]. The whole flow expects to run on a session
//! spanning one transaction; the caller commits or rolls back.

pub mod resolver;
pub mod scripts;

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::session::SqlSession;
use crate::error::{Error, Result};
use crate::schema::catalog;
use crate::schema::parser;
use crate::schema::sqlgen::escape_ident;
use crate::schema::types::{ScriptKind, ScriptObject};

/// Outcome counters for the domain pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DomainCounts {
    pub applied: usize,
    pub skipped: usize,
}

/// Outcome counters for the table pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub created: usize,
    pub skipped: usize,
    pub columns_added: usize,
}

/// Outcome counters for the procedure pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ProcedureCounts {
    pub applied: usize,
    pub skipped: usize,
    pub rounds: usize,
}

/// What one apply run did, per object kind.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub domains: DomainCounts,
    pub tables: TableCounts,
    pub procedures: ProcedureCounts,
}

/// Apply the script tree under `scripts_root`: domains, then tables, then
/// dependency-ordered procedures.
pub fn apply_schema<S: SqlSession + ?Sized>(
    session: &mut S,
    scripts_root: &Path,
) -> Result<ApplySummary> {
    if !scripts_root.is_dir() {
        return Err(Error::Config(format!(
            "scripts directory not found: {}",
            scripts_root.display()
        )));
    }

    let domains = apply_domains(session, &scripts_root.join(ScriptKind::Domain.folder()))?;
    let tables = apply_tables(session, &scripts_root.join(ScriptKind::Table.folder()))?;
    let procedures =
        resolver::apply_procedures(session, &scripts_root.join(ScriptKind::Procedure.folder()))?;

    Ok(ApplySummary {
        domains,
        tables,
        procedures,
    })
}

fn apply_domains<S: SqlSession + ?Sized>(session: &mut S, dir: &Path) -> Result<DomainCounts> {
    let mut counts = DomainCounts::default();

    for script in scripts::load_scripts(dir, ScriptKind::Domain)? {
        if script.text.trim().is_empty() {
            warn!(domain = %script.name, file = %script.path.display(), "blank script, skipping");
            counts.skipped += 1;
            continue;
        }

        if catalog::domain_exists(session, &script.name)? {
            debug!(domain = %script.name, "domain exists, skipping");
            counts.skipped += 1;
            continue;
        }

        execute_script(session, &script)?;
        info!(domain = %script.name, "domain created");
        counts.applied += 1;
    }

    Ok(counts)
}

fn apply_tables<S: SqlSession + ?Sized>(session: &mut S, dir: &Path) -> Result<TableCounts> {
    let mut counts = TableCounts::default();

    for script in scripts::load_scripts(dir, ScriptKind::Table)? {
        if script.text.trim().is_empty() {
            warn!(table = %script.name, file = %script.path.display(), "blank script, skipping");
            counts.skipped += 1;
            continue;
        }

        if !catalog::table_exists(session, &script.name)? {
            execute_script(session, &script)?;
            info!(table = %script.name, "table created");
            counts.created += 1;
            continue;
        }

        let added = alter_missing_columns(session, &script)?;
        if added == 0 {
            debug!(table = %script.name, "table up to date, skipping");
            counts.skipped += 1;
        } else {
            info!(table = %script.name, columns = added, "table altered");
            counts.columns_added += added;
        }
    }

    Ok(counts)
}

/// Diff a table script against the live table and add whatever columns are
/// declared but missing. Evolution is additive only: live columns absent
/// from the script are left alone.
fn alter_missing_columns<S: SqlSession + ?Sized>(
    session: &mut S,
    script: &ScriptObject,
) -> Result<usize> {
    let def = parser::parse_create_table(&script.text, &script.path)?;

    let live: HashSet<String> = catalog::table_column_names(session, &script.name)?
        .into_iter()
        .map(|name| name.to_uppercase())
        .collect();

    let mut added = 0;
    for column in &def.columns {
        if live.contains(&column.name.to_uppercase()) {
            continue;
        }

        let sql = format!(
            "ALTER TABLE {} ADD {} {}{}",
            escape_ident(&def.name),
            escape_ident(&column.name),
            column.sql_type,
            if column.not_null { " NOT NULL" } else { "" }
        );
        session.execute(&sql).map_err(|error| Error::Execution {
            object: script.name.clone(),
            file: script.path.clone(),
            message: error.to_string(),
        })?;
        info!(table = %def.name, column = %column.name, "column added");
        added += 1;
    }

    Ok(added)
}

fn execute_script<S: SqlSession + ?Sized>(session: &mut S, script: &ScriptObject) -> Result<()> {
    session
        .execute(script.text.trim())
        .map_err(|error| Error::Execution {
            object: script.name.clone(),
            file: script.path.clone(),
            message: error.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::db::fake::FakeSession;

    fn scripts_root() -> TempDir {
        let root = tempdir().expect("tempdir");
        for kind in ["domains", "tables", "procedures"] {
            fs::create_dir_all(root.path().join(kind)).expect("mkdir");
        }
        root
    }

    #[test]
    fn existing_domains_are_skipped() {
        let root = scripts_root();
        fs::write(
            root.path().join("domains/DM_OLD.sql"),
            "CREATE DOMAIN DM_OLD AS INTEGER;",
        )
        .expect("write");
        fs::write(
            root.path().join("domains/DM_NEW.sql"),
            "CREATE DOMAIN DM_NEW AS VARCHAR(40);",
        )
        .expect("write");

        let mut session = FakeSession::default();
        session.add_domain("DM_OLD", 8, 4);

        let summary = apply_schema(&mut session, root.path()).expect("apply");
        assert_eq!(summary.domains.applied, 1);
        assert_eq!(summary.domains.skipped, 1);

        let ddl = session.executed_ddl();
        assert_eq!(ddl, vec!["CREATE DOMAIN DM_NEW AS VARCHAR(40);"]);
    }

    #[test]
    fn missing_tables_are_created_verbatim() {
        let root = scripts_root();
        let script = "CREATE TABLE ORDERS (\n  ID INTEGER NOT NULL\n);";
        fs::write(root.path().join("tables/ORDERS.sql"), script).expect("write");

        let mut session = FakeSession::default();
        let summary = apply_schema(&mut session, root.path()).expect("apply");

        assert_eq!(summary.tables.created, 1);
        assert_eq!(session.executed_ddl(), vec![script]);
    }

    #[test]
    fn existing_tables_evolve_additively() {
        let root = scripts_root();
        fs::write(
            root.path().join("tables/CUSTOMERS.sql"),
            "CREATE TABLE CUSTOMERS (\n  ID INTEGER NOT NULL,\n  NAME VARCHAR(80),\n  CREATED_AT TIMESTAMP NOT NULL\n);",
        )
        .expect("write");

        let mut session = FakeSession::default();
        session.add_table("CUSTOMERS", &["ID", "NAME"]);

        let summary = apply_schema(&mut session, root.path()).expect("apply");
        assert_eq!(summary.tables.created, 0);
        assert_eq!(summary.tables.columns_added, 1);

        let ddl = session.executed_ddl();
        assert_eq!(
            ddl,
            vec!["ALTER TABLE CUSTOMERS ADD CREATED_AT TIMESTAMP NOT NULL"]
        );
    }

    #[test]
    fn second_run_is_idempotent() {
        let root = scripts_root();
        fs::write(
            root.path().join("domains/DM_ID.sql"),
            "CREATE DOMAIN DM_ID AS INTEGER;",
        )
        .expect("write");
        fs::write(
            root.path().join("tables/ITEMS.sql"),
            "CREATE TABLE ITEMS (\n  ID INTEGER NOT NULL,\n  LABEL VARCHAR(60)\n);",
        )
        .expect("write");

        let mut session = FakeSession::default();
        let first = apply_schema(&mut session, root.path()).expect("first run");
        assert_eq!(first.domains.applied, 1);
        assert_eq!(first.tables.created, 1);

        // Reflect the first run's effects in the catalog, then re-apply.
        session.add_domain("DM_ID", 8, 4);
        session.add_table("ITEMS", &["ID", "LABEL"]);
        session.executed.clear();

        let second = apply_schema(&mut session, root.path()).expect("second run");
        assert_eq!(second.domains.applied, 0);
        assert_eq!(second.domains.skipped, 1);
        assert_eq!(second.tables.created, 0);
        assert_eq!(second.tables.columns_added, 0);
        assert_eq!(second.tables.skipped, 1);
        assert!(session.executed_ddl().is_empty());
    }

    #[test]
    fn malformed_table_scripts_abort_the_run() {
        let root = scripts_root();
        fs::write(root.path().join("tables/BAD.sql"), "THIS IS NOT DDL").expect("write");

        let mut session = FakeSession::default();
        session.add_table("BAD", &["ID"]);

        let error = apply_schema(&mut session, root.path()).expect_err("must fail");
        assert!(matches!(error, Error::MalformedScript { .. }));
    }

    #[test]
    fn empty_script_folders_are_a_no_op() {
        let root = tempdir().expect("tempdir");
        let mut session = FakeSession::default();

        let summary = apply_schema(&mut session, root.path()).expect("apply");
        assert_eq!(summary, ApplySummary::default());
        assert!(session.executed.is_empty());
    }

    #[test]
    fn missing_scripts_root_is_a_configuration_error() {
        let root = tempdir().expect("tempdir");
        let mut session = FakeSession::default();

        let error = apply_schema(&mut session, &root.path().join("nope")).expect_err("must fail");
        assert!(matches!(error, Error::Config(_)));
    }

    #[test]
    fn blank_table_scripts_are_skipped_with_a_warning() {
        let root = scripts_root();
        fs::write(root.path().join("tables/EMPTY.sql"), "\n  \n").expect("write");

        let mut session = FakeSession::default();
        let summary = apply_schema(&mut session, root.path()).expect("apply");
        assert_eq!(summary.tables.skipped, 1);
        assert!(session.executed.is_empty());
    }
}
