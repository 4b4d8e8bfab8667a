//! Catalog reflection into DDL scripts
//!
//! Walks the live catalog and writes one `CREATE` script per object under
//! `outputRoot/{domains,tables,procedures}`. Read-only on the database; the
//! emitted table scripts round-trip through the applier's parser.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::apply::scripts::write_script;
use crate::db::session::SqlSession;
use crate::error::Result;
use crate::schema::catalog;
use crate::schema::sqlgen::{escape_ident, map_field_type};
use crate::schema::types::{DomainMeta, ProcParam, ScriptKind};

/// Reserved prefix of engine-generated field and object names.
const SYSTEM_PREFIX: &str = "RDB$";

/// How many objects one export run wrote, per kind.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub domains: usize,
    pub tables: usize,
    pub procedures: usize,
}

/// Reflect the whole catalog into scripts under `output_root`.
pub fn export_schema<S: SqlSession + ?Sized>(
    session: &mut S,
    output_root: &Path,
) -> Result<ExportSummary> {
    let domains_dir = output_root.join(ScriptKind::Domain.folder());
    let tables_dir = output_root.join(ScriptKind::Table.folder());
    let procedures_dir = output_root.join(ScriptKind::Procedure.folder());
    for dir in [&domains_dir, &tables_dir, &procedures_dir] {
        fs::create_dir_all(dir)?;
    }

    let domains = catalog::list_domains(session)?;
    // One prefetch per run; the per-column domain-vs-primitive decision below
    // only needs membership.
    let user_domains: BTreeSet<String> = domains
        .iter()
        .filter(|domain| !is_system_name(&domain.name))
        .map(|domain| domain.name.clone())
        .collect();

    let summary = ExportSummary {
        domains: export_domains(&domains, &domains_dir)?,
        tables: export_tables(session, &user_domains, &tables_dir)?,
        procedures: export_procedures(session, &user_domains, &procedures_dir)?,
    };

    info!(
        domains = summary.domains,
        tables = summary.tables,
        procedures = summary.procedures,
        output = %output_root.display(),
        "schema exported"
    );
    Ok(summary)
}

fn is_system_name(name: &str) -> bool {
    name.to_ascii_uppercase().starts_with(SYSTEM_PREFIX)
}

/// SQL for one column or parameter: a user-domain reference when the field
/// source is a user domain, the mapped primitive type otherwise.
fn source_type_sql(
    user_domains: &BTreeSet<String>,
    field_source: &str,
    field_type: i32,
    length: i32,
    precision: Option<i32>,
    scale: Option<i32>,
) -> String {
    if !is_system_name(field_source) && user_domains.contains(field_source) {
        escape_ident(field_source)
    } else {
        map_field_type(field_type, length, precision, scale)
    }
}

fn export_domains(domains: &[DomainMeta], out_dir: &Path) -> Result<usize> {
    let mut written = 0;

    for domain in domains {
        if is_system_name(&domain.name) {
            continue;
        }

        let type_sql =
            map_field_type(domain.field_type, domain.length, domain.precision, domain.scale);
        let script = format!(
            "CREATE DOMAIN {} AS {};\n",
            escape_ident(&domain.name),
            type_sql
        );
        write_script(out_dir, &domain.name, &script)?;
        debug!(domain = %domain.name, "domain exported");
        written += 1;
    }

    Ok(written)
}

fn export_tables<S: SqlSession + ?Sized>(
    session: &mut S,
    user_domains: &BTreeSet<String>,
    out_dir: &Path,
) -> Result<usize> {
    let mut written = 0;

    for table in catalog::list_tables(session)? {
        if is_system_name(&table) {
            continue;
        }

        let columns = catalog::table_columns(session, &table)?;
        let mut lines = Vec::with_capacity(columns.len());
        for column in &columns {
            let type_sql = source_type_sql(
                user_domains,
                &column.field_source,
                column.field_type,
                column.length,
                column.precision,
                column.scale,
            );
            let mut line = format!("  {} {}", escape_ident(&column.name), type_sql);
            if column.not_null {
                line.push_str(" NOT NULL");
            }
            lines.push(line);
        }

        let script = format!(
            "CREATE TABLE {} (\n{}\n);\n",
            escape_ident(&table),
            lines.join(",\n")
        );
        write_script(out_dir, &table, &script)?;
        debug!(table = %table, columns = columns.len(), "table exported");
        written += 1;
    }

    Ok(written)
}

fn export_procedures<S: SqlSession + ?Sized>(
    session: &mut S,
    user_domains: &BTreeSet<String>,
    out_dir: &Path,
) -> Result<usize> {
    let mut written = 0;

    for procedure in catalog::list_procedures(session)? {
        let source = procedure.source.as_deref().map(str::trim).unwrap_or("");

        // Some databases store the full DDL rather than just the body; keep
        // it untouched in that case.
        let text = if source.get(..6).is_some_and(|p| p.eq_ignore_ascii_case("CREATE")) {
            format!("{source}\n")
        } else {
            let (inputs, outputs) = catalog::procedure_params(session, &procedure.name)?;
            synthesize_procedure(&procedure.name, &inputs, &outputs, source, user_domains)
        };

        write_script(out_dir, &procedure.name, &text)?;
        debug!(procedure = %procedure.name, "procedure exported");
        written += 1;
    }

    Ok(written)
}

fn synthesize_procedure(
    name: &str,
    inputs: &[ProcParam],
    outputs: &[ProcParam],
    source: &str,
    user_domains: &BTreeSet<String>,
) -> String {
    let param_lines = |params: &[ProcParam]| -> String {
        params
            .iter()
            .map(|param| {
                format!(
                    "  {} {}",
                    escape_ident(&param.name),
                    source_type_sql(
                        user_domains,
                        &param.field_source,
                        param.field_type,
                        param.length,
                        param.precision,
                        param.scale,
                    )
                )
            })
            .collect::<Vec<_>>()
            .join(",\n")
    };

    let mut text = format!("CREATE OR ALTER PROCEDURE {}\n", escape_ident(name));
    if !inputs.is_empty() {
        text.push_str("(\n");
        text.push_str(&param_lines(inputs));
        text.push_str("\n)\n");
    }
    if !outputs.is_empty() {
        text.push_str("RETURNS (\n");
        text.push_str(&param_lines(outputs));
        text.push_str("\n)\n");
    }
    text.push_str("AS\n");

    if source.is_empty() {
        text.push_str("BEGIN\n  -- procedure source not available\nEND\n");
    } else {
        text.push_str(source);
        text.push('\n');
    }

    text
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::db::fake::FakeSession;
    use crate::schema::parser::parse_create_table;

    fn read(out: &Path, kind: &str, name: &str) -> String {
        fs::read_to_string(out.join(kind).join(format!("{name}.sql"))).expect("script written")
    }

    #[test]
    fn domains_use_the_full_type_mapper() {
        let out = tempdir().expect("tempdir");
        let mut session = FakeSession::default();
        session.add_domain("DM_NAME", 37, 40);
        session.add_domain("DM_AMOUNT", 16, 8);
        session.domains[1].precision = Some(18);
        session.domains[1].scale = Some(-2);
        session.add_domain("RDB$1", 8, 4);

        let summary = export_schema(&mut session, out.path()).expect("export");
        assert_eq!(summary.domains, 2);

        assert_eq!(
            read(out.path(), "domains", "DM_NAME"),
            "CREATE DOMAIN DM_NAME AS VARCHAR(40);\n"
        );
        assert_eq!(
            read(out.path(), "domains", "DM_AMOUNT"),
            "CREATE DOMAIN DM_AMOUNT AS NUMERIC(18,2);\n"
        );
        assert!(!out.path().join("domains/RDB$1.sql").exists());
    }

    #[test]
    fn table_columns_prefer_domain_references() {
        let out = tempdir().expect("tempdir");
        let mut session = FakeSession::default();
        session.add_domain("DM_CITY", 37, 60);
        session.add_table("PLACES", &["ID", "CITY"]);
        {
            let columns = session.tables.get_mut("PLACES").expect("registered");
            columns[0].field_source = "RDB$1".to_string();
            columns[0].field_type = 8;
            columns[0].not_null = true;
            columns[1].field_source = "DM_CITY".to_string();
        }

        let summary = export_schema(&mut session, out.path()).expect("export");
        assert_eq!(summary.tables, 1);

        let script = read(out.path(), "tables", "PLACES");
        assert_eq!(
            script,
            "CREATE TABLE PLACES (\n  ID INTEGER NOT NULL,\n  CITY DM_CITY\n);\n"
        );

        // The emitted script must round-trip through the applier's parser.
        let def = parse_create_table(&script, Path::new("PLACES.sql")).expect("round-trip");
        assert_eq!(def.name, "PLACES");
        assert_eq!(def.columns.len(), 2);
        assert!(def.columns[0].not_null);
        assert_eq!(def.columns[1].sql_type, "DM_CITY");
    }

    #[test]
    fn stored_create_sources_are_kept_verbatim() {
        let out = tempdir().expect("tempdir");
        let mut session = FakeSession::default();
        session.add_procedure(
            "P_KEEP",
            Some("CREATE OR ALTER PROCEDURE P_KEEP AS BEGIN END"),
        );

        export_schema(&mut session, out.path()).expect("export");
        assert_eq!(
            read(out.path(), "procedures", "P_KEEP"),
            "CREATE OR ALTER PROCEDURE P_KEEP AS BEGIN END\n"
        );
    }

    #[test]
    fn procedure_headers_are_synthesized_from_parameters() {
        let out = tempdir().expect("tempdir");
        let mut session = FakeSession::default();
        session.add_domain("DM_ID", 8, 4);
        session.add_procedure("P_TOTALS", Some("BEGIN\n  SUSPEND;\nEND"));
        session.add_proc_param("P_TOTALS", "IN_ID", 0, "DM_ID", 8, 4);
        session.add_proc_param("P_TOTALS", "OUT_TOTAL", 1, "RDB$2", 16, 8);

        export_schema(&mut session, out.path()).expect("export");
        let script = read(out.path(), "procedures", "P_TOTALS");
        assert_eq!(
            script,
            "CREATE OR ALTER PROCEDURE P_TOTALS\n(\n  IN_ID DM_ID\n)\nRETURNS (\n  OUT_TOTAL BIGINT\n)\nAS\nBEGIN\n  SUSPEND;\nEND\n"
        );
    }

    #[test]
    fn missing_procedure_sources_get_a_placeholder_body() {
        let out = tempdir().expect("tempdir");
        let mut session = FakeSession::default();
        session.add_procedure("P_LOST", None);

        export_schema(&mut session, out.path()).expect("export");
        let script = read(out.path(), "procedures", "P_LOST");
        assert!(script.starts_with("CREATE OR ALTER PROCEDURE P_LOST\nAS\n"));
        assert!(script.contains("procedure source not available"));
    }

    #[test]
    fn output_directories_exist_even_for_an_empty_catalog() {
        let out = tempdir().expect("tempdir");
        let mut session = FakeSession::default();

        let summary = export_schema(&mut session, out.path()).expect("export");
        assert_eq!(summary, ExportSummary::default());
        for kind in ["domains", "tables", "procedures"] {
            assert!(out.path().join(kind).is_dir());
        }
    }
}
