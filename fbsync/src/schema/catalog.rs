//! Typed access to the rdb$ system catalog
//!
//! One function per catalog question the engine asks. Every query casts its
//! projection to text and the rows are decoded into the metadata types of
//! [`crate::schema::types`] immediately after the round trip, so nothing
//! downstream ever touches a raw catalog cell. All reads are stateless: no
//! caching survives a call, let alone a run.

use crate::db::session::{SqlSession, TextRow};
use crate::error::{Error, Result};
use crate::schema::types::{ColumnMeta, DomainMeta, ParamDirection, ProcMeta, ProcParam};

const DATABASE_NAME_SQL: &str =
    "SELECT rdb$get_context('SYSTEM', 'DB_NAME') FROM rdb$database";

const DOMAIN_EXISTS_SQL: &str = "\
SELECT TRIM(f.rdb$field_name)
FROM rdb$fields f
WHERE f.rdb$system_flag = 0
  AND TRIM(f.rdb$field_name) = ?";

const TABLE_EXISTS_SQL: &str = "\
SELECT TRIM(r.rdb$relation_name)
FROM rdb$relations r
WHERE r.rdb$system_flag = 0
  AND r.rdb$view_blr IS NULL
  AND TRIM(r.rdb$relation_name) = ?";

const TABLE_COLUMN_NAMES_SQL: &str = "\
SELECT TRIM(rf.rdb$field_name)
FROM rdb$relation_fields rf
WHERE rf.rdb$relation_name = ?
ORDER BY rf.rdb$field_position";

const LIST_DOMAINS_SQL: &str = "\
SELECT TRIM(f.rdb$field_name),
       CAST(f.rdb$field_type AS VARCHAR(16)),
       CAST(f.rdb$field_length AS VARCHAR(16)),
       CAST(f.rdb$field_precision AS VARCHAR(16)),
       CAST(f.rdb$field_scale AS VARCHAR(16))
FROM rdb$fields f
WHERE f.rdb$system_flag = 0
ORDER BY 1";

const LIST_TABLES_SQL: &str = "\
SELECT TRIM(r.rdb$relation_name)
FROM rdb$relations r
WHERE r.rdb$system_flag = 0
  AND r.rdb$view_blr IS NULL
ORDER BY 1";

const TABLE_COLUMNS_SQL: &str = "\
SELECT TRIM(rf.rdb$field_name),
       TRIM(rf.rdb$field_source),
       CAST(rf.rdb$null_flag AS VARCHAR(8)),
       CAST(f.rdb$field_type AS VARCHAR(16)),
       CAST(f.rdb$field_length AS VARCHAR(16)),
       CAST(f.rdb$field_precision AS VARCHAR(16)),
       CAST(f.rdb$field_scale AS VARCHAR(16))
FROM rdb$relation_fields rf
JOIN rdb$fields f ON f.rdb$field_name = rf.rdb$field_source
WHERE rf.rdb$relation_name = ?
ORDER BY rf.rdb$field_position";

const LIST_PROCEDURES_SQL: &str = "\
SELECT TRIM(p.rdb$procedure_name),
       CAST(p.rdb$procedure_source AS VARCHAR(8191))
FROM rdb$procedures p
WHERE p.rdb$system_flag = 0
ORDER BY 1";

const PROCEDURE_PARAMS_SQL: &str = "\
SELECT TRIM(pp.rdb$parameter_name),
       CAST(pp.rdb$parameter_type AS VARCHAR(8)),
       TRIM(pp.rdb$field_source),
       CAST(f.rdb$field_type AS VARCHAR(16)),
       CAST(f.rdb$field_length AS VARCHAR(16)),
       CAST(f.rdb$field_precision AS VARCHAR(16)),
       CAST(f.rdb$field_scale AS VARCHAR(16))
FROM rdb$procedure_parameters pp
JOIN rdb$fields f ON f.rdb$field_name = pp.rdb$field_source
WHERE pp.rdb$procedure_name = ?
ORDER BY pp.rdb$parameter_type, pp.rdb$parameter_number";

/// Name of the database the session is attached to, when the engine exposes
/// it. Used for connection context logging only.
pub fn database_name<S: SqlSession + ?Sized>(session: &mut S) -> Result<Option<String>> {
    let rows = session.query(DATABASE_NAME_SQL, &[], 1)?;
    Ok(rows.into_iter().next().and_then(|row| row.into_iter().next().flatten()))
}

pub fn domain_exists<S: SqlSession + ?Sized>(session: &mut S, name: &str) -> Result<bool> {
    Ok(!session.query(DOMAIN_EXISTS_SQL, &[name], 1)?.is_empty())
}

pub fn table_exists<S: SqlSession + ?Sized>(session: &mut S, name: &str) -> Result<bool> {
    Ok(!session.query(TABLE_EXISTS_SQL, &[name], 1)?.is_empty())
}

/// Whether `name` refers to a user-defined domain. Names carrying the
/// reserved `RDB$` prefix are engine-generated and never count, even when
/// present in the catalog.
pub fn is_user_domain<S: SqlSession + ?Sized>(session: &mut S, name: &str) -> Result<bool> {
    if name.to_ascii_uppercase().starts_with("RDB$") {
        return Ok(false);
    }
    domain_exists(session, name)
}

/// Names of the live columns of `table`, in field-position order.
pub fn table_column_names<S: SqlSession + ?Sized>(
    session: &mut S,
    table: &str,
) -> Result<Vec<String>> {
    session
        .query(TABLE_COLUMN_NAMES_SQL, &[table], 1)?
        .iter()
        .map(|row| req_text(row, 0))
        .collect()
}

/// All user field definitions (domains), including engine-generated ones;
/// callers filter the reserved prefix.
pub fn list_domains<S: SqlSession + ?Sized>(session: &mut S) -> Result<Vec<DomainMeta>> {
    session
        .query(LIST_DOMAINS_SQL, &[], 5)?
        .iter()
        .map(decode_domain)
        .collect()
}

/// Names of all user tables (views and system tables excluded).
pub fn list_tables<S: SqlSession + ?Sized>(session: &mut S) -> Result<Vec<String>> {
    session
        .query(LIST_TABLES_SQL, &[], 1)?
        .iter()
        .map(|row| req_text(row, 0))
        .collect()
}

/// Column metadata of `table`, in field-position order.
pub fn table_columns<S: SqlSession + ?Sized>(
    session: &mut S,
    table: &str,
) -> Result<Vec<ColumnMeta>> {
    session
        .query(TABLE_COLUMNS_SQL, &[table], 7)?
        .iter()
        .map(decode_column)
        .collect()
}

/// All user procedures with their stored source, when present.
pub fn list_procedures<S: SqlSession + ?Sized>(session: &mut S) -> Result<Vec<ProcMeta>> {
    session
        .query(LIST_PROCEDURES_SQL, &[], 2)?
        .iter()
        .map(|row| {
            Ok(ProcMeta {
                name: req_text(row, 0)?,
                source: opt_text(row, 1)?,
            })
        })
        .collect()
}

/// Parameters of `procedure`, split into inputs and outputs, each in
/// parameter-number order.
pub fn procedure_params<S: SqlSession + ?Sized>(
    session: &mut S,
    procedure: &str,
) -> Result<(Vec<ProcParam>, Vec<ProcParam>)> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();

    for row in &session.query(PROCEDURE_PARAMS_SQL, &[procedure], 7)? {
        let direction_flag = req_i32(row, 1)?;
        let param = ProcParam {
            name: req_text(row, 0)?,
            field_source: req_text(row, 2)?,
            direction: if direction_flag == 0 {
                ParamDirection::Input
            } else {
                ParamDirection::Output
            },
            field_type: req_i32(row, 3)?,
            length: opt_i32(row, 4)?.unwrap_or(0),
            precision: opt_i32(row, 5)?,
            scale: opt_i32(row, 6)?,
        };
        match param.direction {
            ParamDirection::Input => inputs.push(param),
            ParamDirection::Output => outputs.push(param),
        }
    }

    Ok((inputs, outputs))
}

fn decode_domain(row: &TextRow) -> Result<DomainMeta> {
    Ok(DomainMeta {
        name: req_text(row, 0)?,
        field_type: req_i32(row, 1)?,
        length: opt_i32(row, 2)?.unwrap_or(0),
        precision: opt_i32(row, 3)?,
        scale: opt_i32(row, 4)?,
    })
}

fn decode_column(row: &TextRow) -> Result<ColumnMeta> {
    Ok(ColumnMeta {
        name: req_text(row, 0)?,
        field_source: req_text(row, 1)?,
        not_null: opt_i32(row, 2)? == Some(1),
        field_type: req_i32(row, 3)?,
        length: opt_i32(row, 4)?.unwrap_or(0),
        precision: opt_i32(row, 5)?,
        scale: opt_i32(row, 6)?,
    })
}

fn opt_text(row: &TextRow, idx: usize) -> Result<Option<String>> {
    row.get(idx)
        .cloned()
        .ok_or_else(|| Error::Catalog(format!("catalog row is missing column {idx}")))
}

fn req_text(row: &TextRow, idx: usize) -> Result<String> {
    opt_text(row, idx)?
        .ok_or_else(|| Error::Catalog(format!("catalog column {idx} is unexpectedly NULL")))
}

fn opt_i32(row: &TextRow, idx: usize) -> Result<Option<i32>> {
    match opt_text(row, idx)? {
        None => Ok(None),
        Some(text) => text.trim().parse::<i32>().map(Some).map_err(|_| {
            Error::Catalog(format!("catalog column {idx} is not an integer: {text:?}"))
        }),
    }
}

fn req_i32(row: &TextRow, idx: usize) -> Result<i32> {
    opt_i32(row, idx)?
        .ok_or_else(|| Error::Catalog(format!("catalog column {idx} is unexpectedly NULL")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::fake::FakeSession;
    use crate::schema::types::ParamDirection;

    #[test]
    fn existence_checks_reflect_fake_state() {
        let mut session = FakeSession::default();
        session.add_domain("DM_NAME", 37, 40);
        session.add_table("CUSTOMERS", &["ID", "NAME"]);

        assert!(domain_exists(&mut session, "DM_NAME").expect("query"));
        assert!(!domain_exists(&mut session, "DM_OTHER").expect("query"));
        assert!(table_exists(&mut session, "CUSTOMERS").expect("query"));
        assert!(!table_exists(&mut session, "ORDERS").expect("query"));
        assert_eq!(
            table_column_names(&mut session, "CUSTOMERS").expect("query"),
            vec!["ID".to_string(), "NAME".to_string()]
        );
    }

    #[test]
    fn reserved_prefix_names_are_never_user_domains() {
        let mut session = FakeSession::default();
        session.add_domain("DM_NAME", 37, 40);
        session.add_domain("RDB$7", 8, 4);

        assert!(is_user_domain(&mut session, "DM_NAME").expect("query"));
        assert!(!is_user_domain(&mut session, "RDB$7").expect("query"));
        assert!(!is_user_domain(&mut session, "DM_GONE").expect("query"));
    }

    #[test]
    fn domain_rows_decode_into_typed_metadata() {
        let mut session = FakeSession::default();
        session.add_domain("DM_AMOUNT", 16, 8);
        session.domains[0].precision = Some(18);
        session.domains[0].scale = Some(-2);

        let domains = list_domains(&mut session).expect("query");
        assert_eq!(domains.len(), 1);
        assert_eq!(domains[0].name, "DM_AMOUNT");
        assert_eq!(domains[0].field_type, 16);
        assert_eq!(domains[0].precision, Some(18));
        assert_eq!(domains[0].scale, Some(-2));
    }

    #[test]
    fn procedure_params_split_by_direction() {
        let mut session = FakeSession::default();
        session.add_procedure("P_TOTALS", None);
        session.add_proc_param("P_TOTALS", "IN_ID", 0, "DM_ID", 8, 4);
        session.add_proc_param("P_TOTALS", "OUT_TOTAL", 1, "RDB$1", 16, 8);

        let (inputs, outputs) = procedure_params(&mut session, "P_TOTALS").expect("query");
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].name, "IN_ID");
        assert_eq!(inputs[0].direction, ParamDirection::Input);
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].field_source, "RDB$1");
        assert_eq!(outputs[0].direction, ParamDirection::Output);
    }
}
