//! Firebird connectivity
//!
//! Thin adapter between the engine's [`SqlSession`] seam and the
//! `rsfbclient` driver (pure-Rust wire protocol). Connection opening,
//! database creation and the single top-level transaction live here; the
//! engine itself never sees the driver.

use rsfbclient::prelude::*;
use rsfbclient::{Connection, FbError, IntoParams};
use rsfbclient_rust::RustFbClient;

use crate::config::DatabaseConfig;
use crate::db::session::{SqlSession, TextRow};
use crate::error::{Error, Result};

/// A live connection over the pure-Rust protocol implementation.
pub type FbConnection = Connection<RustFbClient>;

fn db_err(error: FbError) -> Error {
    Error::Database(error.to_string())
}

/// Open a connection to an existing database.
pub fn connect(config: &DatabaseConfig) -> Result<FbConnection> {
    config.validate()?;
    rsfbclient::builder_pure_rust()
        .host(&config.host)
        .port(config.port)
        .user(&config.user)
        .pass(&config.password)
        .db_name(&config.database)
        .connect()
        .map_err(db_err)
}

/// Create a new, empty database file and return a connection to it.
pub fn create_database(config: &DatabaseConfig) -> Result<FbConnection> {
    config.validate()?;
    rsfbclient::builder_pure_rust()
        .host(&config.host)
        .port(config.port)
        .user(&config.user)
        .pass(&config.password)
        .db_name(&config.database)
        .create_database()
        .map_err(db_err)
}

/// Run `f` on a session spanning one transaction: committed when `f`
/// succeeds, rolled back when it fails. This is the only commit/rollback
/// decision point for the apply flow.
pub fn with_transaction<R>(
    conn: &mut FbConnection,
    f: impl FnOnce(&mut dyn SqlSession) -> Result<R>,
) -> Result<R> {
    let mut outcome: Option<Result<R>> = None;
    let mut f = Some(f);

    let tx_result = conn.with_transaction(|tr| {
        let run = match f.take() {
            Some(run) => run,
            None => return Err(FbError::from("transaction closure re-entered".to_string())),
        };
        let mut session = FirebirdSession::new(tr);
        match run(&mut session) {
            Ok(value) => {
                outcome = Some(Ok(value));
                Ok(())
            }
            Err(error) => {
                outcome = Some(Err(error));
                Err(FbError::from("rolling back failed schema run".to_string()))
            }
        }
    });

    match (outcome, tx_result) {
        (Some(result), _) => result,
        (None, Err(error)) => Err(db_err(error)),
        (None, Ok(())) => Err(Error::Database(
            "transaction closure did not run".to_string(),
        )),
    }
}

/// [`SqlSession`] over anything that can run statements: a plain connection
/// for the read-only export direction, an open transaction for apply.
pub struct FirebirdSession<'a, T> {
    inner: &'a mut T,
}

impl<'a, T> FirebirdSession<'a, T> {
    pub fn new(inner: &'a mut T) -> Self {
        Self { inner }
    }
}

impl<T: Queryable + Execute> SqlSession for FirebirdSession<'_, T> {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.inner.execute(sql, ()).map(|_| ()).map_err(db_err)
    }

    fn query(&mut self, sql: &str, params: &[&str], columns: usize) -> Result<Vec<TextRow>> {
        match params.len() {
            0 => query_rows(self.inner, sql, (), columns),
            1 => query_rows(self.inner, sql, (params[0].to_string(),), columns),
            n => Err(Error::Database(format!(
                "unsupported parameter count: {n}"
            ))),
        }
    }
}

type Cell = Option<String>;

/// Decode rows of the given projection width. The engine casts every
/// projected column to text (see the catalog module), so each cell is an
/// optional string regardless of the underlying column type.
fn query_rows<T, P>(conn: &mut T, sql: &str, params: P, columns: usize) -> Result<Vec<TextRow>>
where
    T: Queryable + Execute,
    P: IntoParams,
{
    let rows = match columns {
        1 => {
            let rows: Vec<(Cell,)> = conn.query(sql, params).map_err(db_err)?;
            rows.into_iter().map(|r| vec![r.0]).collect()
        }
        2 => {
            let rows: Vec<(Cell, Cell)> = conn.query(sql, params).map_err(db_err)?;
            rows.into_iter().map(|r| vec![r.0, r.1]).collect()
        }
        3 => {
            let rows: Vec<(Cell, Cell, Cell)> = conn.query(sql, params).map_err(db_err)?;
            rows.into_iter().map(|r| vec![r.0, r.1, r.2]).collect()
        }
        4 => {
            let rows: Vec<(Cell, Cell, Cell, Cell)> = conn.query(sql, params).map_err(db_err)?;
            rows.into_iter().map(|r| vec![r.0, r.1, r.2, r.3]).collect()
        }
        5 => {
            let rows: Vec<(Cell, Cell, Cell, Cell, Cell)> =
                conn.query(sql, params).map_err(db_err)?;
            rows.into_iter()
                .map(|r| vec![r.0, r.1, r.2, r.3, r.4])
                .collect()
        }
        6 => {
            let rows: Vec<(Cell, Cell, Cell, Cell, Cell, Cell)> =
                conn.query(sql, params).map_err(db_err)?;
            rows.into_iter()
                .map(|r| vec![r.0, r.1, r.2, r.3, r.4, r.5])
                .collect()
        }
        7 => {
            let rows: Vec<(Cell, Cell, Cell, Cell, Cell, Cell, Cell)> =
                conn.query(sql, params).map_err(db_err)?;
            rows.into_iter()
                .map(|r| vec![r.0, r.1, r.2, r.3, r.4, r.5, r.6])
                .collect()
        }
        8 => {
            let rows: Vec<(Cell, Cell, Cell, Cell, Cell, Cell, Cell, Cell)> =
                conn.query(sql, params).map_err(db_err)?;
            rows.into_iter()
                .map(|r| vec![r.0, r.1, r.2, r.3, r.4, r.5, r.6, r.7])
                .collect()
        }
        n => {
            return Err(Error::Database(format!(
                "unsupported projection width: {n}"
            )))
        }
    };

    Ok(rows)
}
