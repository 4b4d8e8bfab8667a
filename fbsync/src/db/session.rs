//! Database session abstraction
//!
//! The engine never opens connections or manages transactions itself: every
//! statement goes through [`SqlSession`], supplied by the caller. For the
//! apply direction the session is expected to span one transaction for the
//! whole run; the export direction only needs a plain connection.

use crate::error::Result;

/// One decoded result row. Every catalog query the engine issues casts its
/// projection to text in SQL, so a session only ever has to produce
/// `Option<String>` cells (`None` for SQL NULL).
pub type TextRow = Vec<Option<String>>;

/// A live database session the engine runs its statements on.
pub trait SqlSession {
    /// Execute a single DDL/DML statement.
    fn execute(&mut self, sql: &str) -> Result<()>;

    /// Run a query returning `columns` projected columns per row.
    ///
    /// `params` are bound positionally to `?` placeholders. The projection
    /// width is passed explicitly so implementations can decode rows without
    /// inspecting the statement text.
    fn query(&mut self, sql: &str, params: &[&str], columns: usize) -> Result<Vec<TextRow>>;
}
