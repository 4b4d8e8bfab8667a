//! fbsync: idempotent schema apply and catalog export for Firebird databases
//!
//! fbsync applies a directory tree of SQL object definitions (domains,
//! tables, stored procedures) against a live database — creating what is
//! missing, altering tables additively, and ordering stored procedures by
//! their call dependencies — and can run in reverse, reflecting a live
//! database's catalog into an equivalent tree of DDL scripts.

pub mod apply;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use apply::{apply_schema, ApplySummary};
pub use config::Config;
pub use db::session::SqlSession;
pub use error::{Error, Result};
pub use export::{export_schema, ExportSummary};
