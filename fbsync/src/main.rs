//! fbsync command-line interface
//!
//! Three commands, all thin wrappers around the library: `build-db` creates
//! a fresh database file and applies the script tree, `update-db` applies
//! the tree to an existing database, `export-scripts` reflects the catalog
//! back into scripts.

use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use fbsync::config::{self, Config, DatabaseConfig};
use fbsync::db::firebird::{self, FbConnection, FirebirdSession};
use fbsync::error::Error;
use fbsync::schema::catalog;
use fbsync::utils::logging;
use fbsync::{apply_schema, export_schema};

#[derive(Parser)]
#[command(
    name = "fbsync",
    version,
    about = "Idempotent schema apply and metadata export for Firebird databases"
)]
struct Cli {
    /// Optional TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print the run summary as JSON on stdout
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConnectionArgs {
    /// Database server host
    #[arg(long)]
    host: Option<String>,

    /// Database server port
    #[arg(long)]
    port: Option<u16>,

    /// Database user
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long)]
    password: Option<String>,

    /// Database file path or alias on the server
    #[arg(long)]
    database: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new empty database and apply the script tree to it
    BuildDb {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Directory the database file is created in
        #[arg(long)]
        db_dir: Option<PathBuf>,

        /// File name of the created database
        #[arg(long, default_value = "generated.fdb")]
        db_name: String,

        /// Root directory containing domains/, tables/, procedures/
        #[arg(long)]
        scripts_dir: Option<PathBuf>,
    },

    /// Apply the script tree to an existing database
    UpdateDb {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Root directory containing domains/, tables/, procedures/
        #[arg(long)]
        scripts_dir: Option<PathBuf>,
    },

    /// Export the database catalog as DDL scripts
    ExportScripts {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Root directory the scripts are written under
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::load_from_file(path)?,
        None => Config::default(),
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    logging::init_logging(&level)?;

    match cli.command {
        Command::UpdateDb {
            connection,
            scripts_dir,
        } => {
            let db = merge_connection(config.database.clone(), connection);
            let scripts_dir = require_dir(
                scripts_dir.or_else(|| config.paths.scripts_dir.clone()),
                "--scripts-dir",
            )?;

            let mut conn = firebird::connect(&db)?;
            log_database_context(&mut conn);
            info!(scripts = %scripts_dir.display(), "applying schema scripts");

            let summary =
                firebird::with_transaction(&mut conn, |session| apply_schema(session, &scripts_dir))?;
            report_apply(&summary, cli.json)?;
        }

        Command::BuildDb {
            connection,
            db_dir,
            db_name,
            scripts_dir,
        } => {
            let db_dir = require_dir(db_dir.or_else(|| config.paths.db_dir.clone()), "--db-dir")?;
            let scripts_dir = require_dir(
                scripts_dir.or_else(|| config.paths.scripts_dir.clone()),
                "--scripts-dir",
            )?;

            fs::create_dir_all(&db_dir)?;
            let db_path = db_dir.join(&db_name);
            if db_path.exists() {
                fs::remove_file(&db_path)?;
            }

            let mut db = merge_connection(config.database.clone(), connection);
            db.database = db_path.to_string_lossy().into_owned();

            let mut conn = firebird::create_database(&db)?;
            info!(database = %db_path.display(), "database created");

            let summary =
                firebird::with_transaction(&mut conn, |session| apply_schema(session, &scripts_dir))?;
            report_apply(&summary, cli.json)?;
        }

        Command::ExportScripts {
            connection,
            output_dir,
        } => {
            let db = merge_connection(config.database.clone(), connection);
            let output_dir = require_dir(
                output_dir.or_else(|| config.paths.output_dir.clone()),
                "--output-dir",
            )?;

            let mut conn = firebird::connect(&db)?;
            log_database_context(&mut conn);

            let mut session = FirebirdSession::new(&mut conn);
            let summary = export_schema(&mut session, &output_dir)?;
            print_json(&summary, cli.json)?;
        }
    }

    Ok(())
}

/// Overlay command-line connection flags on the configured settings.
fn merge_connection(mut db: DatabaseConfig, args: ConnectionArgs) -> DatabaseConfig {
    if let Some(host) = args.host {
        db.host = host;
    }
    if let Some(port) = args.port {
        db.port = port;
    }
    if let Some(user) = args.user {
        db.user = user;
    }
    if let Some(password) = args.password {
        db.password = password;
    }
    if let Some(database) = args.database {
        db.database = database;
    }
    db
}

fn require_dir(dir: Option<PathBuf>, flag: &str) -> Result<PathBuf, Error> {
    match dir {
        Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
        _ => Err(Error::Config(format!(
            "{flag} is required (flag or config file)"
        ))),
    }
}

fn log_database_context(conn: &mut FbConnection) {
    let mut session = FirebirdSession::new(conn);
    match catalog::database_name(&mut session) {
        Ok(Some(name)) => info!(database = %name, "connected"),
        Ok(None) => info!("connected"),
        Err(error) => tracing::debug!(%error, "could not read database context"),
    }
}

fn report_apply(summary: &fbsync::ApplySummary, json: bool) -> anyhow::Result<()> {
    info!(
        domains_applied = summary.domains.applied,
        domains_skipped = summary.domains.skipped,
        tables_created = summary.tables.created,
        columns_added = summary.tables.columns_added,
        procedures_applied = summary.procedures.applied,
        procedure_rounds = summary.procedures.rounds,
        "schema applied"
    );
    print_json(summary, json)
}

fn print_json<T: Serialize>(summary: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    Ok(())
}
