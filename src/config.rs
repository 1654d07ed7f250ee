//! Connection and run settings.
//!
//! Every connection setting can come from the command line or the
//! environment. Before the CLI is parsed, the first existing file among
//! [`ENV_FILES`] is loaded into the environment.

pub mod duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use self::duration::duration_arg;

/// Candidate env files, in priority order.
pub const ENV_FILES: [&str; 4] = [".env.local", ".env", "config/.env.local", "config/.env"];

/// Load the first existing env file. Variables already set are kept.
pub fn load_env_files() -> Option<PathBuf> {
    load_env_files_from(Path::new("."))
}

pub fn load_env_files_from(dir: &Path) -> Option<PathBuf> {
    let path = ENV_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())?;
    match dotenv::from_path(&path) {
        Ok(()) => Some(path),
        Err(e) => {
            debug!("Ignoring unreadable env file {}: {}", path.display(), e);
            None
        }
    }
}

#[derive(Parser, Clone, Debug, Default)]
pub struct SourceOpts {
    /// SQL Server connection string (ODBC or ADO.NET style)
    #[arg(long = "mssql-connection", env = "MSSQL_DIRECT_CONNECTION", hide_env_values = true)]
    pub connection_string: Option<String>,
}

impl SourceOpts {
    pub fn connection_string(&self) -> anyhow::Result<&str> {
        self.connection_string
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .context("MSSQL_DIRECT_CONNECTION is not set")
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SslMode {
    /// Plain TCP
    Disable,
    /// Encrypt when the server supports it
    Prefer,
    /// Encrypt, do not verify the server certificate
    #[default]
    Require,
    /// Encrypt and verify the certificate against the web PKI roots
    VerifyFull,
}

#[derive(Parser, Clone, Debug)]
pub struct DestinationOpts {
    #[arg(long, env = "PG_HOST")]
    pub pg_host: Option<String>,

    #[arg(long, env = "PG_DB")]
    pub pg_db: Option<String>,

    #[arg(long, env = "PG_USER")]
    pub pg_user: Option<String>,

    #[arg(long, env = "PG_PASSWORD", hide_env_values = true)]
    pub pg_password: Option<String>,

    #[arg(long, env = "PG_PORT", default_value = "5432")]
    pub pg_port: u16,

    #[arg(long, env = "PG_SSLMODE", value_enum, default_value = "require")]
    pub pg_sslmode: SslMode,
}

fn required<'a>(value: &'a Option<String>, name: &str) -> anyhow::Result<&'a str> {
    value
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .with_context(|| format!("{name} is not set"))
}

impl DestinationOpts {
    /// Build the driver config. Fails when a required setting is missing.
    pub fn to_pg_config(&self, connect_timeout: Duration) -> anyhow::Result<tokio_postgres::Config> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(required(&self.pg_host, "PG_HOST")?)
            .dbname(required(&self.pg_db, "PG_DB")?)
            .user(required(&self.pg_user, "PG_USER")?)
            .password(required(&self.pg_password, "PG_PASSWORD")?)
            .port(self.pg_port)
            .connect_timeout(connect_timeout)
            .application_name("phc-sync");
        Ok(config)
    }

    /// `user@host:port/db`, for logs.
    pub fn display_target(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.pg_user.as_deref().unwrap_or("?"),
            self.pg_host.as_deref().unwrap_or("?"),
            self.pg_port,
            self.pg_db.as_deref().unwrap_or("?")
        )
    }
}

#[derive(Parser, Clone, Debug)]
pub struct SyncOpts {
    /// Destination schema
    #[arg(long, default_value = "phc")]
    pub schema: String,

    /// Rows fetched and upserted per batch
    #[arg(long, default_value = "1000")]
    pub batch_size: usize,

    /// Days re-read before the watermark on incremental runs
    #[arg(long, default_value = "3")]
    pub overlap_days: u32,

    /// Skip recently refreshed tables synced within this window (e.g. 24h, 30m)
    #[arg(long, value_parser = duration_arg)]
    pub skip_window: Option<Duration>,

    /// Give up connecting after this long
    #[arg(long, value_parser = duration_arg, default_value = "30s")]
    pub connect_timeout: Duration,

    /// YAML table registry replacing the built-in PHC tables
    #[arg(long)]
    pub tables_file: Option<PathBuf>,
}

impl Default for SyncOpts {
    fn default() -> Self {
        Self {
            schema: "phc".to_string(),
            batch_size: 1000,
            overlap_days: 3,
            skip_window: None,
            connect_timeout: Duration::from_secs(30),
            tables_file: None,
        }
    }
}
