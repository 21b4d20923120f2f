pub mod analyze;
pub mod clear;
pub mod delete;
pub mod list;
pub mod network;
pub mod search;
pub mod shared;
pub mod show;
pub mod status;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Subcommand, ValueEnum};

use pbilens_core::config::LensConfig;
use pbilens_core::store::sqlite::SqliteStore;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract and store the model of one or more .pbix files
    Analyze(analyze::AnalyzeArgs),
    /// List analyzed projects, most recent first
    List(list::ListArgs),
    /// Show the stored model of one project
    Show(show::ShowArgs),
    /// Delete one project by id or name
    Delete(delete::DeleteArgs),
    /// Delete every stored project
    Clear(clear::ClearArgs),
    /// Tables, measures, or columns used by more than one project
    Shared(shared::SharedArgs),
    /// Find every table, column, and measure that mentions a term
    Search(search::SearchArgs),
    /// Projects linked by the tables they share
    Network(network::NetworkArgs),
    /// Totals over the metadata store
    Status(status::StatusArgs),
}

/// Options accepted by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Config file (default: ./pbilens.toml when present)
    #[arg(long, global = true, env = "PBILENS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Metadata database (overrides store.db_path)
    #[arg(long, global = true, env = "PBILENS_DB")]
    pub db: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Loaded configuration plus an open store, shared by all subcommands.
#[derive(Debug)]
pub struct Context {
    pub config: LensConfig,
    pub store: SqliteStore,
    pub db_path: PathBuf,
    pub opts: GlobalOpts,
}

impl Context {
    pub fn open(opts: GlobalOpts) -> anyhow::Result<Self> {
        let config = LensConfig::discover(opts.config.as_deref()).context("Cannot load config")?;
        let db_path = opts
            .db
            .clone()
            .unwrap_or_else(|| config.store.db_path.clone());
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Cannot open database: {}", db_path.display()))?;
        Ok(Self {
            config,
            store,
            db_path,
            opts,
        })
    }

    pub fn json(&self) -> bool {
        self.opts.format == OutputFormat::Json
    }

    pub fn quiet(&self) -> bool {
        self.opts.quiet
    }
}

pub async fn run(cmd: Command, opts: GlobalOpts) -> anyhow::Result<()> {
    let ctx = Context::open(opts)?;
    match cmd {
        Command::Analyze(args) => analyze::run(args, &ctx).await,
        Command::List(args) => list::run(args, &ctx).await,
        Command::Show(args) => show::run(args, &ctx).await,
        Command::Delete(args) => delete::run(args, &ctx).await,
        Command::Clear(args) => clear::run(args, &ctx).await,
        Command::Shared(args) => shared::run(args, &ctx).await,
        Command::Search(args) => search::run(args, &ctx).await,
        Command::Network(args) => network::run(args, &ctx).await,
        Command::Status(args) => status::run(args, &ctx).await,
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

/// Shorten `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let kept: String = flat.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
