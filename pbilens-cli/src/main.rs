use anyhow::Context as _;
use clap::Parser;

use pbilens_core::error::{ConfigError, ExtractError, HashError, PbilensError, StoreError};

mod commands;

#[derive(Parser, Debug)]
#[command(
    name = "pbilens",
    version,
    about = "Analyze Power BI models and report what they share"
)]
struct Cli {
    #[command(subcommand)]
    command: commands::Command,

    #[command(flatten)]
    global: commands::GlobalOpts,
}

/// Message prefix for batches where some files failed and others succeeded.
pub const PARTIAL_SUCCESS: &str = "Partial success";

/// Classify an error into an exit code.
///
/// Exit codes:
///   0  success
///   1  general/unknown error
///   2  configuration error
///   4  database error
///   5  extraction error (timeout, extractor failure, extractor not found)
///   10 partial success (some files in a batch failed)
///
/// Typed errors anywhere in the chain decide first. Message text is only
/// consulted for errors that carry no pbilens error type, since paths and
/// extractor output are part of the text.
fn classify_exit_code(err: &anyhow::Error) -> i32 {
    if err.to_string().starts_with(PARTIAL_SUCCESS) {
        return 10;
    }
    if let Some(code) = err.chain().find_map(typed_exit_code) {
        return code;
    }

    let lower = format!("{err:#}").to_lowercase();
    if lower.contains("database") || lower.contains("sqlite") {
        4 // database error
    } else if lower.contains("config") {
        2 // config error
    } else if lower.contains("extraction") || lower.contains("extractor") {
        5 // extraction error
    } else {
        1 // general error
    }
}

fn typed_exit_code(cause: &(dyn std::error::Error + 'static)) -> Option<i32> {
    if let Some(err) = cause.downcast_ref::<PbilensError>() {
        return Some(match err {
            PbilensError::Extract(_) => 5,
            PbilensError::Store(_) => 4,
            PbilensError::Config(_) => 2,
            PbilensError::Hash(_) => 1,
        });
    }
    if cause.is::<ExtractError>() {
        Some(5)
    } else if cause.is::<StoreError>() {
        Some(4)
    } else if cause.is::<ConfigError>() {
        Some(2)
    } else if cause.is::<HashError>() {
        Some(1)
    } else {
        None
    }
}

/// Log filter implied by `-q` / `-v`; `RUST_LOG` overrides it.
fn log_filter(opts: &commands::GlobalOpts) -> &'static str {
    if opts.quiet {
        return "error";
    }
    match opts.verbose {
        0 => "warn",
        1 => "pbilens_core=info,pbilens=info,warn",
        2 => "pbilens_core=debug,pbilens=debug,info",
        _ => "trace",
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_filter(&cli.global)));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(cli.global.verbose > 1)
        .with_env_filter(filter)
        .init();

    let result = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to create runtime")
        .and_then(|rt| rt.block_on(commands::run(cli.command, cli.global)));

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(classify_exit_code(&e));
    }
}
