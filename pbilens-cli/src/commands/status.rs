use anyhow::Context as _;
use clap::Args;
use serde::Serialize;

use pbilens_core::pipeline::StoreOverview;

use super::{Context, format_bytes, print_json};

#[derive(Args, Debug)]
pub struct StatusArgs {}

#[derive(Serialize)]
struct Status<'a> {
    database: String,
    database_bytes: u64,
    extractor: &'a std::path::Path,
    timeout_secs: u64,
    #[serde(flatten)]
    overview: StoreOverview,
}

pub async fn run(_args: StatusArgs, ctx: &Context) -> anyhow::Result<()> {
    let overview = StoreOverview::load(&ctx.store)
        .await
        .context("Failed to read store overview")?;

    let status = Status {
        database: ctx.db_path.display().to_string(),
        database_bytes: ctx.store.db_size_bytes(),
        extractor: &ctx.config.extractor.interpreter,
        timeout_secs: ctx.config.extractor.timeout_secs,
        overview,
    };

    if ctx.json() {
        return print_json(&status);
    }

    println!("pbilens status");
    println!();
    println!("  Database:  {}", status.database);
    if status.database_bytes > 0 {
        println!("  Size:      {}", format_bytes(status.database_bytes));
    }
    println!(
        "  Extractor: {} (timeout {}s)",
        status.extractor.display(),
        status.timeout_secs
    );
    println!();
    println!("  Projects:  {}", overview.projects);
    println!("  Tables:    {}", overview.tables);
    println!("  Measures:  {}", overview.measures);
    println!("  Models:    {}", format_bytes(overview.total_bytes));
    Ok(())
}
