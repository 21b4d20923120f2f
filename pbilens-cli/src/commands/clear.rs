use anyhow::Context as _;
use clap::Args;

use pbilens_core::store::MetadataStore;

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct ClearArgs {
    /// Confirm removal of every stored project
    #[arg(long)]
    pub yes: bool,
}

pub async fn run(args: ClearArgs, ctx: &Context) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!(
            "Refusing to remove all projects from {} without --yes",
            ctx.db_path.display()
        );
    }
    let removed = ctx.store.clear().await.context("Failed to clear projects")?;

    if ctx.json() {
        print_json(&serde_json::json!({ "removed": removed }))?;
    } else if !ctx.quiet() {
        println!(
            "Removed {removed} project{}",
            if removed == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
