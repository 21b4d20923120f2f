use anyhow::Context as _;
use clap::Args;

use pbilens_core::store::MetadataStore;
use pbilens_core::types::ProjectRef;

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Project id or name
    pub project: ProjectRef,
}

pub async fn run(args: DeleteArgs, ctx: &Context) -> anyhow::Result<()> {
    let deleted = ctx
        .store
        .delete_project(&args.project)
        .await
        .context("Failed to delete project")?;
    if !deleted {
        anyhow::bail!("Project not found: {}", args.project);
    }

    if ctx.json() {
        print_json(&serde_json::json!({ "deleted": args.project.to_string() }))?;
    } else if !ctx.quiet() {
        println!("Deleted project {}", args.project);
    }
    Ok(())
}
