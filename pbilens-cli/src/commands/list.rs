use anyhow::Context as _;
use clap::Args;

use pbilens_core::store::MetadataStore;
use pbilens_core::types::ProjectSummary;

use super::{Context, format_bytes, print_json};

#[derive(Args, Debug)]
pub struct ListArgs {}

pub async fn run(_args: ListArgs, ctx: &Context) -> anyhow::Result<()> {
    let projects = ctx
        .store
        .list_projects()
        .await
        .context("Failed to list projects")?;

    if ctx.json() {
        return print_json(&projects);
    }
    print!("{}", render_text(&projects));
    Ok(())
}

fn render_text(projects: &[ProjectSummary]) -> String {
    use std::fmt::Write as _;

    if projects.is_empty() {
        return "No projects analyzed yet. Run `pbilens analyze <FILE.pbix>`.\n".to_string();
    }
    let width = projects
        .iter()
        .map(|p| p.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Project".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<4}  {:<width$}  {:>6}  {:>8}  {:>9}  Last analyzed",
        "Id", "Project", "Tables", "Measures", "Size"
    );
    for p in projects {
        let _ = writeln!(
            out,
            "{:<4}  {:<width$}  {:>6}  {:>8}  {:>9}  {}",
            p.id.0,
            p.name,
            p.table_count,
            p.measure_count,
            format_bytes(p.model_size),
            p.last_analyzed.format("%Y-%m-%d %H:%M"),
        );
    }
    out
}
