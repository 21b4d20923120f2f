use anyhow::Context as _;
use clap::Args;
use serde::Serialize;

use pbilens_core::network::{DependencyNetwork, NetworkLink};

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct NetworkArgs {
    /// Show at most N links (default: report.top_n; 0 = all)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Serialize)]
struct NetworkSummary {
    projects: usize,
    links: usize,
    density: f64,
    top_links: Vec<NetworkLink>,
}

pub async fn run(args: NetworkArgs, ctx: &Context) -> anyhow::Result<()> {
    let network = DependencyNetwork::from_store(&ctx.store)
        .await
        .context("Failed to build dependency network")?;

    let mut links = network.links();
    let limit = args.limit.unwrap_or(ctx.config.report.top_n);
    if limit > 0 {
        links.truncate(limit);
    }

    let summary = NetworkSummary {
        projects: network.node_count(),
        links: network.edge_count(),
        density: network.density(),
        top_links: links,
    };

    if ctx.json() {
        return print_json(&summary);
    }

    println!("Dependency network");
    println!();
    println!("  Projects: {}", summary.projects);
    println!("  Links:    {}", summary.links);
    println!("  Density:  {:.3}", summary.density);
    if !summary.top_links.is_empty() {
        println!();
        println!("  Strongest links:");
        for link in &summary.top_links {
            println!(
                "    {} <-> {}  ({} shared: {})",
                link.source,
                link.target,
                link.weight,
                link.tables.join(", ")
            );
        }
    }
    Ok(())
}
