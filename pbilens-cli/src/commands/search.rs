use std::fmt::Write as _;

use anyhow::Context as _;
use clap::Args;

use pbilens_core::search::{ImpactReport, SearchScope, search_impact};

use super::{Context, print_json, truncate};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Name or text to look for (case-insensitive substring)
    pub term: String,

    /// Restrict the search: all, table, measure, or column
    #[arg(long, default_value_t = SearchScope::All)]
    pub scope: SearchScope,
}

pub async fn run(args: SearchArgs, ctx: &Context) -> anyhow::Result<()> {
    let report = search_impact(&ctx.store, &args.term, args.scope)
        .await
        .context("Failed to search projects")?;

    if ctx.json() {
        return print_json(&report);
    }
    print!("{}", render_text(&report));
    Ok(())
}

fn render_text(report: &ImpactReport) -> String {
    let mut out = String::new();
    if report.is_empty() {
        let _ = writeln!(
            out,
            "No matches for \"{}\" (scope: {}).",
            report.term, report.scope
        );
        return out;
    }
    let _ = writeln!(
        out,
        "{} matches for \"{}\" (scope: {})",
        report.total(),
        report.term,
        report.scope
    );

    if !report.tables.is_empty() {
        let _ = writeln!(out, "\nTables ({}):", report.tables.len());
        for m in &report.tables {
            let _ = writeln!(out, "  {}: {}", m.project, m.table);
        }
    }
    if !report.columns.is_empty() {
        let _ = writeln!(out, "\nColumns ({}):", report.columns.len());
        for m in &report.columns {
            let _ = writeln!(out, "  {}: {}[{}] ({})", m.project, m.table, m.column, m.data_type);
        }
    }
    if !report.measures.is_empty() {
        let _ = writeln!(out, "\nMeasures ({}):", report.measures.len());
        for m in &report.measures {
            let _ = writeln!(out, "  {}: {}[{}]", m.project, m.table, m.measure);
        }
    }
    if !report.dax_references.is_empty() {
        let _ = writeln!(out, "\nReferenced in DAX ({}):", report.dax_references.len());
        for m in &report.dax_references {
            let _ = writeln!(
                out,
                "  {}: {}[{}] = {}",
                m.project,
                m.table,
                m.measure,
                truncate(&m.expression, 60)
            );
        }
    }
    out
}
