use std::fmt::Write as _;

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;

use pbilens_core::index::decode_blob;
use pbilens_core::store::MetadataStore;
use pbilens_core::types::{
    MeasureInfo, PowerQueryInfo, ProjectRef, RelationshipInfo, StoredProject, TableInfo,
};

use super::{Context, format_bytes, print_json, truncate};

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Project id or name
    pub project: ProjectRef,

    /// Print full DAX and M expressions instead of a one-line preview
    #[arg(long)]
    pub full: bool,
}

#[derive(Serialize)]
struct ProjectDetail {
    id: i64,
    name: String,
    file_path: String,
    file_hash: String,
    last_analyzed: String,
    model_size: u64,
    tables: Vec<TableInfo>,
    measures: Vec<MeasureInfo>,
    relationships: Vec<RelationshipInfo>,
    queries: Vec<PowerQueryInfo>,
}

impl From<StoredProject> for ProjectDetail {
    fn from(p: StoredProject) -> Self {
        let blobs = &p.blobs;
        Self {
            tables: decode_blob(&p.name, "tables_data", blobs.tables.as_deref()),
            measures: decode_blob(&p.name, "measures_data", blobs.measures.as_deref()),
            relationships: decode_blob(
                &p.name,
                "relationships_data",
                blobs.relationships.as_deref(),
            ),
            queries: decode_blob(&p.name, "queries_data", blobs.queries.as_deref()),
            id: p.id.0,
            last_analyzed: p.last_analyzed.to_rfc3339(),
            model_size: p.model_size,
            name: p.name,
            file_path: p.file_path,
            file_hash: p.file_hash,
        }
    }
}

pub async fn run(args: ShowArgs, ctx: &Context) -> anyhow::Result<()> {
    let name = match &args.project {
        ProjectRef::Name(name) => Some(name.clone()),
        ProjectRef::Id(id) => ctx
            .store
            .list_projects()
            .await
            .context("Failed to list projects")?
            .into_iter()
            .find(|p| p.id == *id)
            .map(|p| p.name),
    };
    let project = match name {
        Some(name) => ctx
            .store
            .find_project(&name)
            .await
            .context("Failed to load project")?,
        None => None,
    };
    let Some(project) = project else {
        anyhow::bail!("Project not found: {}", args.project);
    };

    let detail = ProjectDetail::from(project);
    if ctx.json() {
        return print_json(&detail);
    }
    print!("{}", render_text(&detail, args.full));
    Ok(())
}

fn render_text(p: &ProjectDetail, full: bool) -> String {
    let preview = |text: &str| {
        if full {
            text.to_string()
        } else {
            truncate(text, 60)
        }
    };

    let mut out = String::new();
    let _ = writeln!(out, "{} (#{})", p.name, p.id);
    let _ = writeln!(out, "  File:     {}", p.file_path);
    let _ = writeln!(out, "  Hash:     {}", &p.file_hash[..p.file_hash.len().min(12)]);
    let _ = writeln!(out, "  Analyzed: {}", p.last_analyzed);
    let _ = writeln!(out, "  Size:     {}", format_bytes(p.model_size));

    let _ = writeln!(out, "\nTables ({}):", p.tables.len());
    for t in &p.tables {
        let _ = writeln!(
            out,
            "  {:<30} {:>9} rows  {:>3} columns",
            t.name, t.row_count, t.column_count
        );
    }

    let _ = writeln!(out, "\nMeasures ({}):", p.measures.len());
    for m in &p.measures {
        let _ = writeln!(out, "  {}[{}] = {}", m.table_name, m.name, preview(&m.expression));
    }

    let _ = writeln!(out, "\nRelationships ({}):", p.relationships.len());
    for r in &p.relationships {
        let _ = writeln!(
            out,
            "  {}[{}] -> {}[{}]  {}",
            r.from_table, r.from_column, r.to_table, r.to_column, r.cardinality
        );
    }

    if !p.queries.is_empty() {
        let _ = writeln!(out, "\nPower Queries ({}):", p.queries.len());
        for q in &p.queries {
            let _ = writeln!(out, "  {}: {}", q.name, preview(&q.expression));
        }
    }
    out
}
