use std::fmt::Write as _;

use anyhow::Context as _;
use clap::{Args, ValueEnum};

use pbilens_core::index::shared_entities;
use pbilens_core::types::{EntityKind, SharedEntity};

use super::{Context, print_json};

#[derive(Args, Debug)]
pub struct SharedArgs {
    /// Which entity names to compare across projects
    #[arg(value_enum)]
    pub kind: SharedKind,

    /// Show at most N rows (default: report.top_n; 0 = all)
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharedKind {
    Tables,
    Measures,
    Columns,
}

impl From<SharedKind> for EntityKind {
    fn from(kind: SharedKind) -> Self {
        match kind {
            SharedKind::Tables => Self::Table,
            SharedKind::Measures => Self::Measure,
            SharedKind::Columns => Self::Column,
        }
    }
}

pub async fn run(args: SharedArgs, ctx: &Context) -> anyhow::Result<()> {
    let kind = EntityKind::from(args.kind);
    let mut rows = shared_entities(&ctx.store, kind)
        .await
        .with_context(|| format!("Failed to compute shared {kind}s"))?;

    let limit = args.limit.unwrap_or(ctx.config.report.top_n);
    if limit > 0 {
        rows.truncate(limit);
    }

    if ctx.json() {
        return print_json(&rows);
    }
    print!("{}", render_text(kind, &rows));
    Ok(())
}

fn render_text(kind: EntityKind, rows: &[SharedEntity]) -> String {
    if rows.is_empty() {
        return format!("No {kind} appears in more than one project.\n");
    }
    let width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max(kind.as_str().len());

    let mut out = String::new();
    let heading = {
        let mut h = kind.as_str().to_string();
        h[..1].make_ascii_uppercase();
        h
    };
    let _ = writeln!(out, "{heading:<width$}  Count  Projects");
    for r in rows {
        let _ = writeln!(
            out,
            "{:<width$}  {:>5}  {}",
            r.name, r.project_count, r.projects
        );
    }
    out
}
