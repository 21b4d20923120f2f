//! Cross-project sharing statistics.
//!
//! Each report maps an entity name (or `table.column` for columns) to the set
//! of projects containing it, keeps the names found in more than one project,
//! and ranks them by project count.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::StoreError;
use crate::store::MetadataStore;
use crate::types::{CatalogEntry, EntityKind, MeasureInfo, SharedEntity, TableInfo};

/// Decode one JSON blob column. NULL decodes to an empty list; a corrupt blob
/// is logged and also treated as empty so one bad project cannot sink a report.
pub fn decode_blob<T: DeserializeOwned>(
    project: &str,
    column: &'static str,
    blob: Option<&str>,
) -> Vec<T> {
    let Some(text) = blob else {
        return Vec::new();
    };
    match serde_json::from_str(text) {
        Ok(items) => items,
        Err(source) => {
            let err = StoreError::CorruptBlob {
                project: project.to_string(),
                column,
                source,
            };
            warn!(%err, "Skipping unreadable project data");
            Vec::new()
        }
    }
}

/// Tables stored for `entry`, empty when missing or unreadable.
pub fn decode_tables(entry: &CatalogEntry) -> Vec<TableInfo> {
    decode_blob(&entry.project, "tables_data", entry.tables.as_deref())
}

/// Measures stored for `entry`, empty when missing or unreadable.
pub fn decode_measures(entry: &CatalogEntry) -> Vec<MeasureInfo> {
    decode_blob(&entry.project, "measures_data", entry.measures.as_deref())
}

fn entity_keys(entry: &CatalogEntry, kind: EntityKind) -> Vec<String> {
    match kind {
        EntityKind::Table => decode_tables(entry).into_iter().map(|t| t.name).collect(),
        EntityKind::Measure => decode_measures(entry).into_iter().map(|m| m.name).collect(),
        EntityKind::Column => decode_tables(entry)
            .into_iter()
            .flat_map(|t| {
                t.columns
                    .into_iter()
                    .map(move |c| format!("{}.{}", t.name, c.name))
            })
            .collect(),
    }
}

/// Entities of `kind` that appear in more than one project.
///
/// Ordered by project count descending, then name ascending.
pub fn compute_shared(catalog: &[CatalogEntry], kind: EntityKind) -> Vec<SharedEntity> {
    let mut owners: BTreeMap<String, BTreeSet<&str>> = BTreeMap::new();
    for entry in catalog {
        for key in entity_keys(entry, kind) {
            owners.entry(key).or_default().insert(entry.project.as_str());
        }
    }

    let mut shared: Vec<SharedEntity> = owners
        .into_iter()
        .filter(|(_, projects)| projects.len() > 1)
        .map(|(name, projects)| SharedEntity {
            name,
            project_count: projects.len(),
            projects: projects.into_iter().collect::<Vec<_>>().join(", "),
        })
        .collect();

    // BTreeMap iteration already yields names in ascending order.
    shared.sort_by(|a, b| b.project_count.cmp(&a.project_count));
    shared
}

pub async fn shared_entities(
    store: &dyn MetadataStore,
    kind: EntityKind,
) -> crate::error::Result<Vec<SharedEntity>> {
    let catalog = store.load_catalog().await?;
    Ok(compute_shared(&catalog, kind))
}

pub async fn shared_tables(store: &dyn MetadataStore) -> crate::error::Result<Vec<SharedEntity>> {
    shared_entities(store, EntityKind::Table).await
}

pub async fn shared_measures(
    store: &dyn MetadataStore,
) -> crate::error::Result<Vec<SharedEntity>> {
    shared_entities(store, EntityKind::Measure).await
}

pub async fn shared_columns(
    store: &dyn MetadataStore,
) -> crate::error::Result<Vec<SharedEntity>> {
    shared_entities(store, EntityKind::Column).await
}
