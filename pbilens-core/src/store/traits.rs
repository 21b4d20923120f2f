use crate::types::{
    CatalogEntry, NewProject, ProjectId, ProjectRef, ProjectSummary, StoredProject,
};

/// The metadata store abstraction. The pipeline, indexer, and search read and
/// write through this trait.
#[async_trait::async_trait]
pub trait MetadataStore: Send + Sync {
    // ── Writes ─────────────────────────────────────────────────────

    /// Replace all data for `project.name` in one transaction: any existing
    /// row with that name is deleted, then the new row is inserted.
    async fn upsert_project(&self, project: &NewProject) -> crate::error::Result<ProjectId>;

    /// Remove one project. Returns `false` when nothing matched.
    async fn delete_project(&self, project: &ProjectRef) -> crate::error::Result<bool>;

    /// Remove every project. Returns the number of rows deleted.
    async fn clear(&self) -> crate::error::Result<u64>;

    // ── Reads ──────────────────────────────────────────────────────

    /// Get a full project row by name.
    async fn find_project(&self, name: &str) -> crate::error::Result<Option<StoredProject>>;

    /// All projects, most recently analyzed first.
    async fn list_projects(&self) -> crate::error::Result<Vec<ProjectSummary>>;

    /// Name plus table/measure blobs for every project, in storage order.
    async fn load_catalog(&self) -> crate::error::Result<Vec<CatalogEntry>>;
}
