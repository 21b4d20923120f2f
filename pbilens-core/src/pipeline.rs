//! Analyze orchestration: hash → unchanged check → extract → replace.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::PbilensError;
use crate::extract::ExtractionBackend;
use crate::hash::hash_file;
use crate::progress::ProgressReporter;
use crate::store::MetadataStore;
use crate::types::{NewProject, ProjectId, ProjectSummary};

/// What analyzing one file did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "id", rename_all = "lowercase")]
pub enum AnalyzeOutcome {
    /// Same content hash as the stored project; nothing was written.
    Unchanged(ProjectId),
    /// The project row was written (new or replaced).
    Stored(ProjectId),
}

impl AnalyzeOutcome {
    pub fn id(self) -> ProjectId {
        match self {
            Self::Unchanged(id) | Self::Stored(id) => id,
        }
    }
}

/// Result for one file of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub project: String,
    pub result: Result<AnalyzeOutcome, PbilensError>,
}

/// Per-file results of [`AnalysisPipeline::analyze_batch`].
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    pub duration: Duration,
}

impl BatchReport {
    pub fn stored(&self) -> usize {
        self.count(|r| matches!(r, Ok(AnalyzeOutcome::Stored(_))))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|r| matches!(r, Ok(AnalyzeOutcome::Unchanged(_))))
    }

    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    fn count(&self, pred: impl Fn(&Result<AnalyzeOutcome, PbilensError>) -> bool) -> usize {
        self.files.iter().filter(|f| pred(&f.result)).count()
    }
}

/// Totals over every stored project.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreOverview {
    pub projects: usize,
    pub tables: u64,
    pub measures: u64,
    pub total_bytes: u64,
}

impl StoreOverview {
    pub fn from_projects(projects: &[ProjectSummary]) -> Self {
        projects.iter().fold(
            Self {
                projects: projects.len(),
                ..Self::default()
            },
            |acc, p| Self {
                tables: acc.tables + p.table_count,
                measures: acc.measures + p.measure_count,
                total_bytes: acc.total_bytes + p.model_size,
                ..acc
            },
        )
    }

    pub async fn load(store: &dyn MetadataStore) -> crate::error::Result<Self> {
        Ok(Self::from_projects(&store.list_projects().await?))
    }
}

/// Project name for a file when none is given: the file stem.
pub fn default_project_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().into_owned())
}

/// Runs analysis of `.pbix` files against one backend and one store.
pub struct AnalysisPipeline<'a> {
    backend: &'a dyn ExtractionBackend,
    store: &'a dyn MetadataStore,
}

impl std::fmt::Debug for AnalysisPipeline<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}

impl<'a> AnalysisPipeline<'a> {
    pub fn new(backend: &'a dyn ExtractionBackend, store: &'a dyn MetadataStore) -> Self {
        Self { backend, store }
    }

    /// Analyze one file. A failed extraction writes nothing, so any previous
    /// row for the project stays as it was.
    pub async fn analyze_file(
        &self,
        path: &Path,
        project_name: Option<&str>,
    ) -> crate::error::Result<AnalyzeOutcome> {
        let name = project_name.map_or_else(|| default_project_name(path), str::to_string);
        let file_hash = hash_file(path)?;

        if let Some(existing) = self.store.find_project(&name).await? {
            if existing.file_hash == file_hash {
                info!(project = %name, id = %existing.id, "Unchanged since last analysis");
                return Ok(AnalyzeOutcome::Unchanged(existing.id));
            }
        }

        let mut model = self.backend.extract(path).await?;
        model.recount();
        let model_size = std::fs::metadata(path)
            .map(|m| m.len())
            .unwrap_or(model.metadata.model_size);

        let project = NewProject {
            name,
            file_path: path.to_path_buf(),
            file_hash,
            last_analyzed: Utc::now(),
            model_size,
            model,
        };
        let id = self.store.upsert_project(&project).await?;
        info!(
            project = %project.name,
            %id,
            tables = project.model.tables.len(),
            measures = project.model.measures.len(),
            "Stored project"
        );
        Ok(AnalyzeOutcome::Stored(id))
    }

    /// Analyze files one after another. A failing file is recorded and the
    /// batch moves on.
    pub async fn analyze_batch(
        &self,
        files: &[PathBuf],
        reporter: &dyn ProgressReporter,
    ) -> BatchReport {
        let start = Instant::now();
        let mut report = BatchReport::default();
        reporter.begin(files.len() as u64);

        for path in files {
            let project = default_project_name(path);
            reporter.file_started(&project);
            let result = self.analyze_file(path, None).await;
            if let Err(e) = &result {
                warn!(file = %path.display(), error = %e, "Analysis failed");
            }
            reporter.file_finished(&project, result.is_ok());
            report.files.push(FileOutcome {
                path: path.clone(),
                project,
                result,
            });
        }

        reporter.finish();
        report.duration = start.elapsed();
        report
    }
}
