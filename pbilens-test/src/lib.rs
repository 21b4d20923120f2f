// Integration test utilities and fixture management for pbilens.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use pbilens_core::error::ExtractError;
use pbilens_core::extract::ExtractionBackend;
use pbilens_core::types::{
    ColumnInfo, ExtractedModel, MeasureInfo, ModelSummary, RelationshipInfo, TableInfo,
};

// ── Model builder ─────────────────────────────────────────────────

/// Fluent builder for [`ExtractedModel`] fixtures.
#[derive(Debug, Default)]
pub struct ModelBuilder {
    model: ExtractedModel,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[&str]) -> Self {
        self.model.tables.push(TableInfo {
            name: name.to_string(),
            row_count: 100,
            column_count: columns.len() as u64,
            columns: columns
                .iter()
                .map(|c| ColumnInfo {
                    name: (*c).to_string(),
                    data_type: "string".to_string(),
                    is_calculated: false,
                })
                .collect(),
        });
        self
    }

    pub fn measure(mut self, table: &str, name: &str, expression: &str) -> Self {
        self.model.measures.push(MeasureInfo {
            table_name: table.to_string(),
            name: name.to_string(),
            expression: expression.to_string(),
        });
        self
    }

    pub fn relationship(mut self, from: (&str, &str), to: (&str, &str)) -> Self {
        self.model.relationships.push(RelationshipInfo {
            from_table: from.0.to_string(),
            from_column: from.1.to_string(),
            to_table: to.0.to_string(),
            to_column: to.1.to_string(),
            cardinality: "M:1".to_string(),
        });
        self
    }

    pub fn build(mut self) -> ExtractedModel {
        self.model.metadata = ModelSummary {
            table_count: self.model.tables.len() as u64,
            measure_count: self.model.measures.len() as u64,
            relationship_count: self.model.relationships.len() as u64,
            model_size: 0,
        };
        self.model.schema = serde_json::Value::Array(Vec::new());
        self.model
    }
}

/// The three-project fixture used across tests:
/// `Sales` is in A and B only, `Total Revenue` is in A and C.
pub fn three_projects() -> Vec<(&'static str, ExtractedModel)> {
    vec![
        (
            "A",
            ModelBuilder::new()
                .table("Sales", &["Amount", "CustomerID"])
                .table("Customer", &["ID", "Region"])
                .measure("Sales", "Total Revenue", "SUM(Sales[Amount])")
                .relationship(("Sales", "CustomerID"), ("Customer", "ID"))
                .build(),
        ),
        (
            "B",
            ModelBuilder::new()
                .table("Sales", &["Amount"])
                .table("Budget", &["Amount"])
                .measure("Budget", "Budget Total", "SUM(Budget[Amount])")
                .build(),
        ),
        (
            "C",
            ModelBuilder::new()
                .table("Orders", &["Amount"])
                .measure("Orders", "Total Revenue", "SUM(Orders[Amount])")
                .build(),
        ),
    ]
}

// ── Fake extraction backend ───────────────────────────────────────

/// How the fake backend answers for one file stem.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    Model(ExtractedModel),
    Timeout,
    Failure(String),
}

/// In-process [`ExtractionBackend`] keyed by file stem. Stems without a
/// registered response fail.
#[derive(Debug, Default)]
pub struct FakeBackend {
    responses: Mutex<HashMap<String, FakeResponse>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, stem: &str, response: FakeResponse) {
        self.responses
            .lock()
            .unwrap()
            .insert(stem.to_string(), response);
    }

    pub fn with_model(self, stem: &str, model: ExtractedModel) -> Self {
        self.respond(stem, FakeResponse::Model(model));
        self
    }

    /// Paths passed to `extract`, in call order.
    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ExtractionBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedModel, ExtractError> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let response = self.responses.lock().unwrap().get(&stem).cloned();
        match response {
            Some(FakeResponse::Model(model)) => Ok(model),
            Some(FakeResponse::Timeout) => Err(ExtractError::Timeout {
                path: path.to_path_buf(),
                timeout: Duration::from_secs(30),
            }),
            Some(FakeResponse::Failure(reason)) => Err(ExtractError::Failure {
                path: path.to_path_buf(),
                reason,
                exit_code: Some(1),
                stdout: String::new(),
                stderr: String::new(),
            }),
            None => Err(ExtractError::Failure {
                path: path.to_path_buf(),
                reason: format!("no fake response for {stem}"),
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

// ── On-disk workspace ─────────────────────────────────────────────

/// A temporary directory holding `.pbix` stand-ins, a fake extractor
/// script, and a config file pointing at both.
#[derive(Debug)]
pub struct TestWorkspace {
    pub dir: tempfile::TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create tempdir");
        std::fs::create_dir_all(dir.path().join("fixtures")).unwrap();
        std::fs::create_dir_all(dir.path().join("reports")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn db_path(&self) -> PathBuf {
        self.path().join("powerbi_metadata.db")
    }

    /// Write an opaque `.pbix` stand-in under `reports/`.
    pub fn write_pbix(&self, stem: &str, contents: &[u8]) -> PathBuf {
        let path = self.path().join("reports").join(format!("{stem}.pbix"));
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Have the fake extractor print `SUCCESS:` + `model` for `stem`,
    /// preceded by some diagnostic noise.
    pub fn extractor_succeeds(&self, stem: &str, model: &ExtractedModel) {
        let payload = serde_json::json!({
            "tables": model.tables,
            "metadata": {"model_size": 4096},
            "schema": [],
            "measures": model.measures,
            "relationships": model.relationships,
            "queries": model.queries,
        });
        let out = format!("TABLES_TYPE: list\nloading {stem}\nSUCCESS:{payload}\n");
        std::fs::write(self.fixture(stem, "out"), out).unwrap();
    }

    /// Have the fake extractor report an `ERROR:` for `stem`.
    pub fn extractor_fails(&self, stem: &str, message: &str) {
        std::fs::write(self.fixture(stem, "out"), format!("ERROR:{message}\n")).unwrap();
    }

    /// Have the fake extractor hang for `stem` until it is killed.
    pub fn extractor_hangs(&self, stem: &str) {
        std::fs::write(self.fixture(stem, "sleep"), "").unwrap();
    }

    fn fixture(&self, stem: &str, ext: &str) -> PathBuf {
        self.path().join("fixtures").join(format!("{stem}.{ext}"))
    }

    /// Write the `sh` extractor script and a `pbilens.toml` that uses it.
    /// Returns the config path.
    pub fn write_config(&self, timeout_secs: u64) -> PathBuf {
        let fixtures = self.path().join("fixtures");
        let script = self.path().join("fake_extractor.sh");
        std::fs::write(
            &script,
            format!(
                r#"stem=$(basename "$1" .pbix)
dir='{}'
if [ -f "$dir/$stem.sleep" ]; then exec sleep 60; fi
if [ -f "$dir/$stem.out" ]; then cat "$dir/$stem.out"; exit 0; fi
echo "ERROR:no fixture for $stem"
"#,
                fixtures.display()
            ),
        )
        .unwrap();

        let config = self.path().join("pbilens.toml");
        std::fs::write(
            &config,
            format!(
                "[store]\ndb_path = '{}'\n\n[extractor]\ninterpreter = 'sh'\nscript = '{}'\ntimeout_secs = {timeout_secs}\n\n[report]\ntop_n = 0\n",
                self.db_path().display(),
                script.display()
            ),
        )
        .unwrap();
        config
    }
}
