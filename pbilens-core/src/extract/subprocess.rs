use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ExtractionBackend;
use super::adapter::adapt_payload;
use super::envelope::{EnvelopeError, parse_envelope};
use crate::config::ExtractorConfig;
use crate::error::ExtractError;
use crate::types::ExtractedModel;

/// Probe run by the interpreter when no custom script is configured.
pub const PROBE_SCRIPT: &str = include_str!("probe.py");

/// Runs a probe script under an external interpreter and parses its envelope.
///
/// Invocation: `<interpreter> <script> <file.pbix> [<library_dir>]`.
#[derive(Debug, Clone)]
pub struct SubprocessBackend {
    config: ExtractorConfig,
}

/// Script location for one run. The embedded probe lives in a temporary file
/// that is removed when this is dropped.
#[derive(Debug)]
enum ProbeScript {
    Embedded(NamedTempFile),
    Custom(PathBuf),
}

impl ProbeScript {
    fn path(&self) -> &Path {
        match self {
            Self::Embedded(file) => file.path(),
            Self::Custom(path) => path,
        }
    }
}

impl SubprocessBackend {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    fn prepare_script(&self) -> Result<ProbeScript, ExtractError> {
        if let Some(custom) = &self.config.script {
            return Ok(ProbeScript::Custom(custom.clone()));
        }
        let mut file = tempfile::Builder::new()
            .prefix("pbilens-probe-")
            .suffix(".py")
            .tempfile()?;
        file.write_all(PROBE_SCRIPT.as_bytes())?;
        file.flush()?;
        Ok(ProbeScript::Embedded(file))
    }

    fn failure(path: &Path, reason: String, output: &std::process::Output) -> ExtractError {
        ExtractError::Failure {
            path: path.to_path_buf(),
            reason,
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

#[async_trait::async_trait]
impl ExtractionBackend for SubprocessBackend {
    fn name(&self) -> &'static str {
        "subprocess"
    }

    async fn extract(&self, path: &Path) -> Result<ExtractedModel, ExtractError> {
        let script = self.prepare_script()?;
        let timeout = self.config.timeout();

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(script.path()).arg(path);
        if let Some(dir) = &self.config.library_dir {
            cmd.arg(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            interpreter = %self.config.interpreter.display(),
            script = %script.path().display(),
            file = %path.display(),
            "Spawning extractor"
        );
        let child = cmd.spawn().map_err(|source| ExtractError::Spawn {
            program: self.config.interpreter.clone(),
            source,
        })?;

        // On timeout the child future is dropped, which kills the process.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(file = %path.display(), ?timeout, "Extractor timed out");
                return Err(ExtractError::Timeout {
                    path: path.to_path_buf(),
                    timeout,
                });
            }
        };
        drop(script);

        let stdout = String::from_utf8_lossy(&output.stdout);
        let envelope = parse_envelope(&stdout);

        if !output.status.success() {
            let reason = match &envelope {
                Err(EnvelopeError::Reported { message, .. }) => {
                    format!("{} ({message})", output.status)
                }
                _ => output.status.to_string(),
            };
            return Err(Self::failure(path, reason, &output));
        }

        let payload = envelope.map_err(|e| Self::failure(path, e.to_string(), &output))?;
        let model = adapt_payload(&payload);
        info!(
            file = %path.display(),
            tables = model.tables.len(),
            measures = model.measures.len(),
            relationships = model.relationships.len(),
            "Extracted model"
        );
        Ok(model)
    }
}
