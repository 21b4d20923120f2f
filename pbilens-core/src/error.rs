use std::path::PathBuf;
use std::time::Duration;

/// Top-level pbilens error type.
///
/// All fallible operations in `pbilens-core` return [`Result<T, PbilensError>`](Result).
/// Each variant wraps a domain-specific error enum, allowing callers to
/// match on the error source without losing type information. Variants are
/// transparent so an error chain names each failure once.
#[derive(thiserror::Error, Debug)]
pub enum PbilensError {
    /// The source file could not be read for hashing.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// Model extraction failed, timed out, or returned an unusable payload.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Error from the metadata store (`SQLite` operations, migrations).
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error in configuration parsing or validation.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors while computing a file's content digest.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The file could not be opened or read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the model extraction boundary.
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The external process did not finish within the configured bound.
    #[error("extraction of {} timed out after {}s", path.display(), timeout.as_secs())]
    Timeout { path: PathBuf, timeout: Duration },

    /// The external process ran but did not produce a usable payload.
    #[error("extraction of {} failed: {reason}", path.display())]
    Failure {
        path: PathBuf,
        reason: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// The extractor process could not be started.
    #[error("cannot start extractor `{}`: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem I/O error preparing the extraction (temporary script, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Full diagnostic text for a failed run, including captured output.
    pub fn diagnostics(&self) -> Option<String> {
        match self {
            Self::Failure {
                exit_code,
                stdout,
                stderr,
                ..
            } => {
                let code = exit_code.map_or_else(|| "none".to_string(), |c| c.to_string());
                Some(format!(
                    "Return code: {code}\nSTDOUT: {stdout}\nSTDERR: {stderr}"
                ))
            }
            _ => None,
        }
    }
}

/// Errors from the SQLite-backed metadata store.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Underlying `SQLite` operation failed.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema bootstrap or migration failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// JSON serialization of a project blob failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored JSON blob could not be decoded.
    #[error("corrupt {column} blob for project {project}: {source}")]
    CorruptBlob {
        project: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors in pbilens configuration parsing and validation.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The configuration file does not exist at the expected path.
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Configuration values are present but semantically invalid.
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// Configuration file syntax could not be parsed (TOML error).
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience alias for `Result<T, PbilensError>`.
pub type Result<T> = std::result::Result<T, PbilensError>;
