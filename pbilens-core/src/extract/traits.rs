use std::path::Path;

use crate::error::ExtractError;
use crate::types::ExtractedModel;

/// Anything that can turn a `.pbix` file into a typed model.
///
/// The rest of the crate depends only on this trait; the subprocess
/// implementation is one choice among several (in-process, RPC, fakes).
#[async_trait::async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Human-readable name for logs.
    fn name(&self) -> &'static str;

    /// Extract tables, measures, relationships, and queries from `path`.
    async fn extract(&self, path: &Path) -> Result<ExtractedModel, ExtractError>;
}
