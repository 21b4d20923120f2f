pub mod adapter;
pub mod envelope;
pub mod subprocess;
mod traits;

pub use subprocess::SubprocessBackend;
pub use traits::ExtractionBackend;
