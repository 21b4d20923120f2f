//! pbilens core library: extraction, storage, and cross-project reports for
//! Power BI `.pbix` models.
//!
//! The main entry point is [`pipeline::AnalysisPipeline`], which hashes a
//! file, extracts its model through an [`extract::ExtractionBackend`], and
//! replaces the project in a [`store::MetadataStore`]. The [`index`],
//! [`search`], and [`network`] modules read the stored catalog back.

pub mod config;
pub mod error;
pub mod extract;
pub mod hash;
pub mod index;
pub mod network;
pub mod pipeline;
pub mod progress;
pub mod search;
pub mod store;
pub mod types;
