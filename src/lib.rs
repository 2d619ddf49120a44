pub mod catalog;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod materialize;
mod metrics;
pub mod predict;
pub mod server;
pub mod utils;

pub use catalog::{Catalog, Stats, UnclassifiedBatch};
pub use config::Opts;
pub use db::{Image, ImageKey, ImageUpdate, NewImage, PopularTag, Tag};
pub use error::CatalogError;
pub use ingest::{Candidate, IngestConfig, IngestReport, Ingested, Ingestor, Relocation};
pub use materialize::{Materializer, Placement};
pub use predict::{CommandPredictor, TagPredictor};
