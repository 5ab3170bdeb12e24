//! Document ingestion: markdown cleanup, heading-aware chunking and the
//! chunk → embed → store pipeline.

pub mod cleaner;
pub mod core;
pub mod markdown;

pub use self::core::{IngestError, IngestOutcome, Ingestor};
