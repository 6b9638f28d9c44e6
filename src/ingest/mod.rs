//! File ingestion
//!
//! Ingestion runs in two explicit stages:
//!
//! 1. [`ParallelIngestor::ingest`] decodes every file on a worker pool,
//!    isolating per-file failures into the [`IngestReport`].
//! 2. [`TableReconciler::reconcile`] merges the decoded tables that agree on
//!    the first non-empty header.

pub mod decode;
pub mod error;
pub mod format;
pub mod parallel;
pub mod reconcile;
pub mod source;

pub use decode::{DecodeOptions, Decoder, JsonShape, decoder_fn};
pub use error::{DecodeError, IngestError};
pub use format::{FileFormat, FormatResolver};
pub use parallel::{DecodedFile, FileFailure, IngestOutcome, IngestReport, ParallelIngestor};
pub use reconcile::TableReconciler;
pub use source::{Source, discover_files};
