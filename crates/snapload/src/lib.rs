//! Host-side snapshot loader library.
//!
//! Wraps the core ingestion engine around an in-memory machine model so
//! snapshots can be loaded, inspected, and dumped without target hardware.

/// In-memory target machine model and recording switch port.
pub mod image;
pub use image::{MemoryImage, RestoredState};

/// File-level ingestion driver.
pub mod ingest;
pub use ingest::{ingest_snapshot, LoadOutcome};

#[cfg(test)]
use tempfile as _;
