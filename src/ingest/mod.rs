//! Bulk ingestion pipeline.
//!
//! Upload batches are normalized by [`clean`], streamed through the `COPY`
//! wire protocol into a transaction-scoped staging table, and merged into the
//! canonical tables by [`loader`] with two conflict policies selected per row
//! by whether the dedup key is present. One transaction per batch; any
//! failure rolls the whole batch back.

pub mod clean;
pub mod loader;

pub use loader::{BulkLoader, IncomingCompany, IncomingLead};
