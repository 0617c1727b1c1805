//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to a logical area of the API (ingestion,
//! listings, exports, selection, saved marks) and exposes typed Rocket
//! handlers annotated with `#[openapi]` so `rocket_okapi` can derive an
//! OpenAPI document automatically. Handlers stay thin: validation and
//! response shaping here, semantics in the core modules.

pub mod exports;
pub mod health;
pub mod ingest;
pub mod listings;
pub mod saved;
pub mod select;
