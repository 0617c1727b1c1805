//! Credit-metered export engine and its collaborators.
//!
//! [`engine`] runs the atomic unit of work (row resolution, conditional
//! credit deduction, saved-mark upsert, artifact generation, audit record,
//! delivery branching). [`artifact`] renders the tabular artifact;
//! [`storage`] and [`mailer`] are the narrow collaborator contracts the
//! engine calls through.

pub mod artifact;
pub mod engine;
pub mod mailer;
pub mod storage;

pub use engine::{ExportConfig, ExportEngine, ExportOutcome};
pub use mailer::{EmailAttachment, MailError, Mailer};
pub use storage::{ObjectStore, StorageError};
