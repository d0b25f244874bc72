//! Invite review: querying flagged invites and moving them through review.

pub mod query;
pub mod record_set;
pub mod workflow;

pub use query::{select, ReviewFilter, ReviewStats, StatusFilter};
pub use record_set::ReviewRecordSet;
pub use workflow::{ReviewWorkflow, WorkflowState};
