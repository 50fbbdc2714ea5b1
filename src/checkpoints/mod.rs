//! Checkpoints: the fixed curriculum and the mentor guidance for each stage.
//!
//! Both tables are process-wide and immutable. Everything here is a pure
//! lookup; unknown names degrade to safe defaults instead of failing.

pub mod catalog;
pub mod guidance;

pub use catalog::{
    CATALOG, Checkpoint, CheckpointDefinition, CheckpointStatus, CheckpointWithStatus,
    UnknownCheckpoint, by_week, can_advance, lookup, next, previous, progress_percent, status_of,
    week_of, with_status,
};
pub use guidance::{StageGuidance, greeting_for, guidance_for};
