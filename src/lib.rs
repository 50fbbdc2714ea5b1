//! Checkpoint Mentor: a conversational guide through a fixed project
//! curriculum.

pub mod app;
pub mod checkpoints;
pub mod config;
pub mod error;
pub mod llm;
pub mod mentor;
pub mod model;
pub mod store;
