//! The mentor: context assembly, reply interpretation, stage transitions and
//! the orchestrator that drives a turn through them, plus its HTTP surface.

pub mod context;
pub mod interpreter;
pub mod orchestrator;
pub mod routes;
pub mod transition;

pub use context::{ContextBuilder, MentorContext, ProjectFacts};
pub use interpreter::{Interpretation, interpret};
pub use orchestrator::{
    InitialMessage, MentorOrchestrator, NewStudent, ProgressSummary, ProgressView, TurnOutcome,
};
pub use routes::{MentorRouteState, mentor_routes};
pub use transition::{Advance, TurnCommit, TurnInput, plan_turn};
