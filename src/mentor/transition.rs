//! Checkpoint state machine.
//!
//! A turn is planned as a [`TurnCommit`] before anything is written, so the
//! transactional and best-effort commit paths apply the same record set.

use chrono::{DateTime, Utc};
use serde_json::json;

use crate::checkpoints::Checkpoint;
use crate::mentor::interpreter::Interpretation;
use crate::model::{
    Conversation, EventType, ExtractedData, LedgerEntry, LifecycleEvent, Message, Project,
    ProjectPatch, Student,
};

/// Every write produced by one conversational turn.
#[derive(Debug, Clone)]
pub struct TurnCommit {
    pub student_id: String,
    /// The conversation after the turn: both new messages appended and the
    /// extracted data merged into its context.
    pub conversation: Conversation,
    /// Whether `conversation` has to be inserted before its messages.
    pub new_conversation: bool,
    /// The two messages appended this turn, user first.
    pub appended: [Message; 2],
    /// Data extracted from this turn alone.
    pub extracted: ExtractedData,
    pub chat_event: LifecycleEvent,
    pub advance: Option<Advance>,
}

/// The writes of a single forward transition.
#[derive(Debug, Clone)]
pub struct Advance {
    pub from: Checkpoint,
    pub to: Checkpoint,
    /// Student with the stage pointer and week moved forward.
    pub student: Student,
    /// Ledger row for the checkpoint being left.
    pub completed: LedgerEntry,
    /// Ledger row for the checkpoint being entered.
    pub started: LedgerEntry,
    /// The project after merging, when the conversation carries project data.
    pub project: Option<Project>,
    pub event: LifecycleEvent,
}

impl TurnCommit {
    /// The checkpoint the student lands on, when the turn advanced.
    pub fn new_checkpoint(&self) -> Option<Checkpoint> {
        self.advance.as_ref().map(|a| a.to)
    }
}

/// Inputs to [`plan_turn`], as loaded at the start of the turn.
pub struct TurnInput<'a> {
    pub student: &'a Student,
    pub conversation: Option<&'a Conversation>,
    pub project: Option<&'a Project>,
    pub user_message: &'a str,
    pub reply: &'a str,
    pub interpretation: Interpretation,
}

/// Plan the writes for one turn.
pub fn plan_turn(input: TurnInput<'_>) -> TurnCommit {
    plan_turn_at(input, Utc::now())
}

fn plan_turn_at(input: TurnInput<'_>, now: DateTime<Utc>) -> TurnCommit {
    let TurnInput {
        student,
        conversation,
        project,
        user_message,
        reply,
        interpretation,
    } = input;

    let new_conversation = conversation.is_none();
    let mut conversation = conversation
        .cloned()
        .unwrap_or_else(|| Conversation::new(&student.id, &student.current_checkpoint));

    let mut user = Message::user(user_message);
    let mut assistant = Message::assistant(reply);
    user.timestamp = now;
    assistant.timestamp = now;
    conversation.messages.push(user.clone());
    conversation.messages.push(assistant.clone());
    conversation.merge_context(&interpretation.extracted);
    conversation.updated_at = now;

    let chat_event = LifecycleEvent::new(
        &student.id,
        EventType::ChatMessage,
        json!({
            "checkpoint": student.current_checkpoint,
            "messageLength": user_message.chars().count(),
        }),
    );

    let advance = if interpretation.should_advance {
        plan_advance(student, &conversation, project, &interpretation.extracted, now)
    } else {
        None
    };

    TurnCommit {
        student_id: student.id.clone(),
        conversation,
        new_conversation,
        appended: [user, assistant],
        extracted: interpretation.extracted,
        chat_event,
        advance,
    }
}

/// Plan a one-step transition. `None` at the terminal checkpoint or when the
/// stored checkpoint name is not in the catalog.
fn plan_advance(
    student: &Student,
    conversation: &Conversation,
    project: Option<&Project>,
    extracted: &ExtractedData,
    now: DateTime<Utc>,
) -> Option<Advance> {
    let from = student.checkpoint()?;
    let to = from.next()?;
    debug_assert!(from.can_transition_to(to));

    let mut moved = student.clone();
    moved.current_checkpoint = to.as_str().to_string();
    moved.current_week = to.definition().week;
    moved.updated_at = now;

    let patch = ProjectPatch::from_extracted(&conversation.context);
    let project = match project {
        _ if patch.is_empty() => None,
        Some(existing) => {
            let mut updated = existing.clone();
            updated.apply(&patch);
            Some(updated)
        }
        None => Some(Project::from_patch(&student.id, &patch)),
    };

    let event = LifecycleEvent::new(
        &student.id,
        EventType::CheckpointCompleted,
        json!({
            "checkpoint": from.as_str(),
            "nextCheckpoint": to.as_str(),
            "extractedData": extracted,
        }),
    );

    Some(Advance {
        from,
        to,
        student: moved,
        completed: LedgerEntry::completed(&student.id, from, extracted.clone(), now),
        started: LedgerEntry::started(&student.id, to, now),
        project,
        event,
    })
}
