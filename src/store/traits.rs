//! `Database` trait: single async interface for all mentor persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::mentor::transition::TurnCommit;
use crate::model::{
    Conversation, ExtractedData, LedgerEntry, LifecycleEvent, Message, Project, Student,
};

/// Backend-agnostic database trait covering students, conversations, the
/// checkpoint ledger, projects and lifecycle events.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    // ── Students ────────────────────────────────────────────────────

    async fn get_student(&self, id: &str) -> Result<Option<Student>, DatabaseError>;

    /// Insert a new student. Fails with `Constraint` when the id is taken.
    async fn create_student(&self, student: &Student) -> Result<(), DatabaseError>;

    /// Overwrite a student's mutable fields.
    async fn update_student(&self, student: &Student) -> Result<(), DatabaseError>;

    // ── Conversations ───────────────────────────────────────────────

    /// The most recently created conversation for a student at a checkpoint,
    /// with its messages in append order.
    async fn latest_conversation(
        &self,
        student_id: &str,
        checkpoint: &str,
    ) -> Result<Option<Conversation>, DatabaseError>;

    /// Insert a conversation row. Messages are appended separately.
    async fn create_conversation(&self, conversation: &Conversation) -> Result<(), DatabaseError>;

    async fn append_message(
        &self,
        conversation_id: Uuid,
        message: &Message,
    ) -> Result<(), DatabaseError>;

    /// Merge data into a conversation's context. Incoming keys win.
    async fn merge_conversation_context(
        &self,
        conversation_id: Uuid,
        data: &ExtractedData,
    ) -> Result<(), DatabaseError>;

    // ── Checkpoint ledger ───────────────────────────────────────────

    /// Insert or update the entry for `(student_id, checkpoint)`. An existing
    /// `started_at` is kept.
    async fn upsert_ledger_entry(&self, entry: &LedgerEntry) -> Result<(), DatabaseError>;

    async fn list_ledger_entries(&self, student_id: &str) -> Result<Vec<LedgerEntry>, DatabaseError>;

    // ── Projects ────────────────────────────────────────────────────

    /// The student's most recently created project.
    async fn latest_project(&self, student_id: &str) -> Result<Option<Project>, DatabaseError>;

    /// Insert or update a project by id.
    async fn save_project(&self, project: &Project) -> Result<(), DatabaseError>;

    // ── Events ──────────────────────────────────────────────────────

    async fn append_event(&self, event: &LifecycleEvent) -> Result<(), DatabaseError>;

    /// Events for a student created at or after `since`, oldest first.
    async fn list_events(
        &self,
        student_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<LifecycleEvent>, DatabaseError>;

    // ── Turns ───────────────────────────────────────────────────────

    /// Apply every write of a planned turn atomically.
    async fn commit_turn(&self, commit: &TurnCommit) -> Result<(), DatabaseError>;
}
