//! MentorOrchestrator: runs one conversational turn end to end.
//!
//! validate → lock student → load → build context → generate → interpret →
//! plan → commit. Turns for one student are serialised; different students
//! run in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::checkpoints::{self, CATALOG, Checkpoint, CheckpointWithStatus, greeting_for};
use crate::config::{CommitStrategy, MentorConfig};
use crate::error::{DatabaseError, LlmError, MentorError};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider};
use crate::mentor::context::ContextBuilder;
use crate::mentor::interpreter::interpret;
use crate::mentor::transition::{TurnCommit, TurnInput, plan_turn};
use crate::model::{
    EventType, ExtractedData, LedgerEntry, LedgerStatus, LifecycleEvent, Message, Project, Student,
};
use crate::store::Database;

/// Days of event history considered for the activity streak.
const STREAK_LOOKBACK_DAYS: i64 = 30;

/// Result of one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    #[serde(rename = "message")]
    pub reply: String,
    pub checkpoint_advanced: bool,
    pub new_checkpoint: Option<Checkpoint>,
}

/// Greeting for the student's current stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitialMessage {
    pub message: String,
    pub checkpoint: String,
}

/// Registration request.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub id: String,
    pub name: String,
    pub grade: Option<u8>,
}

/// Dashboard view of a student's journey.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub student: Student,
    pub progress: ProgressSummary,
    pub checkpoints: Vec<CheckpointWithStatus>,
    pub project: Option<Project>,
    pub conversation: ConversationView,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSummary {
    pub completed_checkpoints: usize,
    pub total_checkpoints: usize,
    pub percent_complete: u8,
    pub streak_days: u32,
    pub current_week: u8,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationView {
    pub messages: Vec<Message>,
    pub context: ExtractedData,
}

/// Per-student turn locks. Entries are dropped once nobody holds or waits
/// on them.
#[derive(Default)]
struct TurnLocks {
    inner: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

struct TurnGuard<'a> {
    locks: &'a TurnLocks,
    student_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TurnLocks {
    async fn acquire(&self, student_id: &str) -> TurnGuard<'_> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(student_id.to_string()).or_default().clone()
        };
        TurnGuard {
            locks: self,
            student_id: student_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut map = self.locks.inner.lock().unwrap_or_else(|e| e.into_inner());
        if map
            .get(&self.student_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.student_id);
        }
    }
}

/// Coordinates persistence, text generation and the checkpoint state machine.
pub struct MentorOrchestrator {
    db: Arc<dyn Database>,
    llm: Arc<dyn LlmProvider>,
    context: ContextBuilder,
    config: MentorConfig,
    locks: TurnLocks,
}

impl MentorOrchestrator {
    pub fn new(db: Arc<dyn Database>, llm: Arc<dyn LlmProvider>, config: MentorConfig) -> Self {
        Self {
            db,
            llm,
            context: ContextBuilder::new(config.history_window),
            config,
            locks: TurnLocks::default(),
        }
    }

    /// Process one student message and return the mentor's reply.
    ///
    /// Nothing is written when validation, lookup or generation fails.
    pub async fn handle_turn(
        &self,
        student_id: &str,
        message: &str,
    ) -> Result<TurnOutcome, MentorError> {
        let student_id = require_student_id(student_id)?;
        if message.trim().is_empty() {
            return Err(MentorError::Validation("Message is required".to_string()));
        }

        let _turn = self.locks.acquire(student_id).await;

        let student = self.load_student(student_id).await?;
        let conversation = self
            .db
            .latest_conversation(student_id, &student.current_checkpoint)
            .await?;
        let project = self.db.latest_project(student_id).await?;

        let context = self
            .context
            .build(&student, project.as_ref(), conversation.as_ref());
        let reply = self
            .generate(&context.system, &context.history, message)
            .await?;

        let interpretation = interpret(&student.current_checkpoint, message, &reply);
        debug!(
            student_id,
            checkpoint = %student.current_checkpoint,
            should_advance = interpretation.should_advance,
            extracted = interpretation.extracted.len(),
            "Turn interpreted"
        );

        let commit = plan_turn(TurnInput {
            student: &student,
            conversation: conversation.as_ref(),
            project: project.as_ref(),
            user_message: message,
            reply: &reply,
            interpretation,
        });
        self.commit(&commit).await?;

        if let Some(ref advance) = commit.advance {
            info!(
                student_id,
                from = %advance.from,
                to = %advance.to,
                "Checkpoint completed"
            );
        }

        Ok(TurnOutcome {
            reply,
            checkpoint_advanced: commit.advance.is_some(),
            new_checkpoint: commit.new_checkpoint(),
        })
    }

    /// Generate a mentor reply from the system block, history and latest message.
    pub async fn generate(
        &self,
        system: &str,
        history: &[ChatMessage],
        latest: &str,
    ) -> Result<String, LlmError> {
        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(latest));

        let request = CompletionRequest::new(messages)
            .with_system(system)
            .with_max_tokens(self.config.max_tokens);
        let response = self.llm.complete(request).await?;

        debug!(
            model = self.llm.model_name(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Mentor reply generated"
        );
        Ok(response.content)
    }

    /// The static greeting for the student's current stage. Writes nothing.
    pub async fn initial_message(&self, student_id: &str) -> Result<InitialMessage, MentorError> {
        let student_id = require_student_id(student_id)?;
        let student = self.load_student(student_id).await?;
        Ok(InitialMessage {
            message: greeting_for(&student.current_checkpoint, &student.name),
            checkpoint: student.current_checkpoint,
        })
    }

    /// Create a student at the first checkpoint.
    pub async fn register_student(&self, new: NewStudent) -> Result<Student, MentorError> {
        let student_id = require_student_id(&new.id)?;
        let name = new.name.trim();
        if name.is_empty() {
            return Err(MentorError::Validation("Name is required".to_string()));
        }

        let _turn = self.locks.acquire(student_id).await;

        if self.db.get_student(student_id).await?.is_some() {
            return Err(MentorError::StudentExists {
                id: student_id.to_string(),
            });
        }

        let student = Student::new(student_id, name, new.grade);
        self.db.create_student(&student).await.map_err(|e| match e {
            DatabaseError::Constraint(_) => MentorError::StudentExists {
                id: student_id.to_string(),
            },
            other => MentorError::Persistence(other),
        })?;

        let now = Utc::now();
        self.secondary(
            self.db
                .upsert_ledger_entry(&LedgerEntry::started(student_id, Checkpoint::FIRST, now))
                .await,
            "welcome ledger entry",
            student_id,
        )?;
        self.secondary(
            self.db
                .append_event(&LifecycleEvent::new(
                    student_id,
                    EventType::Signup,
                    json!({ "name": student.name, "grade": student.grade }),
                ))
                .await,
            "signup event",
            student_id,
        )?;

        info!(student_id, "Student registered");
        Ok(student)
    }

    /// Dashboard view: checkpoint statuses, counts, streak, project and the
    /// current conversation.
    pub async fn progress(&self, student_id: &str) -> Result<ProgressView, MentorError> {
        let student_id = require_student_id(student_id)?;
        let student = self.load_student(student_id).await?;
        let current = student.current_checkpoint.as_str();

        let project = self.db.latest_project(student_id).await?;
        let conversation = self.db.latest_conversation(student_id, current).await?;
        let completed = self
            .db
            .list_ledger_entries(student_id)
            .await?
            .iter()
            .filter(|e| e.status == LedgerStatus::Completed)
            .count();

        let now = Utc::now();
        let events = self
            .db
            .list_events(student_id, now - Duration::days(STREAK_LOOKBACK_DAYS))
            .await?;
        let streak = streak_days(
            events.iter().map(|e| e.created_at.date_naive()),
            now.date_naive(),
        );

        let (mut messages, context) = conversation
            .map(|c| (c.messages, c.context))
            .unwrap_or_default();
        if messages.is_empty() {
            messages.push(Message::assistant(greeting_for(current, &student.name)));
        }

        Ok(ProgressView {
            progress: ProgressSummary {
                completed_checkpoints: completed,
                total_checkpoints: CATALOG.len(),
                percent_complete: checkpoints::progress_percent(current),
                streak_days: streak,
                current_week: checkpoints::week_of(current),
            },
            checkpoints: checkpoints::with_status(current),
            project,
            conversation: ConversationView { messages, context },
            student,
        })
    }

    async fn load_student(&self, student_id: &str) -> Result<Student, MentorError> {
        self.db
            .get_student(student_id)
            .await?
            .ok_or_else(|| MentorError::StudentNotFound {
                id: student_id.to_string(),
            })
    }

    async fn commit(&self, commit: &TurnCommit) -> Result<(), MentorError> {
        match self.config.commit_strategy {
            CommitStrategy::Transactional => self.db.commit_turn(commit).await?,
            CommitStrategy::BestEffort => self.commit_best_effort(commit).await?,
        }
        Ok(())
    }

    /// Conversation and stage pointer writes must succeed; the rest is logged.
    async fn commit_best_effort(&self, commit: &TurnCommit) -> Result<(), DatabaseError> {
        let student_id = commit.student_id.as_str();
        let conversation = &commit.conversation;

        if commit.new_conversation {
            self.db.create_conversation(conversation).await?;
        }
        for message in &commit.appended {
            self.db.append_message(conversation.id, message).await?;
        }
        self.db
            .merge_conversation_context(conversation.id, &commit.extracted)
            .await?;
        if let Some(ref advance) = commit.advance {
            self.db.update_student(&advance.student).await?;
        }

        self.secondary(
            self.db.append_event(&commit.chat_event).await,
            "chat event",
            student_id,
        )?;

        if let Some(ref advance) = commit.advance {
            self.secondary(
                self.db.upsert_ledger_entry(&advance.completed).await,
                "completed ledger entry",
                student_id,
            )?;
            self.secondary(
                self.db.upsert_ledger_entry(&advance.started).await,
                "started ledger entry",
                student_id,
            )?;
            if let Some(ref project) = advance.project {
                self.secondary(
                    self.db.save_project(project).await,
                    "project",
                    student_id,
                )?;
            }
            self.secondary(
                self.db.append_event(&advance.event).await,
                "checkpoint_completed event",
                student_id,
            )?;
        }
        Ok(())
    }

    /// Under best-effort commits a failed secondary write is only logged.
    fn secondary(
        &self,
        result: Result<(), DatabaseError>,
        what: &str,
        student_id: &str,
    ) -> Result<(), DatabaseError> {
        match (result, self.config.commit_strategy) {
            (Ok(()), _) => Ok(()),
            (Err(e), CommitStrategy::BestEffort) => {
                warn!(student_id, error = %e, "Failed to record {what}");
                Ok(())
            }
            (Err(e), CommitStrategy::Transactional) => Err(e),
        }
    }
}

fn require_student_id(student_id: &str) -> Result<&str, MentorError> {
    let trimmed = student_id.trim();
    if trimmed.is_empty() {
        Err(MentorError::Unauthenticated)
    } else {
        Ok(trimmed)
    }
}

/// Consecutive active days ending today, or yesterday when today has no
/// activity yet.
pub fn streak_days(active: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> u32 {
    let days: std::collections::HashSet<NaiveDate> = active.into_iter().collect();

    let mut day = if days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) if days.contains(&yesterday) => yesterday,
            _ => return 0,
        }
    };

    let mut streak = 0;
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use chrono::DateTime;
    use uuid::Uuid;

    use super::*;
    use crate::llm::{CompletionResponse, Role};
    use crate::store::LibSqlBackend;

    /// Replies from a queue, falling back to a fixed reply. Records requests.
    #[derive(Default)]
    struct ScriptedLlm {
        replies: std::sync::Mutex<VecDeque<String>>,
        requests: std::sync::Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn with_replies(replies: &[&str]) -> Self {
            Self {
                replies: std::sync::Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
                requests: Default::default(),
            }
        }

        fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        fn model_name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            self.requests.lock().unwrap().push(request);
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "Tell me more!".to_string());
            Ok(CompletionResponse {
                content,
                ..Default::default()
            })
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmProvider for FailingLlm {
        fn model_name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            Err(LlmError::RequestFailed {
                provider: "test".into(),
                reason: "upstream down".into(),
            })
        }
    }

    /// Delegates to a real backend but refuses every ledger write.
    struct NoLedger(LibSqlBackend);

    #[async_trait]
    impl Database for NoLedger {
        async fn run_migrations(&self) -> Result<(), DatabaseError> {
            self.0.run_migrations().await
        }
        async fn get_student(&self, id: &str) -> Result<Option<Student>, DatabaseError> {
            self.0.get_student(id).await
        }
        async fn create_student(&self, student: &Student) -> Result<(), DatabaseError> {
            self.0.create_student(student).await
        }
        async fn update_student(&self, student: &Student) -> Result<(), DatabaseError> {
            self.0.update_student(student).await
        }
        async fn latest_conversation(
            &self,
            student_id: &str,
            checkpoint: &str,
        ) -> Result<Option<crate::model::Conversation>, DatabaseError> {
            self.0.latest_conversation(student_id, checkpoint).await
        }
        async fn create_conversation(
            &self,
            conversation: &crate::model::Conversation,
        ) -> Result<(), DatabaseError> {
            self.0.create_conversation(conversation).await
        }
        async fn append_message(&self, id: Uuid, message: &Message) -> Result<(), DatabaseError> {
            self.0.append_message(id, message).await
        }
        async fn merge_conversation_context(
            &self,
            id: Uuid,
            data: &ExtractedData,
        ) -> Result<(), DatabaseError> {
            self.0.merge_conversation_context(id, data).await
        }
        async fn upsert_ledger_entry(&self, _entry: &LedgerEntry) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("ledger is read-only".into()))
        }
        async fn list_ledger_entries(&self, student_id: &str) -> Result<Vec<LedgerEntry>, DatabaseError> {
            self.0.list_ledger_entries(student_id).await
        }
        async fn latest_project(&self, student_id: &str) -> Result<Option<Project>, DatabaseError> {
            self.0.latest_project(student_id).await
        }
        async fn save_project(&self, project: &Project) -> Result<(), DatabaseError> {
            self.0.save_project(project).await
        }
        async fn append_event(&self, event: &LifecycleEvent) -> Result<(), DatabaseError> {
            self.0.append_event(event).await
        }
        async fn list_events(
            &self,
            student_id: &str,
            since: DateTime<Utc>,
        ) -> Result<Vec<LifecycleEvent>, DatabaseError> {
            self.0.list_events(student_id, since).await
        }
        async fn commit_turn(&self, _commit: &TurnCommit) -> Result<(), DatabaseError> {
            Err(DatabaseError::Query("ledger is read-only".into()))
        }
    }

    fn config(strategy: CommitStrategy) -> MentorConfig {
        MentorConfig {
            commit_strategy: strategy,
            ..Default::default()
        }
    }

    async fn setup(llm: Arc<dyn LlmProvider>) -> (MentorOrchestrator, Arc<LibSqlBackend>) {
        let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let mentor = MentorOrchestrator::new(
            db.clone(),
            llm,
            config(CommitStrategy::Transactional),
        );
        mentor
            .register_student(NewStudent {
                id: "s1".into(),
                name: "Ada".into(),
                grade: Some(7),
            })
            .await
            .unwrap();
        (mentor, db)
    }

    async fn event_types(db: &LibSqlBackend, student_id: &str) -> Vec<String> {
        db.list_events(student_id, DateTime::<Utc>::MIN_UTC)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    // ── Registration and greeting ───────────────────────────────────

    #[tokio::test]
    async fn registration_seeds_ledger_and_signup_event() {
        let (mentor, db) = setup(Arc::new(ScriptedLlm::default())).await;

        let ledger = db.list_ledger_entries("s1").await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].checkpoint, "welcome");
        assert_eq!(ledger[0].status, LedgerStatus::InProgress);
        assert_eq!(event_types(&db, "s1").await, vec!["signup"]);

        let err = mentor
            .register_student(NewStudent {
                id: "s1".into(),
                name: "Ada again".into(),
                grade: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::StudentExists { .. }));
    }

    #[tokio::test]
    async fn registration_requires_name() {
        let (mentor, _db) = setup(Arc::new(ScriptedLlm::default())).await;
        let err = mentor
            .register_student(NewStudent {
                id: "s2".into(),
                name: "  ".into(),
                grade: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MentorError::Validation(_)));
    }

    #[tokio::test]
    async fn initial_message_writes_nothing() {
        let (mentor, db) = setup(Arc::new(ScriptedLlm::default())).await;
        let initial = mentor.initial_message("s1").await.unwrap();
        assert_eq!(initial.checkpoint, "welcome");
        assert!(initial.message.starts_with("Hey Ada! I'm Max"));

        assert!(db.latest_conversation("s1", "welcome").await.unwrap().is_none());
        assert_eq!(event_types(&db, "s1").await, vec!["signup"]);

        assert!(matches!(
            mentor.initial_message("nobody").await,
            Err(MentorError::StudentNotFound { .. })
        ));
    }

    // ── Turns ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn welcome_turn_advances() {
        let (mentor, db) = setup(Arc::new(ScriptedLlm::with_replies(&["Great choice!"]))).await;

        let outcome = mentor.handle_turn("s1", "my mom").await.unwrap();
        assert_eq!(outcome.reply, "Great choice!");
        assert!(outcome.checkpoint_advanced);
        assert_eq!(outcome.new_checkpoint, Some(Checkpoint::TargetIdentified));

        let student = db.get_student("s1").await.unwrap().unwrap();
        assert_eq!(student.current_checkpoint, "target_identified");
        assert_eq!(
            event_types(&db, "s1").await,
            vec!["signup", "chat_message", "checkpoint_completed"]
        );
        let project = db.latest_project("s1").await.unwrap().unwrap();
        assert_eq!(project.title, "AI Solution for parent");
    }

    #[tokio::test]
    async fn prompt_after_welcome_has_no_placeholder_facts() {
        let llm = Arc::new(ScriptedLlm::with_replies(&["Great choice!", "Tell me more."]));
        let (mentor, db) = setup(llm.clone()).await;

        mentor.handle_turn("s1", "my mom").await.unwrap();
        mentor
            .handle_turn("s1", "She keeps losing track of her weekly schedule")
            .await
            .unwrap();

        let system = llm.requests()[1].system.clone().unwrap();
        assert!(system.contains("- Target Person: parent"));
        assert!(!system.contains("Problem:"));
        assert!(!system.contains("Build Progress"));

        let project = db.latest_project("s1").await.unwrap().unwrap();
        assert_eq!(project.problem_statement_text(), None);
    }

    #[tokio::test]
    async fn non_advancing_turn_records_conversation() {
        let (mentor, db) = setup(Arc::new(ScriptedLlm::with_replies(&["Who do you want to help?"]))).await;

        let outcome = mentor.handle_turn("s1", "hi!").await.unwrap();
        assert!(!outcome.checkpoint_advanced);
        assert_eq!(outcome.new_checkpoint, None);

        let conv = db.latest_conversation("s1", "welcome").await.unwrap().unwrap();
        assert_eq!(conv.messages.len(), 2);
        assert_eq!(conv.messages[0].content, "hi!");
        assert_eq!(conv.messages[1].content, "Who do you want to help?");
    }

    #[tokio::test]
    async fn request_carries_prompt_and_history() {
        let llm = Arc::new(ScriptedLlm::with_replies(&["Hey!", "Sure"]));
        let (mentor, _db) = setup(llm.clone()).await;

        mentor.handle_turn("s1", "hi!").await.unwrap();
        mentor.handle_turn("s1", "hmm").await.unwrap();

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(requests[0].max_tokens, Some(1024));

        let second = &requests[1];
        assert!(second.system.as_deref().unwrap().contains("- Checkpoint: welcome"));
        let roles: Vec<_> = second.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(second.messages[2].content, "hmm");
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let (mentor, _db) = setup(Arc::new(ScriptedLlm::default())).await;

        assert!(matches!(
            mentor.handle_turn("", "hello").await,
            Err(MentorError::Unauthenticated)
        ));
        assert!(matches!(
            mentor.handle_turn("s1", "   ").await,
            Err(MentorError::Validation(_))
        ));
        assert!(matches!(
            mentor.handle_turn("ghost", "hello").await,
            Err(MentorError::StudentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn generation_failure_writes_nothing() {
        let (mentor, db) = setup(Arc::new(FailingLlm)).await;

        let err = mentor.handle_turn("s1", "my mom").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, MentorError::Generation(_)));

        assert!(db.latest_conversation("s1", "welcome").await.unwrap().is_none());
        assert_eq!(event_types(&db, "s1").await, vec!["signup"]);
        let student = db.get_student("s1").await.unwrap().unwrap();
        assert_eq!(student.current_checkpoint, "welcome");
    }

    #[tokio::test]
    async fn full_journey_reaches_completed() {
        let script = [
            ("my mom", "Great choice!", true),
            (
                "She always forgets to take her pills in the morning",
                "Tell me more about mornings.",
                false,
            ),
            (
                "yes, every day",
                "That's a great problem! Here's your problem statement.",
                true,
            ),
            ("yes", "Perfect, this is AI-solvable.", true),
            ("let's do option 2", "Zapier it is!", true),
            ("I created my account", "Nice work!", true),
            ("it works!", "Congratulations!", true),
            ("I showed it to her", "How did she react?", true),
            ("she used it 5 times and loves it", "Amazing!", true),
            ("ok", "Your portfolio is complete!", true),
            ("thanks", "You did it!", true),
        ];
        let replies: Vec<&str> = script.iter().map(|(_, r, _)| *r).collect();
        let (mentor, db) = setup(Arc::new(ScriptedLlm::with_replies(&replies))).await;

        let mut position = Checkpoint::Welcome;
        for (user, _, advances) in script {
            let outcome = mentor.handle_turn("s1", user).await.unwrap();
            assert_eq!(outcome.checkpoint_advanced, advances, "at {position} on {user:?}");
            if let Some(next) = outcome.new_checkpoint {
                position = next;
            }
        }
        assert_eq!(position, Checkpoint::Completed);

        let terminal = mentor.handle_turn("s1", "hi again").await.unwrap();
        assert!(!terminal.checkpoint_advanced);
        assert_eq!(terminal.new_checkpoint, None);

        let project = db.latest_project("s1").await.unwrap().unwrap();
        assert_eq!(project.target_person.as_deref(), Some("parent"));
        assert_eq!(
            project.problem_description.as_deref(),
            Some("She always forgets to take her pills in the morning")
        );
        assert_eq!(
            project.problem_statement_text(),
            Some("She always forgets to take her pills in the morning")
        );
        assert_eq!(project.solution_type.as_deref(), Some("automation"));
        assert_eq!(project.tools_used, vec!["Zapier"]);

        let view = mentor.progress("s1").await.unwrap();
        assert_eq!(view.progress.percent_complete, 100);
        assert_eq!(view.progress.completed_checkpoints, 10);
        assert_eq!(view.progress.current_week, 3);
        assert_eq!(view.student.current_checkpoint, "completed");
    }

    #[tokio::test]
    async fn concurrent_turns_never_double_advance() {
        let (mentor, db) = setup(Arc::new(ScriptedLlm::default())).await;
        let mentor = Arc::new(mentor);

        let a = tokio::spawn({
            let mentor = mentor.clone();
            async move { mentor.handle_turn("s1", "my mom").await }
        });
        let b = tokio::spawn({
            let mentor = mentor.clone();
            async move { mentor.handle_turn("s1", "my mom").await }
        });
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        assert_eq!(
            [a.checkpoint_advanced, b.checkpoint_advanced]
                .iter()
                .filter(|x| **x)
                .count(),
            1
        );
        let student = db.get_student("s1").await.unwrap().unwrap();
        assert_eq!(student.current_checkpoint, "target_identified");
        let completions = event_types(&db, "s1")
            .await
            .into_iter()
            .filter(|t| t == "checkpoint_completed")
            .count();
        assert_eq!(completions, 1);
        assert_eq!(mentor.locks.len(), 0);
    }

    #[tokio::test]
    async fn best_effort_survives_ledger_failures() {
        let db = Arc::new(NoLedger(LibSqlBackend::new_memory().await.unwrap()));
        let mentor = MentorOrchestrator::new(
            db.clone(),
            Arc::new(ScriptedLlm::with_replies(&["Great choice!"])),
            config(CommitStrategy::BestEffort),
        );
        mentor
            .register_student(NewStudent {
                id: "s1".into(),
                name: "Ada".into(),
                grade: None,
            })
            .await
            .unwrap();

        let outcome = mentor.handle_turn("s1", "my mom").await.unwrap();
        assert!(outcome.checkpoint_advanced);

        let student = db.get_student("s1").await.unwrap().unwrap();
        assert_eq!(student.current_checkpoint, "target_identified");
        assert!(db.list_ledger_entries("s1").await.unwrap().is_empty());
        assert!(db.latest_project("s1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn transactional_surfaces_commit_failure() {
        let db = Arc::new(NoLedger(LibSqlBackend::new_memory().await.unwrap()));
        db.create_student(&Student::new("s1", "Ada", None)).await.unwrap();
        let mentor = MentorOrchestrator::new(
            db.clone(),
            Arc::new(ScriptedLlm::default()),
            config(CommitStrategy::Transactional),
        );

        let err = mentor.handle_turn("s1", "my mom").await.unwrap_err();
        assert!(matches!(err, MentorError::Persistence(_)));
        assert!(!err.is_retryable());
    }

    // ── Progress ────────────────────────────────────────────────────

    #[tokio::test]
    async fn fresh_progress_view() {
        let (mentor, _db) = setup(Arc::new(ScriptedLlm::default())).await;
        let view = mentor.progress("s1").await.unwrap();

        assert_eq!(view.progress.percent_complete, 0);
        assert_eq!(view.progress.completed_checkpoints, 0);
        assert_eq!(view.progress.total_checkpoints, 11);
        assert_eq!(view.progress.current_week, 1);
        assert_eq!(view.progress.streak_days, 1);
        assert_eq!(view.checkpoints.len(), 11);
        assert!(view.project.is_none());
        assert_eq!(view.conversation.messages.len(), 1);
        assert!(view.conversation.messages[0].content.starts_with("Hey Ada!"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["progress"]["percentComplete"], 0);
        assert_eq!(json["checkpoints"][0]["status"], "current");
        assert_eq!(json["checkpoints"][1]["status"], "locked");
    }

    #[test]
    fn streak_counts_consecutive_days() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let day = |d| NaiveDate::from_ymd_opt(2026, 3, d).unwrap();

        assert_eq!(streak_days([], today), 0);
        assert_eq!(streak_days([day(10)], today), 1);
        assert_eq!(streak_days([day(10), day(9), day(8), day(6)], today), 3);
        assert_eq!(streak_days([day(9), day(8)], today), 2);
        assert_eq!(streak_days([day(8), day(7)], today), 0);
        assert_eq!(streak_days([day(10), day(10), day(9)], today), 2);
    }
}
