//! Student, conversation, ledger, project and event records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::checkpoints::{self, Checkpoint};

/// Structured data pulled out of a conversation, keyed by camelCase names.
pub type ExtractedData = serde_json::Map<String, serde_json::Value>;

/// Keys used in [`ExtractedData`] and conversation context maps.
pub mod keys {
    pub const TARGET_PERSON: &str = "targetPerson";
    pub const PROBLEM_STATEMENT: &str = "problemStatement";
    pub const PROBLEM_DESCRIPTION: &str = "problemDescription";
    pub const PROBLEM_VALIDATED: &str = "problemValidated";
    pub const SOLUTION_TYPE: &str = "solutionType";
    pub const PRIMARY_TOOL: &str = "primaryTool";
    pub const TOOLS_USED: &str = "toolsUsed";
    pub const BUILD_PROGRESS: &str = "buildProgress";
    pub const BUILD_STARTED: &str = "buildStarted";
    pub const PROTOTYPE_COMPLETE: &str = "prototypeComplete";
    pub const DEPLOYED: &str = "deployed";
    pub const FEEDBACK_COLLECTED: &str = "feedbackCollected";
    pub const PORTFOLIO_COMPLETE: &str = "portfolioComplete";
    pub const JOURNEY_COMPLETE: &str = "journeyComplete";
}

/// A student working through the curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<u8>,
    pub current_checkpoint: String,
    pub current_week: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_statement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_progress: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Student {
    /// A freshly signed-up student sitting at the first checkpoint.
    pub fn new(id: impl Into<String>, name: impl Into<String>, grade: Option<u8>) -> Self {
        let first = Checkpoint::FIRST.definition();
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            grade,
            current_checkpoint: first.name.to_string(),
            current_week: first.week,
            target_person: None,
            problem_statement: None,
            problem_description: None,
            solution_type: None,
            primary_tool: None,
            tools_used: Vec::new(),
            build_progress: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The student's current checkpoint, if the stored name is in the catalog.
    pub fn checkpoint(&self) -> Option<Checkpoint> {
        checkpoints::lookup(&self.current_checkpoint).map(|d| d.checkpoint)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

/// One message in a conversation. Never modified after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The mentor conversation for one student within one checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub student_id: String,
    pub checkpoint: String,
    pub messages: Vec<Message>,
    /// Extracted-data cache; merged key by key, never replaced.
    pub context: ExtractedData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(student_id: impl Into<String>, checkpoint: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            checkpoint: checkpoint.into(),
            messages: Vec::new(),
            context: ExtractedData::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge extracted data into the context. Incoming keys win.
    pub fn merge_context(&mut self, data: &ExtractedData) {
        merge_into(&mut self.context, data);
    }

    /// Context value as a non-empty string.
    pub fn context_str(&self, key: &str) -> Option<&str> {
        self.context
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// Merge `incoming` into `target`, overwriting same-named keys.
pub fn merge_into(target: &mut ExtractedData, incoming: &ExtractedData) {
    for (key, value) in incoming {
        target.insert(key.clone(), value.clone());
    }
}

/// Completion state of a checkpoint for a student.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl LedgerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::NotStarted,
        }
    }
}

/// Historical record of one checkpoint for one student.
///
/// Keyed by `(student_id, checkpoint)`; writing the same key again updates
/// the row but keeps its original `started_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub student_id: String,
    pub checkpoint: String,
    pub week: u8,
    pub status: LedgerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub data: ExtractedData,
}

impl LedgerEntry {
    pub fn started(student_id: &str, checkpoint: Checkpoint, at: DateTime<Utc>) -> Self {
        Self {
            student_id: student_id.to_string(),
            checkpoint: checkpoint.as_str().to_string(),
            week: checkpoint.definition().week,
            status: LedgerStatus::InProgress,
            started_at: Some(at),
            completed_at: None,
            data: ExtractedData::new(),
        }
    }

    pub fn completed(
        student_id: &str,
        checkpoint: Checkpoint,
        data: ExtractedData,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id: student_id.to_string(),
            checkpoint: checkpoint.as_str().to_string(),
            week: checkpoint.definition().week,
            status: LedgerStatus::Completed,
            started_at: Some(at),
            completed_at: Some(at),
            data,
        }
    }
}

/// The thing a student is building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub student_id: String,
    pub title: String,
    pub problem_statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub problem_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution_type: Option<String>,
    pub tools_used: Vec<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Problem statement stored until the student describes the problem.
    pub const UNDEFINED_STATEMENT: &'static str = "To be defined";
    /// Status of a project nobody has started building.
    pub const INITIAL_STATUS: &'static str = "planning";

    /// Create a project from its first patch, deriving a title and problem statement.
    pub fn from_patch(student_id: &str, patch: &ProjectPatch) -> Self {
        let now = Utc::now();
        let mut project = Self {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            title: format!(
                "AI Solution for {}",
                patch.target_person.as_deref().unwrap_or("Someone")
            ),
            problem_statement: patch
                .problem_description
                .clone()
                .unwrap_or_else(|| Self::UNDEFINED_STATEMENT.to_string()),
            target_person: None,
            problem_description: None,
            solution_type: None,
            tools_used: Vec::new(),
            status: Self::INITIAL_STATUS.to_string(),
            created_at: now,
            updated_at: now,
        };
        project.apply(patch);
        project
    }

    /// Overwrite only the fields the patch supplies.
    pub fn apply(&mut self, patch: &ProjectPatch) {
        if let Some(ref target) = patch.target_person {
            self.target_person = Some(target.clone());
        }
        if let Some(ref description) = patch.problem_description {
            self.problem_description = Some(description.clone());
            if self.problem_statement_text().is_none() {
                self.problem_statement = description.clone();
            }
        }
        if let Some(ref solution) = patch.solution_type {
            self.solution_type = Some(solution.clone());
        }
        for tool in &patch.tools {
            if !self.tools_used.iter().any(|t| t == tool) {
                self.tools_used.push(tool.clone());
            }
        }
        self.updated_at = Utc::now();
    }

    /// The problem statement, unless it is still the stored default.
    pub fn problem_statement_text(&self) -> Option<&str> {
        Some(self.problem_statement.trim())
            .filter(|s| !s.is_empty() && *s != Self::UNDEFINED_STATEMENT)
    }

    /// Build progress, unless the project has not moved past its initial status.
    pub fn build_progress(&self) -> Option<&str> {
        Some(self.status.trim()).filter(|s| !s.is_empty() && *s != Self::INITIAL_STATUS)
    }
}

/// Project-shaped fields found in extracted data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectPatch {
    pub target_person: Option<String>,
    pub problem_description: Option<String>,
    pub solution_type: Option<String>,
    pub tools: Vec<String>,
}

impl ProjectPatch {
    pub fn from_extracted(data: &ExtractedData) -> Self {
        let text = |key: &str| {
            data.get(key)
                .and_then(|v| v.as_str())
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
        };
        Self {
            target_person: text(keys::TARGET_PERSON),
            problem_description: text(keys::PROBLEM_DESCRIPTION),
            solution_type: text(keys::SOLUTION_TYPE),
            tools: text(keys::PRIMARY_TOOL).into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.target_person.is_none()
            && self.problem_description.is_none()
            && self.solution_type.is_none()
            && self.tools.is_empty()
    }
}

/// Kinds of lifecycle events written by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Signup,
    ChatMessage,
    CheckpointCompleted,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::ChatMessage => "chat_message",
            Self::CheckpointCompleted => "checkpoint_completed",
        }
    }
}

/// Append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    pub id: Uuid,
    pub student_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LifecycleEvent {
    pub fn new(student_id: &str, event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            student_id: student_id.to_string(),
            event_type: event_type.as_str().to_string(),
            payload,
            created_at: Utc::now(),
        }
    }
}
