//! Context builder: assembles the mentor's system prompt and history window.

use crate::checkpoints::{self, guidance_for};
use crate::llm::ChatMessage;
use crate::model::{Conversation, MessageRole, Project, Student, keys};

/// Default number of most recent messages replayed to the model.
pub const DEFAULT_HISTORY_WINDOW: usize = 20;

/// Everything the model sees for one turn, minus the new user message.
#[derive(Debug, Clone)]
pub struct MentorContext {
    pub system: String,
    pub history: Vec<ChatMessage>,
}

/// Facts about the student's project, resolved from the stored records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFacts {
    pub target_person: Option<String>,
    pub problem_statement: Option<String>,
    pub solution_type: Option<String>,
    pub tools: Vec<String>,
    pub build_progress: Option<String>,
}

impl ProjectFacts {
    /// Resolve each fact from the project, then the conversation context,
    /// then the student's own profile. Blank values count as absent.
    pub fn resolve(
        student: &Student,
        project: Option<&Project>,
        conversation: Option<&Conversation>,
    ) -> Self {
        let from_context = |key: &str| {
            conversation
                .and_then(|c| c.context_str(key))
                .map(String::from)
        };

        let target_person = project
            .and_then(|p| non_blank(p.target_person.as_deref()))
            .or_else(|| from_context(keys::TARGET_PERSON))
            .or_else(|| non_blank(student.target_person.as_deref()));

        let problem_statement = project
            .and_then(|p| p.problem_statement_text())
            .map(String::from)
            .or_else(|| from_context(keys::PROBLEM_STATEMENT))
            .or_else(|| non_blank(student.problem_statement.as_deref()));

        let solution_type = project
            .and_then(|p| non_blank(p.solution_type.as_deref()))
            .or_else(|| from_context(keys::SOLUTION_TYPE))
            .or_else(|| non_blank(student.solution_type.as_deref()));

        let tools = match project {
            Some(p) if !p.tools_used.is_empty() => p.tools_used.clone(),
            _ => conversation
                .and_then(|c| c.context.get(keys::TOOLS_USED))
                .and_then(|v| v.as_array())
                .map(|tools| {
                    tools
                        .iter()
                        .filter_map(|t| t.as_str().map(String::from))
                        .collect()
                })
                .unwrap_or_else(|| student.tools_used.clone()),
        };

        let build_progress = project
            .and_then(|p| p.build_progress())
            .map(String::from)
            .or_else(|| from_context(keys::BUILD_PROGRESS))
            .or_else(|| non_blank(student.build_progress.as_deref()));

        Self {
            target_person,
            problem_statement,
            solution_type,
            tools,
            build_progress,
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// Builds per-turn mentor context.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    history_window: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_WINDOW)
    }
}

impl ContextBuilder {
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    /// Build the system prompt and the bounded history for one turn.
    pub fn build(
        &self,
        student: &Student,
        project: Option<&Project>,
        conversation: Option<&Conversation>,
    ) -> MentorContext {
        let facts = ProjectFacts::resolve(student, project, conversation);
        MentorContext {
            system: system_prompt(student, &facts),
            history: conversation
                .map(|c| self.history_window(c))
                .unwrap_or_default(),
        }
    }

    /// The most recent `history_window` messages, oldest first.
    pub fn history_window(&self, conversation: &Conversation) -> Vec<ChatMessage> {
        let skip = conversation
            .messages
            .len()
            .saturating_sub(self.history_window);
        conversation.messages[skip..]
            .iter()
            .map(|m| match m.role {
                MessageRole::User => ChatMessage::user(&m.content),
                MessageRole::Assistant => ChatMessage::assistant(&m.content),
            })
            .collect()
    }
}

/// Render the CURRENT STATE block. Absent facts are left out entirely.
pub fn state_section(student: &Student, facts: &ProjectFacts) -> String {
    let week = checkpoints::lookup(&student.current_checkpoint)
        .map(|d| d.week)
        .unwrap_or(student.current_week);

    let mut parts = vec![
        "CURRENT STATE:".to_string(),
        format!("- Week: {week}/3"),
        format!("- Checkpoint: {}", student.current_checkpoint),
    ];

    if let Some(ref target) = facts.target_person {
        parts.push(format!("- Target Person: {target}"));
    }
    if let Some(ref problem) = facts.problem_statement {
        parts.push(format!("- Problem: \"{problem}\""));
    }
    if let Some(ref solution) = facts.solution_type {
        parts.push(format!("- Solution Type: {solution}"));
    }
    if !facts.tools.is_empty() {
        parts.push(format!("- Tools: {}", facts.tools.join(", ")));
    }
    if let Some(ref progress) = facts.build_progress {
        parts.push(format!("- Build Progress: {progress}"));
    }

    parts.join("\n")
}

/// Build the mentor system prompt for the student's current checkpoint.
///
/// Unknown checkpoints get the first stage's guidance.
pub fn system_prompt(student: &Student, facts: &ProjectFacts) -> String {
    let name = student.name.trim();
    let name = if name.is_empty() { "a student" } else { name };
    let guidance = guidance_for(&student.current_checkpoint);
    let state = state_section(student, facts);

    format!(
        "\
You are Max, an enthusiastic AI building mentor for {name}, a middle schooler (grades 6-8, ages 11-14).

{state}

YOUR PERSONALITY:
- Friendly peer, NOT a formal teacher
- Use simple language appropriate for 11-14 year olds
- Keep responses SHORT (2-4 sentences max, unless explaining steps)
- Use emojis sparingly but warmly (1-2 per message max)
- Celebrate every small win genuinely
- Never be condescending or patronizing
- Be patient when they're confused

YOUR CURRENT ROLE ({checkpoint}):
{instructions}

IMPORTANT RULES:
1. Ask ONE question at a time - don't overwhelm them
2. Give HINTS, not answers - guide them to discover
3. If they seem stuck 3+ times, offer to simplify or get human help
4. Always relate back to THEIR specific problem/person
5. Make them feel like they're building something REAL and important
6. When they complete a stage, celebrate and naturally transition to next

Remember: They're creating something a real person will use every day. This matters!",
        checkpoint = student.current_checkpoint,
        instructions = guidance.instructions,
    )
}
