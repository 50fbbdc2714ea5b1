//! Response interpreter: decides whether a turn completes its checkpoint.
//!
//! Each checkpoint has one rule in [`RULES`]. A rule looks at the student's
//! message and the mentor's reply (case-insensitive substring matching) and
//! yields extracted data plus an advance signal. The function is pure: the
//! same three inputs always give the same result.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::checkpoints::{self, Checkpoint};
use crate::model::{ExtractedData, keys};

/// Minimum length (in characters) of a message treated as a problem description.
pub const PROBLEM_DESCRIPTION_MIN_CHARS: usize = 20;

/// Outcome of interpreting one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    pub should_advance: bool,
    pub extracted: ExtractedData,
}

impl Interpretation {
    fn stay() -> Self {
        Self::default()
    }

    fn advance() -> Self {
        Self {
            should_advance: true,
            extracted: ExtractedData::new(),
        }
    }

    fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extracted.insert(key.to_string(), value.into());
        self
    }
}

/// The two texts of a turn.
#[derive(Debug, Clone, Copy)]
pub struct Turn<'a> {
    pub user: &'a str,
    pub reply: &'a str,
}

/// A case-insensitive "contains any of" matcher.
pub struct Keywords {
    regex: Regex,
}

impl Keywords {
    fn new(words: &[&str]) -> Self {
        let alternation = words
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        Self {
            regex: Regex::new(&format!("(?i)(?:{alternation})")).unwrap(),
        }
    }

    pub fn found_in(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// A keyword group that maps to an extracted value.
struct Choice {
    keywords: Keywords,
    value: &'static str,
    tool: Option<&'static str>,
}

impl Choice {
    fn new(words: &[&str], value: &'static str) -> Self {
        Self {
            keywords: Keywords::new(words),
            value,
            tool: None,
        }
    }

    fn with_tool(mut self, tool: &'static str) -> Self {
        self.tool = Some(tool);
        self
    }
}

// Order matters: the first matching group wins.
static TARGET_PEOPLE: LazyLock<Vec<Choice>> = LazyLock::new(|| {
    vec![
        Choice::new(&["parent", "mom", "dad"], "parent"),
        Choice::new(&["friend"], "friend"),
        Choice::new(&["sibling", "brother", "sister"], "sibling"),
        Choice::new(&["teacher"], "teacher"),
        Choice::new(&["myself", "self", "me"], "self"),
    ]
});

static SOLUTION_TYPES: LazyLock<Vec<Choice>> = LazyLock::new(|| {
    vec![
        Choice::new(&["chatbot", "option 1", "gpt"], "chatbot").with_tool("ChatGPT Custom GPT"),
        Choice::new(&["automation", "option 2", "zapier"], "automation").with_tool("Zapier"),
        Choice::new(&["generator", "option 3"], "generator").with_tool("ChatGPT Prompts"),
    ]
});

static PROBLEM_VALIDATION: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["perfect", "great problem", "problem statement"]));
static BUILD_STARTED: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["done", "ready", "created", "made"]));
static USER_SAYS_WORKS: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["works", "working", "done"]));
static MENTOR_CELEBRATES: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["works", "amazing", "congratulations"]));
static HANDED_OFF: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["gave", "showed", "shared", "using"]));
static USAGE: LazyLock<Keywords> = LazyLock::new(|| Keywords::new(&["used", "times"]));
static OUTCOME: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["said", "feedback", "loves"]));
static PORTFOLIO: LazyLock<Keywords> = LazyLock::new(|| Keywords::new(&["portfolio"]));
static PORTFOLIO_DONE: LazyLock<Keywords> =
    LazyLock::new(|| Keywords::new(&["complete", "done", "amazing"]));

/// One entry of the rule table.
pub struct CheckpointRule {
    pub checkpoint: Checkpoint,
    pub evaluate: fn(Turn<'_>) -> Interpretation,
}

/// The rule table. Checkpoints without an entry never advance.
pub static RULES: &[CheckpointRule] = &[
    CheckpointRule {
        checkpoint: Checkpoint::Welcome,
        evaluate: target_person_chosen,
    },
    CheckpointRule {
        checkpoint: Checkpoint::TargetIdentified,
        evaluate: problem_described,
    },
    CheckpointRule {
        checkpoint: Checkpoint::ProblemDiscovered,
        evaluate: problem_validated,
    },
    CheckpointRule {
        checkpoint: Checkpoint::ProblemValidated,
        evaluate: solution_chosen,
    },
    CheckpointRule {
        checkpoint: Checkpoint::SolutionDesigned,
        evaluate: build_started,
    },
    CheckpointRule {
        checkpoint: Checkpoint::BuildingStarted,
        evaluate: prototype_confirmed,
    },
    CheckpointRule {
        checkpoint: Checkpoint::PrototypeWorking,
        evaluate: handed_off,
    },
    CheckpointRule {
        checkpoint: Checkpoint::Deployed,
        evaluate: feedback_reported,
    },
    CheckpointRule {
        checkpoint: Checkpoint::FeedbackCollected,
        evaluate: portfolio_finished,
    },
    CheckpointRule {
        checkpoint: Checkpoint::PortfolioCreated,
        evaluate: journey_finished,
    },
];

/// The rule for a checkpoint, if it has one.
pub fn rule_for(checkpoint: Checkpoint) -> Option<&'static CheckpointRule> {
    RULES.iter().find(|r| r.checkpoint == checkpoint)
}

/// Interpret a turn taken while the student sat at `checkpoint_name`.
///
/// Unknown checkpoint names, and checkpoints without a rule, yield no
/// extraction and no advance.
pub fn interpret(checkpoint_name: &str, user_message: &str, reply: &str) -> Interpretation {
    checkpoints::lookup(checkpoint_name)
        .and_then(|d| rule_for(d.checkpoint))
        .map(|rule| {
            (rule.evaluate)(Turn {
                user: user_message,
                reply,
            })
        })
        .unwrap_or_default()
}

fn target_person_chosen(turn: Turn<'_>) -> Interpretation {
    TARGET_PEOPLE
        .iter()
        .find(|c| c.keywords.found_in(turn.user))
        .map(|c| Interpretation::advance().with(keys::TARGET_PERSON, c.value))
        .unwrap_or_else(Interpretation::stay)
}

fn problem_described(turn: Turn<'_>) -> Interpretation {
    if turn.user.chars().count() > PROBLEM_DESCRIPTION_MIN_CHARS && !turn.user.contains('?') {
        return Interpretation::stay().with(keys::PROBLEM_DESCRIPTION, turn.user);
    }
    // A description is only captured here; the stage is left on a later turn
    // once the mentor confirms the problem the same way the next stage does.
    if PROBLEM_VALIDATION.found_in(turn.reply) {
        Interpretation::advance()
    } else {
        Interpretation::stay()
    }
}

fn problem_validated(turn: Turn<'_>) -> Interpretation {
    if PROBLEM_VALIDATION.found_in(turn.reply) {
        Interpretation::advance().with(keys::PROBLEM_VALIDATED, true)
    } else {
        Interpretation::stay()
    }
}

fn solution_chosen(turn: Turn<'_>) -> Interpretation {
    SOLUTION_TYPES
        .iter()
        .find(|c| c.keywords.found_in(turn.user))
        .map(|c| {
            let result = Interpretation::advance().with(keys::SOLUTION_TYPE, c.value);
            match c.tool {
                Some(tool) => result.with(keys::PRIMARY_TOOL, tool),
                None => result,
            }
        })
        .unwrap_or_else(Interpretation::stay)
}

fn build_started(turn: Turn<'_>) -> Interpretation {
    if BUILD_STARTED.found_in(turn.user) {
        Interpretation::advance().with(keys::BUILD_STARTED, true)
    } else {
        Interpretation::stay()
    }
}

/// Both sides have to agree the prototype works.
fn prototype_confirmed(turn: Turn<'_>) -> Interpretation {
    if USER_SAYS_WORKS.found_in(turn.user) && MENTOR_CELEBRATES.found_in(turn.reply) {
        Interpretation::advance().with(keys::PROTOTYPE_COMPLETE, true)
    } else {
        Interpretation::stay()
    }
}

fn handed_off(turn: Turn<'_>) -> Interpretation {
    if HANDED_OFF.found_in(turn.user) {
        Interpretation::advance().with(keys::DEPLOYED, true)
    } else {
        Interpretation::stay()
    }
}

fn feedback_reported(turn: Turn<'_>) -> Interpretation {
    if USAGE.found_in(turn.user) && OUTCOME.found_in(turn.user) {
        Interpretation::advance().with(keys::FEEDBACK_COLLECTED, true)
    } else {
        Interpretation::stay()
    }
}

fn portfolio_finished(turn: Turn<'_>) -> Interpretation {
    if PORTFOLIO.found_in(turn.reply) && PORTFOLIO_DONE.found_in(turn.reply) {
        Interpretation::advance().with(keys::PORTFOLIO_COMPLETE, true)
    } else {
        Interpretation::stay()
    }
}

fn journey_finished(_turn: Turn<'_>) -> Interpretation {
    Interpretation::advance().with(keys::JOURNEY_COMPLETE, true)
}
