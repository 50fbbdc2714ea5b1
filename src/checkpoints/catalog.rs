//! The checkpoint catalog: the fixed, ordered curriculum.
//!
//! Progresses linearly: Welcome → TargetIdentified → ProblemDiscovered →
//! ProblemValidated → SolutionDesigned → BuildingStarted → PrototypeWorking →
//! Deployed → FeedbackCollected → PortfolioCreated → Completed.
//!
//! Name-based lookups treat an unknown name as a normal outcome (`None`,
//! `Locked`, `0`), never as an error.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The stages of the curriculum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    Welcome,
    TargetIdentified,
    ProblemDiscovered,
    ProblemValidated,
    SolutionDesigned,
    BuildingStarted,
    PrototypeWorking,
    Deployed,
    FeedbackCollected,
    PortfolioCreated,
    Completed,
}

impl Checkpoint {
    /// The first checkpoint every student starts at.
    pub const FIRST: Checkpoint = Checkpoint::Welcome;

    /// Stable storage/wire name.
    pub fn as_str(&self) -> &'static str {
        self.definition().name
    }

    /// The catalog entry for this checkpoint.
    pub fn definition(&self) -> &'static CheckpointDefinition {
        // The catalog lists every variant in declaration order.
        &CATALOG[*self as usize]
    }

    /// Get the next checkpoint in the linear progression, if any.
    pub fn next(&self) -> Option<Checkpoint> {
        CATALOG.get(*self as usize + 1).map(|d| d.checkpoint)
    }

    /// Get the previous checkpoint, if any.
    pub fn previous(&self) -> Option<Checkpoint> {
        (*self as usize)
            .checked_sub(1)
            .and_then(|i| CATALOG.get(i))
            .map(|d| d.checkpoint)
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Checkpoint) -> bool {
        target.definition().order == self.definition().order + 1
    }

    /// Whether this checkpoint has no outgoing edge.
    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown checkpoint: {0}")]
pub struct UnknownCheckpoint(pub String);

impl FromStr for Checkpoint {
    type Err = UnknownCheckpoint;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        lookup(s)
            .map(|d| d.checkpoint)
            .ok_or_else(|| UnknownCheckpoint(s.to_string()))
    }
}

/// An immutable catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointDefinition {
    #[serde(skip)]
    pub checkpoint: Checkpoint,
    pub name: &'static str,
    pub title: &'static str,
    pub week: u8,
    pub order: u8,
    pub description: &'static str,
}

/// Position of a checkpoint relative to a student's current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Completed,
    Current,
    Locked,
}

/// A catalog entry annotated with its status for one student.
#[derive(Debug, Clone, Serialize)]
pub struct CheckpointWithStatus {
    #[serde(flatten)]
    pub definition: &'static CheckpointDefinition,
    pub status: CheckpointStatus,
}

/// All checkpoints in order.
pub static CATALOG: [CheckpointDefinition; 11] = [
    CheckpointDefinition {
        checkpoint: Checkpoint::Welcome,
        name: "welcome",
        title: "Welcome!",
        week: 1,
        order: 1,
        description: "Introduction and getting started",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::TargetIdentified,
        name: "target_identified",
        title: "Target Person Identified",
        week: 1,
        order: 2,
        description: "Choose who you want to help",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::ProblemDiscovered,
        name: "problem_discovered",
        title: "Problem Discovered",
        week: 1,
        order: 3,
        description: "Find a real daily problem",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::ProblemValidated,
        name: "problem_validated",
        title: "Problem Validated",
        week: 1,
        order: 4,
        description: "Confirm the problem is AI-solvable",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::SolutionDesigned,
        name: "solution_designed",
        title: "Solution Designed",
        week: 2,
        order: 5,
        description: "Choose solution type and tools",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::BuildingStarted,
        name: "building_started",
        title: "Building Started",
        week: 2,
        order: 6,
        description: "Begin creating your solution",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::PrototypeWorking,
        name: "prototype_working",
        title: "Working Prototype",
        week: 2,
        order: 7,
        description: "Your solution works!",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::Deployed,
        name: "deployed",
        title: "Deployed to User",
        week: 3,
        order: 8,
        description: "Give it to your target person",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::FeedbackCollected,
        name: "feedback_collected",
        title: "Feedback Collected",
        week: 3,
        order: 9,
        description: "Get real usage feedback",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::PortfolioCreated,
        name: "portfolio_created",
        title: "Portfolio Created",
        week: 3,
        order: 10,
        description: "Document your amazing work",
    },
    CheckpointDefinition {
        checkpoint: Checkpoint::Completed,
        name: "completed",
        title: "Journey Completed!",
        week: 3,
        order: 11,
        description: "You did it!",
    },
];

/// Get a checkpoint definition by name.
pub fn lookup(name: &str) -> Option<&'static CheckpointDefinition> {
    CATALOG.iter().find(|d| d.name == name)
}

/// The definition following `name`, or `None` at the end or for unknown names.
pub fn next(name: &str) -> Option<&'static CheckpointDefinition> {
    lookup(name)?.checkpoint.next().map(|c| c.definition())
}

/// The definition preceding `name`, or `None` at the start or for unknown names.
pub fn previous(name: &str) -> Option<&'static CheckpointDefinition> {
    lookup(name)?.checkpoint.previous().map(|c| c.definition())
}

/// All checkpoints belonging to a week, in order.
pub fn by_week(week: u8) -> Vec<&'static CheckpointDefinition> {
    CATALOG.iter().filter(|d| d.week == week).collect()
}

/// Week of a checkpoint, defaulting to week 1 for unknown names.
pub fn week_of(name: &str) -> u8 {
    lookup(name).map(|d| d.week).unwrap_or(1)
}

/// Percentage of the journey completed when sitting at `name`.
///
/// The first checkpoint is 0% and the last is 100%.
pub fn progress_percent(name: &str) -> u8 {
    let Some(def) = lookup(name) else {
        return 0;
    };
    let steps = (CATALOG.len() - 1) as f64;
    let done = f64::from(def.order - 1);
    (100.0 * done / steps).round() as u8
}

/// Status of `name` for a student currently at `current`.
pub fn status_of(name: &str, current: &str) -> CheckpointStatus {
    match (lookup(name), lookup(current)) {
        (Some(a), Some(b)) if a.order < b.order => CheckpointStatus::Completed,
        (Some(a), Some(b)) if a.order == b.order => CheckpointStatus::Current,
        _ => CheckpointStatus::Locked,
    }
}

/// Every checkpoint annotated with its status for a student at `current`.
pub fn with_status(current: &str) -> Vec<CheckpointWithStatus> {
    CATALOG
        .iter()
        .map(|definition| CheckpointWithStatus {
            definition,
            status: status_of(definition.name, current),
        })
        .collect()
}

/// Whether `to` is the immediate successor of `from`.
pub fn can_advance(from: &str, to: &str) -> bool {
    match (lookup(from), lookup(to)) {
        (Some(a), Some(b)) => a.checkpoint.can_transition_to(b.checkpoint),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_orders_are_contiguous_and_match_variants() {
        for (i, def) in CATALOG.iter().enumerate() {
            assert_eq!(def.order as usize, i + 1);
            assert_eq!(def.checkpoint as usize, i);
            assert_eq!(def.checkpoint.as_str(), def.name);
            assert!((1..=3).contains(&def.week));
        }
    }

    #[test]
    fn display_matches_serde() {
        for def in &CATALOG {
            let json = serde_json::to_string(&def.checkpoint).unwrap();
            assert_eq!(format!("\"{}\"", def.checkpoint), json);
            let parsed: Checkpoint = def.name.parse().unwrap();
            assert_eq!(parsed, def.checkpoint);
        }
    }

    #[test]
    fn previous_of_next_is_identity() {
        for def in &CATALOG {
            match next(def.name) {
                Some(n) => assert_eq!(previous(n.name).unwrap().name, def.name),
                None => assert_eq!(def.name, "completed"),
            }
        }
        assert!(previous("welcome").is_none());
        assert!(next("completed").is_none());
    }

    #[test]
    fn unknown_names_are_not_found() {
        assert!(lookup("graduation").is_none());
        assert!(next("graduation").is_none());
        assert!(previous("graduation").is_none());
        assert!("graduation".parse::<Checkpoint>().is_err());
        assert_eq!(week_of("graduation"), 1);
        assert_eq!(progress_percent("graduation"), 0);
    }

    #[test]
    fn progress_is_monotonic_from_zero_to_hundred() {
        let values: Vec<u8> = CATALOG.iter().map(|d| progress_percent(d.name)).collect();
        assert_eq!(values.first(), Some(&0));
        assert_eq!(values.last(), Some(&100));
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress_percent("problem_discovered"), 20);
        assert_eq!(progress_percent("building_started"), 50);
    }

    #[test]
    fn can_advance_only_to_immediate_successor() {
        for a in &CATALOG {
            for b in &CATALOG {
                assert_eq!(
                    can_advance(a.name, b.name),
                    b.order == a.order + 1,
                    "{} -> {}",
                    a.name,
                    b.name
                );
            }
        }
        assert!(!can_advance("welcome", "nowhere"));
        assert!(!can_advance("nowhere", "welcome"));
    }

    #[test]
    fn status_compares_orders() {
        assert_eq!(status_of("welcome", "deployed"), CheckpointStatus::Completed);
        assert_eq!(status_of("deployed", "deployed"), CheckpointStatus::Current);
        assert_eq!(status_of("completed", "deployed"), CheckpointStatus::Locked);
        assert_eq!(status_of("nowhere", "deployed"), CheckpointStatus::Locked);

        let listed = with_status("problem_validated");
        assert_eq!(listed.len(), CATALOG.len());
        assert_eq!(
            listed.iter().filter(|c| c.status == CheckpointStatus::Completed).count(),
            3
        );
        assert_eq!(listed[3].status, CheckpointStatus::Current);
    }

    #[test]
    fn weeks_partition_the_catalog() {
        let total: usize = (1..=3).map(|w| by_week(w).len()).sum();
        assert_eq!(total, CATALOG.len());
        let week_two: Vec<&str> = by_week(2).iter().map(|d| d.name).collect();
        assert_eq!(
            week_two,
            ["solution_designed", "building_started", "prototype_working"]
        );
        assert!(by_week(4).is_empty());
    }

    #[test]
    fn next_walks_all_checkpoints() {
        let mut current = Checkpoint::FIRST;
        let mut steps = 0;
        while let Some(n) = current.next() {
            assert!(current.can_transition_to(n));
            assert!(!n.can_transition_to(current));
            current = n;
            steps += 1;
        }
        assert_eq!(current, Checkpoint::Completed);
        assert!(current.is_terminal());
        assert_eq!(steps, CATALOG.len() - 1);
    }

    #[test]
    fn definition_serializes_without_variant() {
        let json = serde_json::to_value(Checkpoint::Deployed.definition()).unwrap();
        assert_eq!(json["name"], "deployed");
        assert_eq!(json["week"], 3);
        assert_eq!(json["order"], 8);
        assert!(json.get("checkpoint").is_none());
    }
}
