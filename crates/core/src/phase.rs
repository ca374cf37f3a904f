//! Phases of the improvement cycle.

use serde::{Deserialize, Serialize};

/// One step of the improvement cycle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Run tests and gather telemetry
    Test,
    /// Turn test metrics into findings
    Analyze,
    /// Apply changes suggested by the findings
    Apply,
    /// Finalize the current generation
    Advance,
    /// Regression-check the finalized generation
    Validate,
}

impl Phase {
    /// Every phase, in cycle order.
    pub const ALL: [Phase; 5] = [
        Phase::Test,
        Phase::Analyze,
        Phase::Apply,
        Phase::Advance,
        Phase::Validate,
    ];

    /// The phase that follows this one, or `None` after VALIDATE.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Test => Some(Phase::Analyze),
            Phase::Analyze => Some(Phase::Apply),
            Phase::Apply => Some(Phase::Advance),
            Phase::Advance => Some(Phase::Validate),
            Phase::Validate => None,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Phase::Test => "TEST",
            Phase::Analyze => "ANALYZE",
            Phase::Apply => "APPLY",
            Phase::Advance => "ADVANCE",
            Phase::Validate => "VALIDATE",
        })
    }
}
