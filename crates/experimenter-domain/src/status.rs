use serde::{Deserialize, Serialize};

/// The status lifecycle of an experiment row (§4.3.3). `CreatedForExecution`
/// is a synonym of `Created` reserved for rows inserted one at a time
/// (§4.2 add single experiment) rather than via bulk backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Created,
    CreatedForExecution,
    Running,
    Done,
    Error,
    Paused,
}

impl Status {
    pub fn as_sql_str(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::CreatedForExecution => "created_for_execution",
            Status::Running => "running",
            Status::Done => "done",
            Status::Error => "error",
            Status::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Status> {
        match s {
            "created" => Some(Status::Created),
            "created_for_execution" => Some(Status::CreatedForExecution),
            "running" => Some(Status::Running),
            "done" => Some(Status::Done),
            "error" => Some(Status::Error),
            "paused" => Some(Status::Paused),
            _ => None,
        }
    }

    /// Whether a transition to `Done` or `Error` sets `end_date` (§3
    /// invariant; §11 decision: `Paused` is not terminal and does not set
    /// `end_date`).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }
}

/// A status filter used by reset operations (`reset_experiments`): either a
/// concrete status, or the pseudo-value `all`, which §3 forbids from ever
/// being persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    Specific(Status),
    All,
}

/// The outcome of one run of the user-supplied experiment routine. Replaces
/// exception-driven control flow at the worker boundary (§9): a routine
/// either finishes, fails with a diagnostic, or asks to be paused. A
/// routine that returns nothing is treated as `Done` by the worker that
/// calls it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutineOutcome {
    Done,
    Error(String),
    Paused,
}

impl RoutineOutcome {
    pub fn status(&self) -> Status {
        match self {
            RoutineOutcome::Done => Status::Done,
            RoutineOutcome::Error(_) => Status::Error,
            RoutineOutcome::Paused => Status::Paused,
        }
    }
}
