use thiserror::Error;

use crate::environment::{Action, State};

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("{kind} reward states and values differ in length: {states} states, {values} values")]
    RewardLengthMismatch {
        kind: &'static str,
        states: usize,
        values: usize,
    },

    #[error("reward state {0} is also blocked")]
    BlockedRewardState(State),

    #[error("state {0} is flagged as both a positive and a negative reward state")]
    ConflictingRewardState(State),

    #[error("reward state {0} is listed more than once")]
    DuplicateRewardState(State),

    #[error("reward state {0} lies outside the grid")]
    RewardStateOutOfRange(State),

    #[error("noise {0} must lie in [0, 1]")]
    InvalidNoise(f64),

    #[error("empty axis range {axis}: [{low}, {high}]")]
    EmptyRange { axis: char, low: i32, high: i32 },

    #[error("initial state {0} is not part of the grid")]
    InvalidInitialState(State),

    #[error("initial state {0} is a reward state")]
    TerminalInitialState(State),

    #[error("grid has no non-terminal state to start from")]
    NoStartState,

    #[error("invalid learner parameter {name} = {value}: {expected}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("state {0} is not part of the grid")]
    UnknownState(State),

    #[error("action {action:?} is not available at {state}")]
    UnavailableAction { state: State, action: Action },

    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
