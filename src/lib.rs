//! Tabular Q-learning on a stochastic grid world.
//!
//! [`GridWorld`] precomputes the transition model once; [`TabularQLearner`]
//! runs a fixed number of epsilon-greedy Q-learning updates against it.

pub mod agent;
pub mod config;
pub mod environment;
pub mod error;
pub mod policy;
pub mod render;
pub mod rl;

pub use config::Config;
pub use environment::{Action, GridWorld, GridWorldConfig, NextStateSelection, State, ValueGrid};
pub use error::{Error, Result};
pub use policy::{DetPolicy, QTable};
pub use rl::{EpsilonGreedy, ExplorationStrategy, FitTrace, LearnerConfig, TabularQLearner, TraceRow};
