//! JSON run configuration: an `env` block describing the world and a
//! `val_fn` block with the learner's hyper-parameters.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::environment::{GridWorld, GridWorldConfig, NextStateSelection, State};
use crate::error::{Error, Result};
use crate::rl::{LearnerConfig, TabularQLearner};

type Coord = (i32, i32);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSection {
    #[serde(default)]
    pub init_state: Option<Coord>,
    pub x_range: Coord,
    pub y_range: Coord,
    pub noise: f64,
    #[serde(default)]
    pub pos_rwd_state: Vec<Coord>,
    #[serde(default)]
    pub neg_rwd_states: Vec<Coord>,
    #[serde(default)]
    pub pos_rwd_vals: Vec<f64>,
    #[serde(default)]
    pub neg_rwd_vals: Vec<f64>,
    #[serde(default)]
    pub blocked_states: Vec<Coord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValFnSection {
    pub gamma: f64,
    pub max_iter: usize,
    pub epsilon_c: f64,
    pub alpha: f64,
    pub verbose: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub next_state: NextStateSelection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub env: EnvSection,
    pub val_fn: ValFnSection,
}

fn states(coords: Vec<Coord>) -> Vec<State> {
    coords.into_iter().map(State::from).collect()
}

impl From<EnvSection> for GridWorldConfig {
    fn from(env: EnvSection) -> Self {
        GridWorldConfig {
            x_range: env.x_range,
            y_range: env.y_range,
            noise: env.noise,
            pos_reward_states: states(env.pos_rwd_state),
            pos_reward_vals: env.pos_rwd_vals,
            neg_reward_states: states(env.neg_rwd_states),
            neg_reward_vals: env.neg_rwd_vals,
            blocked_states: states(env.blocked_states),
            init_state: env.init_state.map(State::from),
        }
    }
}

impl From<&ValFnSection> for LearnerConfig {
    fn from(val_fn: &ValFnSection) -> Self {
        LearnerConfig {
            gamma: val_fn.gamma,
            max_iter: val_fn.max_iter,
            c: val_fn.epsilon_c,
            alpha: val_fn.alpha,
            verbose: val_fn.verbose,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            operation: format!("read {}", path.display()),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Builds the world and a learner ready to fit it.
    pub fn into_parts(self) -> Result<(GridWorld, TabularQLearner)> {
        let mut learner = TabularQLearner::new(LearnerConfig::from(&self.val_fn))?
            .with_next_state(self.val_fn.next_state);
        if let Some(seed) = self.val_fn.seed {
            learner = learner.with_seed(seed);
        }
        let env = GridWorld::new(self.env.into())?;
        Ok((env, learner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLASSIC: &str = r#"{
        "env": {
            "init_state": null,
            "x_range": [1, 4],
            "y_range": [1, 3],
            "noise": 0.2,
            "pos_rwd_state": [[4, 3]],
            "neg_rwd_states": [[4, 2]],
            "pos_rwd_vals": [1.0],
            "neg_rwd_vals": [-1.0],
            "blocked_states": [[2, 2]]
        },
        "val_fn": {
            "gamma": 0.99,
            "max_iter": 1000,
            "epsilon_c": 16,
            "alpha": 0.5,
            "verbose": 10
        }
    }"#;

    #[test]
    fn parses_run_file_keys() {
        let config = Config::from_json_str(CLASSIC).unwrap();
        assert_eq!(config.val_fn.epsilon_c, 16.0);
        assert_eq!(config.val_fn.next_state, NextStateSelection::MostLikely);
        assert_eq!(config.val_fn.seed, None);

        let world: GridWorldConfig = config.env.clone().into();
        assert_eq!(world, GridWorldConfig::default());

        let (env, learner) = config.into_parts().unwrap();
        assert_eq!(env.states().len(), 11);
        assert_eq!(learner.config(), &LearnerConfig::default());
    }

    #[test]
    fn optional_keys() {
        let json = CLASSIC
            .replace("\"init_state\": null", "\"init_state\": [1, 1]")
            .replace("\"verbose\": 10", "\"verbose\": 10, \"seed\": 5, \"next_state\": \"sampled\"");
        let config = Config::from_json_str(&json).unwrap();
        assert_eq!(config.val_fn.seed, Some(5));
        assert_eq!(config.val_fn.next_state, NextStateSelection::Sampled);

        let (env, _) = config.into_parts().unwrap();
        assert_eq!(env.init_state(), Some(State::new(1, 1)));
    }

    #[test]
    fn inconsistent_world_is_rejected() {
        let json = CLASSIC.replace("\"blocked_states\": [[2, 2]]", "\"blocked_states\": [[4, 3]]");
        let config = Config::from_json_str(&json).unwrap();
        assert!(matches!(config.into_parts(), Err(Error::BlockedRewardState(_))));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(Config::from_json_str("{\"env\": 3}"), Err(Error::Json(_))));
    }
}
