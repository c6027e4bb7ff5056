use std::fs::File;
use std::io;
use std::path::Path;

use csv::Writer;
use rand::prelude::*;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::agent::{Agent, Step};
use crate::environment::{Action, GridWorld, NextStateSelection, State};
use crate::error::{Error, Result};
use crate::policy::QTable;

/// How the learner picks the action to try at a state.
pub trait ExplorationStrategy {
    fn select_action<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        state: State,
        available: &[Action],
        q: &QTable,
    ) -> Result<Action>;

    /// Called at every cadence boundary with the iteration index.
    fn decay(&mut self, iteration: usize);

    /// Probability of a random action.
    fn epsilon(&self) -> f64;
}

/// Epsilon-greedy exploration with harmonic decay `c / (c + k)`.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    epsilon: f64,
    c: f64,
}

impl EpsilonGreedy {
    pub fn new(c: f64) -> Self {
        EpsilonGreedy { epsilon: 1.0, c }
    }
}

impl ExplorationStrategy for EpsilonGreedy {
    fn epsilon(&self) -> f64 {
        self.epsilon
    }

    fn decay(&mut self, iteration: usize) {
        self.epsilon = self.c / (self.c + iteration as f64);
    }

    fn select_action<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        state: State,
        available: &[Action],
        q: &QTable,
    ) -> Result<Action> {
        if rng.gen::<f64>() < self.epsilon {
            return available
                .choose(rng)
                .copied()
                .ok_or(Error::UnknownState(state));
        }
        q.greedy_action(state)
    }
}

/// `Q <- (1 - alpha) * Q + alpha * target`
pub fn q_update(old: f64, target: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * old + alpha * target
}

#[derive(Debug, Clone, PartialEq)]
pub struct LearnerConfig {
    pub gamma: f64,
    pub max_iter: usize,
    /// Epsilon decay constant.
    pub c: f64,
    pub alpha: f64,
    /// Cadence, in iterations, of epsilon updates and trace rows.
    pub verbose: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            gamma: 0.99,
            max_iter: 1000,
            c: 16.0,
            alpha: 0.5,
            verbose: 10,
        }
    }
}

impl LearnerConfig {
    fn validate(&self) -> Result<()> {
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "gamma",
                value: self.gamma,
                expected: "0 < gamma <= 1",
            });
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(Error::InvalidParameter {
                name: "alpha",
                value: self.alpha,
                expected: "0 < alpha <= 1",
            });
        }
        if !(self.c > 0.0) || !self.c.is_finite() {
            return Err(Error::InvalidParameter {
                name: "epsilon_c",
                value: self.c,
                expected: "a positive, finite number",
            });
        }
        if self.verbose == 0 {
            return Err(Error::InvalidParameter {
                name: "verbose",
                value: 0.0,
                expected: "a cadence of at least 1",
            });
        }
        Ok(())
    }
}

/// One row per cadence boundary of a fit run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRow {
    pub iteration: usize,
    pub epsilon: f64,
    pub episodes: usize,
    /// Largest |Q_new - Q_old| since the previous row.
    pub max_abs_delta: f64,
}

#[derive(Debug, Clone, Default)]
pub struct FitTrace {
    pub rows: Vec<TraceRow>,
}

impl FitTrace {
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = Writer::from_writer(writer);
        for row in &self.rows {
            wtr.serialize(row)?;
        }
        wtr.flush().map_err(|source| Error::Io {
            operation: "flush trace".to_string(),
            source,
        })?;
        Ok(())
    }

    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|source| Error::Io {
            operation: format!("create {}", path.display()),
            source,
        })?;
        self.write_csv(file)
    }
}

/// Tabular Q-learning against a [`GridWorld`], for a fixed number of steps.
pub struct TabularQLearner {
    config: LearnerConfig,
    next_state: NextStateSelection,
    exploration: EpsilonGreedy,
    rng: StdRng,
    seed: Option<u64>,
    q_table: QTable,
    trace: FitTrace,
}

impl TabularQLearner {
    pub fn new(config: LearnerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            exploration: EpsilonGreedy::new(config.c),
            config,
            next_state: NextStateSelection::default(),
            rng: StdRng::from_entropy(),
            seed: None,
            q_table: QTable::default(),
            trace: FitTrace::default(),
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self.seed = Some(seed);
        self
    }

    pub fn with_next_state(mut self, selection: NextStateSelection) -> Self {
        self.next_state = selection;
        self
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn epsilon(&self) -> f64 {
        self.exploration.epsilon()
    }

    pub fn q_table(&self) -> &QTable {
        &self.q_table
    }

    pub fn trace(&self) -> &FitTrace {
        &self.trace
    }

    /// Runs exactly `max_iter` updates. Each call starts from a fresh table,
    /// epsilon 1 and, when seeded, the same random stream.
    pub fn fit(&mut self, env: &GridWorld) -> Result<&QTable> {
        if let Some(seed) = self.seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.q_table = QTable::new(env);
        self.exploration = EpsilonGreedy::new(self.config.c);
        self.trace = FitTrace::default();

        let mut agent = Agent::new(env, &mut self.rng)?;
        let mut max_abs_delta: f64 = 0.0;

        for k in 0..self.config.max_iter {
            let delta = self.step(env, &mut agent)?;
            max_abs_delta = max_abs_delta.max(delta.abs());

            if k % self.config.verbose == 0 {
                self.exploration.decay(k);
                debug!(
                    iteration = k,
                    epsilon = self.exploration.epsilon(),
                    episodes = agent.episodes,
                    max_abs_delta,
                    "q-learning progress"
                );
                self.trace.rows.push(TraceRow {
                    iteration: k,
                    epsilon: self.exploration.epsilon(),
                    episodes: agent.episodes,
                    max_abs_delta,
                });
                max_abs_delta = 0.0;
            }
        }

        info!(
            iterations = self.config.max_iter,
            episodes = agent.episodes,
            epsilon = self.exploration.epsilon(),
            "fit finished"
        );
        Ok(&self.q_table)
    }

    /// One update at the agent's position. Returns the change applied to Q.
    fn step(&mut self, env: &GridWorld, agent: &mut Agent) -> Result<f64> {
        let s = agent.pos;
        let available = env.actions_available(s)?;
        let a = self
            .exploration
            .select_action(&mut self.rng, s, available, &self.q_table)?;

        let target = match agent.r#move(env, a, self.next_state, &mut self.rng)? {
            // No bootstrap past a reward state.
            Step::Terminal { state, reward } => {
                trace!(%state, reward, "episode ended");
                reward
            }
            Step::Continue(s_p) => {
                env.reward(s, a, s_p) + self.config.gamma * self.q_table.max_q(s_p)?
            }
        };

        let old = self.q_table.get(s, a)?;
        let new = q_update(old, target, self.config.alpha);
        self.q_table.set(s, a, new)?;
        Ok(new - old)
    }
}
