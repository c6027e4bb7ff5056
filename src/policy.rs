use std::collections::{BTreeMap, HashMap};

use ordered_float::OrderedFloat;

use crate::environment::{Action, GridWorld, State};
use crate::error::{Error, Result};

/// Action-value table. Every (state, action) pair the environment exposes
/// is present from construction on; anything else is an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QTable {
    values: HashMap<State, BTreeMap<Action, f64>>,
}

impl QTable {
    /// Reward states start at their reward under EXIT, everything else at 0.
    pub fn new(env: &GridWorld) -> Self {
        let mut values = HashMap::new();
        for &state in env.states() {
            let mut row = BTreeMap::new();
            match env.terminal_reward(state) {
                Some(reward) => {
                    row.insert(Action::Exit, reward);
                }
                None => {
                    for &action in Action::directions() {
                        row.insert(action, 0.0);
                    }
                }
            }
            values.insert(state, row);
        }
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.values().map(|row| row.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.values.keys()
    }

    pub fn row(&self, state: State) -> Result<&BTreeMap<Action, f64>> {
        self.values.get(&state).ok_or(Error::UnknownState(state))
    }

    pub fn get(&self, state: State, action: Action) -> Result<f64> {
        self.row(state)?
            .get(&action)
            .copied()
            .ok_or(Error::UnavailableAction { state, action })
    }

    pub fn set(&mut self, state: State, action: Action, value: f64) -> Result<()> {
        let slot = self
            .values
            .get_mut(&state)
            .ok_or(Error::UnknownState(state))?
            .get_mut(&action)
            .ok_or(Error::UnavailableAction { state, action })?;
        *slot = value;
        Ok(())
    }

    fn best(&self, state: State) -> Result<(OrderedFloat<f64>, Action)> {
        self.row(state)?
            .iter()
            .map(|(action, value)| (OrderedFloat(*value), *action))
            .max()
            .ok_or(Error::UnknownState(state))
    }

    pub fn max_q(&self, state: State) -> Result<f64> {
        Ok(self.best(state)?.0.into_inner())
    }

    /// Arg-max over the state's actions; ties go to the later action.
    pub fn greedy_action(&self, state: State) -> Result<Action> {
        Ok(self.best(state)?.1)
    }
}

// Represents deterministic policy
#[derive(Debug, Clone, Default)]
pub struct DetPolicy {
    pub policy: HashMap<State, Action>,
}

impl DetPolicy {
    pub fn from_q_table(q: &QTable) -> Result<Self> {
        let mut policy = HashMap::new();
        for &state in q.states() {
            policy.insert(state, q.greedy_action(state)?);
        }
        Ok(Self { policy })
    }

    pub fn action(&self, state: State) -> Option<Action> {
        self.policy.get(&state).copied()
    }

    /// Follows the policy from `start` using most-likely transitions until a
    /// reward state is reached or `max_steps` moves were made.
    pub fn rollout(&self, env: &GridWorld, start: State, max_steps: usize) -> Result<Vec<State>> {
        let mut path = vec![start];
        let mut pos = start;
        for _ in 0..max_steps {
            if env.is_terminal(pos) {
                break;
            }
            let a = self.action(pos).ok_or(Error::UnknownState(pos))?;
            pos = env.most_likely_next(pos, a)?;
            path.push(pos);
        }
        Ok(path)
    }
}
