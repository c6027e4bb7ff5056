use std::collections::{HashMap, HashSet};
use std::fmt;

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::policy::QTable;

/// Hard cap on value-iteration sweeps, in case `max_delta` is never reached.
const MAX_SWEEPS: usize = 10_000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    pub x: i32,
    pub y: i32,
}

impl State {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// `None` when the step would leave the `i32` plane.
    fn shifted(self, (dx, dy): (i32, i32)) -> Option<Self> {
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }
}

impl From<(i32, i32)> for State {
    fn from((x, y): (i32, i32)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

// Action
//
// Declaration order is the tie-break order used by every arg-max: on equal
// values the later variant wins.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    Exit,
    North,
    South,
    East,
    West,
}

const DIRECTIONS: [Action; 4] = [Action::North, Action::South, Action::East, Action::West];
const EXIT_ONLY: [Action; 1] = [Action::Exit];

impl Action {
    pub fn into_vector(self) -> (i32, i32) {
        match self {
            Action::North => (0, 1),
            Action::South => (0, -1),
            Action::East => (1, 0),
            Action::West => (-1, 0),
            Action::Exit => (0, 0),
        }
    }

    pub fn directions() -> &'static [Action] {
        &DIRECTIONS
    }

    /// The two perpendicular moves a directional action can slip into,
    /// left of travel first.
    pub fn slips(self) -> Option<(Action, Action)> {
        match self {
            Action::North => Some((Action::West, Action::East)),
            Action::South => Some((Action::East, Action::West)),
            Action::East => Some((Action::North, Action::South)),
            Action::West => Some((Action::South, Action::North)),
            Action::Exit => None,
        }
    }
}

/// How a successor is picked from a transition distribution.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStateSelection {
    /// First entry with the highest probability. No randomness involved.
    MostLikely,
    /// Draw proportionally to the entry probabilities.
    Sampled,
}

impl Default for NextStateSelection {
    fn default() -> Self {
        NextStateSelection::MostLikely
    }
}

/// Everything needed to build a [`GridWorld`]. Axis ranges are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct GridWorldConfig {
    pub x_range: (i32, i32),
    pub y_range: (i32, i32),
    pub noise: f64,
    pub pos_reward_states: Vec<State>,
    pub pos_reward_vals: Vec<f64>,
    pub neg_reward_states: Vec<State>,
    pub neg_reward_vals: Vec<f64>,
    pub blocked_states: Vec<State>,
    pub init_state: Option<State>,
}

impl Default for GridWorldConfig {
    /// The classic 4x3 world: +1 at (4, 3), -1 at (4, 2), a wall at (2, 2).
    fn default() -> Self {
        Self {
            x_range: (1, 4),
            y_range: (1, 3),
            noise: 0.2,
            pos_reward_states: vec![State::new(4, 3)],
            pos_reward_vals: vec![1.0],
            neg_reward_states: vec![State::new(4, 2)],
            neg_reward_vals: vec![-1.0],
            blocked_states: vec![State::new(2, 2)],
            init_state: None,
        }
    }
}

pub struct GridWorld {
    x_range: (i32, i32),
    y_range: (i32, i32),
    noise: f64,
    init_state: Option<State>,
    states: Vec<State>,
    state_set: HashSet<State>,
    blocked: HashSet<State>,
    pos_rewards: HashMap<State, f64>,
    neg_rewards: HashMap<State, f64>,
    transition: HashMap<(State, Action), Vec<(State, f64)>>,
}

impl GridWorld {
    pub fn new(config: GridWorldConfig) -> Result<Self> {
        let GridWorldConfig {
            x_range,
            y_range,
            noise,
            pos_reward_states,
            pos_reward_vals,
            neg_reward_states,
            neg_reward_vals,
            blocked_states,
            init_state,
        } = config;

        if !(0.0..=1.0).contains(&noise) {
            return Err(Error::InvalidNoise(noise));
        }
        for (axis, (low, high)) in [('x', x_range), ('y', y_range)].iter().copied() {
            if low > high {
                return Err(Error::EmptyRange { axis, low, high });
            }
        }

        let blocked: HashSet<State> = blocked_states.into_iter().collect();
        let mut states = Vec::new();
        for x in x_range.0..=x_range.1 {
            for y in y_range.0..=y_range.1 {
                let state = State::new(x, y);
                if !blocked.contains(&state) {
                    states.push(state);
                }
            }
        }
        let state_set: HashSet<State> = states.iter().copied().collect();

        let pos_rewards = reward_map("positive", pos_reward_states, pos_reward_vals)?;
        let neg_rewards = reward_map("negative", neg_reward_states, neg_reward_vals)?;
        for state in pos_rewards.keys().chain(neg_rewards.keys()) {
            if blocked.contains(state) {
                return Err(Error::BlockedRewardState(*state));
            }
            if !state_set.contains(state) {
                return Err(Error::RewardStateOutOfRange(*state));
            }
        }
        if let Some(state) = pos_rewards.keys().find(|s| neg_rewards.contains_key(s)) {
            return Err(Error::ConflictingRewardState(*state));
        }

        let mut env = Self {
            x_range,
            y_range,
            noise,
            init_state: None,
            states,
            state_set,
            blocked,
            pos_rewards,
            neg_rewards,
            transition: HashMap::new(),
        };

        if let Some(state) = init_state {
            if !env.contains(state) {
                return Err(Error::InvalidInitialState(state));
            }
            if env.is_terminal(state) {
                return Err(Error::TerminalInitialState(state));
            }
            env.init_state = Some(state);
        }

        env.setup_transition_map();
        Ok(env)
    }

    fn setup_transition_map(&mut self) {
        let mut transition = HashMap::new();
        for &state in &self.states {
            if self.is_terminal(state) {
                // Sentinel: exiting collects the reward, it is not a real move.
                transition.insert((state, Action::Exit), vec![(state, 1.0)]);
                continue;
            }
            for &action in Action::directions() {
                let mut options = vec![(self.resolve_move(state, action), 1.0 - self.noise)];
                if let Some((left, right)) = action.slips() {
                    options.push((self.resolve_move(state, left), self.noise / 2.0));
                    options.push((self.resolve_move(state, right), self.noise / 2.0));
                }
                transition.insert((state, action), options);
            }
        }
        self.transition = transition;
        debug!(
            states = self.states.len(),
            terminals = self.pos_rewards.len() + self.neg_rewards.len(),
            entries = self.transition.len(),
            "transition map ready"
        );
    }

    /// Single-step destination of a move. Walls, the grid edge and blocked
    /// cells leave the agent where it is.
    pub fn resolve_move(&self, state: State, action: Action) -> State {
        state
            .shifted(action.into_vector())
            .filter(|s| self.state_set.contains(s))
            .unwrap_or(state)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn non_terminal_states(&self) -> Vec<State> {
        self.states
            .iter()
            .copied()
            .filter(|s| !self.is_terminal(*s))
            .collect()
    }

    pub fn contains(&self, state: State) -> bool {
        self.state_set.contains(&state)
    }

    pub fn is_blocked(&self, state: State) -> bool {
        self.blocked.contains(&state)
    }

    pub fn is_terminal(&self, state: State) -> bool {
        self.terminal_reward(state).is_some()
    }

    pub fn terminal_reward(&self, state: State) -> Option<f64> {
        self.pos_rewards
            .get(&state)
            .or_else(|| self.neg_rewards.get(&state))
            .copied()
    }

    /// Payoff for taking EXIT at a reward state.
    pub fn exit_value(&self, state: State) -> Result<f64> {
        self.check(state)?;
        self.terminal_reward(state).ok_or(Error::UnavailableAction {
            state,
            action: Action::Exit,
        })
    }

    pub fn init_state(&self) -> Option<State> {
        self.init_state
    }

    pub fn noise(&self) -> f64 {
        self.noise
    }

    pub fn x_range(&self) -> (i32, i32) {
        self.x_range
    }

    pub fn y_range(&self) -> (i32, i32) {
        self.y_range
    }

    fn check(&self, state: State) -> Result<()> {
        if self.contains(state) {
            Ok(())
        } else {
            Err(Error::UnknownState(state))
        }
    }

    pub fn actions_available(&self, state: State) -> Result<&'static [Action]> {
        self.check(state)?;
        if self.is_terminal(state) {
            Ok(&EXIT_ONLY)
        } else {
            Ok(&DIRECTIONS)
        }
    }

    /// Destinations of the four directional moves, or nothing for a reward state.
    pub fn possible_states(&self, state: State) -> Result<Vec<State>> {
        self.check(state)?;
        if self.is_terminal(state) {
            return Ok(Vec::new());
        }
        Ok(DIRECTIONS
            .iter()
            .map(|a| self.resolve_move(state, *a))
            .collect())
    }

    pub fn transitions(&self, state: State, action: Action) -> Result<&[(State, f64)]> {
        self.check(state)?;
        self.transition
            .get(&(state, action))
            .map(|options| options.as_slice())
            .ok_or(Error::UnavailableAction { state, action })
    }

    /// Immediate reward of a non-terminal transition. Terminal payoffs come
    /// from [`GridWorld::terminal_reward`] instead.
    pub fn reward(&self, _old_state: State, _action: Action, _new_state: State) -> f64 {
        0.0
    }

    pub fn most_likely_next(&self, state: State, action: Action) -> Result<State> {
        let options = self.transitions(state, action)?;
        let mut best = options[0];
        for &(new_state, p) in &options[1..] {
            if p > best.1 {
                best = (new_state, p);
            }
        }
        Ok(best.0)
    }

    pub fn transition<R: Rng + ?Sized>(
        &self,
        state: State,
        action: Action,
        selection: NextStateSelection,
        rng: &mut R,
    ) -> Result<State> {
        match selection {
            NextStateSelection::MostLikely => self.most_likely_next(state, action),
            NextStateSelection::Sampled => {
                let options = self.transitions(state, action)?;
                let r: f64 = rng.gen();
                let mut tot_p = 0.0;
                for &(new_state, p) in options {
                    tot_p += p;
                    if tot_p > r {
                        return Ok(new_state);
                    }
                }
                // Rounding can leave the cumulative sum a hair under r.
                Ok(options[options.len() - 1].0)
            }
        }
    }

    fn index(&self, state: State) -> (usize, usize) {
        (
            axis_offset(state.x, self.x_range.0),
            axis_offset(state.y, self.y_range.0),
        )
    }

    /// Expected one-step value of `action` at `state` under `values`.
    fn backup(&self, state: State, action: Action, values: &Array2<f64>, discount: f64) -> Result<f64> {
        Ok(self
            .transitions(state, action)?
            .iter()
            .map(|&(new_state, p)| match self.terminal_reward(new_state) {
                Some(r) => p * r,
                None => {
                    let reward = self.reward(state, action, new_state);
                    p * (reward + discount * values[self.index(new_state)])
                }
            })
            .sum())
    }

    /// Value iteration over the transition table. Terminal cells hold their
    /// reward; stepping into one pays that reward undiscounted.
    pub fn value_iteration(&self, discount: f64, max_delta: f64) -> Result<ValueGrid> {
        let width = axis_offset(self.x_range.1, self.x_range.0) + 1;
        let height = axis_offset(self.y_range.1, self.y_range.0) + 1;
        let mut values = Array2::<f64>::zeros((width, height));
        for (state, reward) in self.pos_rewards.iter().chain(self.neg_rewards.iter()) {
            values[self.index(*state)] = *reward;
        }

        let mut sweeps = 0;
        loop {
            let mut delta: f64 = 0.0;
            for &state in &self.states {
                if self.is_terminal(state) {
                    continue;
                }
                let mut best = f64::NEG_INFINITY;
                for &action in Action::directions() {
                    best = best.max(self.backup(state, action, &values, discount)?);
                }
                let idx = self.index(state);
                delta = delta.max((best - values[idx]).abs());
                values[idx] = best;
            }
            sweeps += 1;
            if delta <= max_delta {
                break;
            }
            if sweeps >= MAX_SWEEPS {
                warn!(sweeps, delta, "value iteration stopped before converging");
                break;
            }
        }
        debug!(sweeps, "value iteration done");

        Ok(ValueGrid {
            origin: (self.x_range.0, self.y_range.0),
            values,
            sweeps,
        })
    }

    /// One-step lookahead action values from a state-value grid, so planner
    /// output can be rendered and queried like a learned table.
    pub fn q_from_values(&self, values: &ValueGrid, discount: f64) -> Result<QTable> {
        let mut q = QTable::new(self);
        for state in self.non_terminal_states() {
            for &action in Action::directions() {
                let value = self.backup(state, action, &values.values, discount)?;
                q.set(state, action, value)?;
            }
        }
        Ok(q)
    }
}

/// Distance of `coord` from `low` along one axis; requires `coord >= low`.
pub(crate) fn axis_offset(coord: i32, low: i32) -> usize {
    (i64::from(coord) - i64::from(low)) as usize
}

fn reward_map(kind: &'static str, states: Vec<State>, values: Vec<f64>) -> Result<HashMap<State, f64>> {
    if states.len() != values.len() {
        return Err(Error::RewardLengthMismatch {
            kind,
            states: states.len(),
            values: values.len(),
        });
    }
    let mut map = HashMap::new();
    for (state, value) in states.into_iter().zip(values) {
        if map.insert(state, value).is_some() {
            return Err(Error::DuplicateRewardState(state));
        }
    }
    Ok(map)
}

/// State values laid out on the grid, indexed by offset from the lower-left corner.
#[derive(Debug, Clone)]
pub struct ValueGrid {
    origin: (i32, i32),
    values: Array2<f64>,
    sweeps: usize,
}

impl ValueGrid {
    pub fn get(&self, state: State) -> Option<f64> {
        if state.x < self.origin.0 || state.y < self.origin.1 {
            return None;
        }
        let idx = (axis_offset(state.x, self.origin.0), axis_offset(state.y, self.origin.1));
        self.values.get(idx).copied()
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }
}
