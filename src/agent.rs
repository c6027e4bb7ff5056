use rand::seq::SliceRandom;
use rand::Rng;

use crate::environment::{Action, GridWorld, NextStateSelection, State};
use crate::error::{Error, Result};

/// Outcome of a single move.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Step {
    Continue(State),
    /// A reward state was entered; the agent already sits on a fresh start.
    Terminal { state: State, reward: f64 },
}

/// The learner's cursor in the world. It never rests on a reward state:
/// entering one ends the episode and puts the agent back on a start state.
pub struct Agent {
    pub pos: State,
    pub episodes: usize,
    fixed_start: Option<State>,
    start_states: Vec<State>,
}

impl Agent {
    pub fn new<R: Rng + ?Sized>(env: &GridWorld, rng: &mut R) -> Result<Self> {
        let start_states = env.non_terminal_states();
        if start_states.is_empty() {
            return Err(Error::NoStartState);
        }
        let mut agent = Self {
            pos: start_states[0],
            episodes: 0,
            fixed_start: env.init_state(),
            start_states,
        };
        agent.pos = agent.start_pos(rng);
        Ok(agent)
    }

    /// The configured initial state, or a uniform pick among non-terminal states.
    fn start_pos<R: Rng + ?Sized>(&self, rng: &mut R) -> State {
        match self.fixed_start {
            Some(state) => state,
            None => *self
                .start_states
                .choose(rng)
                .unwrap_or(&self.start_states[0]),
        }
    }

    pub fn restart<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.pos = self.start_pos(rng);
        self.episodes += 1;
    }

    pub fn r#move<R: Rng + ?Sized>(
        &mut self,
        env: &GridWorld,
        action: Action,
        selection: NextStateSelection,
        rng: &mut R,
    ) -> Result<Step> {
        let new_pos = env.transition(self.pos, action, selection, rng)?;
        match env.terminal_reward(new_pos) {
            Some(reward) => {
                self.restart(rng);
                Ok(Step::Terminal {
                    state: new_pos,
                    reward,
                })
            }
            None => {
                self.pos = new_pos;
                Ok(Step::Continue(new_pos))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::GridWorldConfig;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn random_starts_are_non_terminal() {
        let env = GridWorld::new(GridWorldConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut agent = Agent::new(&env, &mut rng).unwrap();
        for _ in 0..100 {
            assert!(env.contains(agent.pos));
            assert!(!env.is_terminal(agent.pos));
            agent.restart(&mut rng);
        }
        assert_eq!(agent.episodes, 100);
    }

    #[test]
    fn entering_a_reward_state_restarts_at_the_fixed_start() {
        let config = GridWorldConfig {
            init_state: Some(State::new(1, 1)),
            noise: 0.0,
            ..GridWorldConfig::default()
        };
        let env = GridWorld::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let mut agent = Agent::new(&env, &mut rng).unwrap();
        assert_eq!(agent.pos, State::new(1, 1));

        agent.pos = State::new(3, 3);
        let step = agent
            .r#move(&env, Action::East, NextStateSelection::MostLikely, &mut rng)
            .unwrap();
        assert_eq!(
            step,
            Step::Terminal {
                state: State::new(4, 3),
                reward: 1.0
            }
        );
        assert_eq!(agent.pos, State::new(1, 1));
        assert_eq!(agent.episodes, 1);

        let step = agent
            .r#move(&env, Action::North, NextStateSelection::MostLikely, &mut rng)
            .unwrap();
        assert_eq!(step, Step::Continue(State::new(1, 2)));
        assert_eq!(agent.pos, State::new(1, 2));
    }

    #[test]
    fn all_terminal_grid_has_no_start() {
        let config = GridWorldConfig {
            x_range: (1, 1),
            y_range: (1, 1),
            pos_reward_states: vec![State::new(1, 1)],
            pos_reward_vals: vec![1.0],
            neg_reward_states: vec![],
            neg_reward_vals: vec![],
            blocked_states: vec![],
            ..GridWorldConfig::default()
        };
        let env = GridWorld::new(config).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(Agent::new(&env, &mut rng), Err(Error::NoStartState)));
    }
}
