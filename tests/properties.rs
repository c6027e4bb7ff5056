use std::collections::HashSet;

use proptest::prelude::*;

use gridworld_qlearning::{Action, GridWorld, GridWorldConfig, State};

fn world_config(
    origin: (i32, i32),
    size: (i32, i32),
    noise: f64,
    mask: &[bool],
) -> (GridWorldConfig, Vec<State>) {
    let (x0, y0) = origin;
    let x1 = x0 + size.0;
    let y1 = y0 + size.1;
    let mut blocked = Vec::new();
    let mut expected = Vec::new();
    let mut i = 0;
    for x in x0..=x1 {
        for y in y0..=y1 {
            let state = State::new(x, y);
            if (x, y) != (x0, y0) && mask[i % mask.len()] {
                blocked.push(state);
            } else {
                expected.push(state);
            }
            i += 1;
        }
    }
    let config = GridWorldConfig {
        x_range: (x0, x1),
        y_range: (y0, y1),
        noise,
        pos_reward_states: vec![State::new(x0, y0)],
        pos_reward_vals: vec![1.0],
        neg_reward_states: vec![],
        neg_reward_vals: vec![],
        blocked_states: blocked,
        init_state: None,
    };
    (config, expected)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transition_table_invariants(
        origin in (-3i32..3, -3i32..3),
        size in (0i32..4, 0i32..4),
        noise in 0.0f64..=1.0,
        mask in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        let (config, expected) = world_config(origin, size, noise, &mask);
        let env = GridWorld::new(config.clone()).unwrap();

        let states: HashSet<State> = env.states().iter().copied().collect();
        let expected: HashSet<State> = expected.into_iter().collect();
        prop_assert_eq!(&states, &expected);

        for &state in env.states() {
            for &action in env.actions_available(state).unwrap() {
                let options = env.transitions(state, action).unwrap();
                let total: f64 = options.iter().map(|(_, p)| p).sum();
                prop_assert!((total - 1.0).abs() < 1e-9);
                for (next, _) in options {
                    prop_assert!(env.contains(*next));
                }
                if action == Action::Exit {
                    prop_assert_eq!(options, &[(state, 1.0)][..]);
                } else {
                    prop_assert_eq!(options.len(), 3);
                    prop_assert_eq!(options[0].0, env.resolve_move(state, action));
                    prop_assert_eq!(options[0].1, 1.0 - noise);
                    prop_assert_eq!(options[1].1, noise / 2.0);
                    prop_assert_eq!(options[2].1, noise / 2.0);
                }
            }
        }

        // Construction has no hidden randomness.
        let again = GridWorld::new(config).unwrap();
        prop_assert_eq!(env.states(), again.states());
        for &state in env.states() {
            for &action in env.actions_available(state).unwrap() {
                prop_assert_eq!(
                    env.transitions(state, action).unwrap(),
                    again.transitions(state, action).unwrap()
                );
            }
        }
    }

    #[test]
    fn moves_never_leave_the_state_set(
        origin in (-3i32..3, -3i32..3),
        size in (0i32..4, 0i32..4),
        mask in prop::collection::vec(any::<bool>(), 1..16),
    ) {
        let (config, _) = world_config(origin, size, 0.2, &mask);
        let env = GridWorld::new(config).unwrap();
        for &state in env.states() {
            for &action in Action::directions() {
                let next = env.resolve_move(state, action);
                let (dx, dy) = action.into_vector();
                let target = State::new(state.x + dx, state.y + dy);
                if env.contains(target) {
                    prop_assert_eq!(next, target);
                } else {
                    prop_assert_eq!(next, state);
                }
            }
        }
    }
}
