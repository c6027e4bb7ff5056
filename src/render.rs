//! Text renderings of the grid. Rows run from the top (highest y) down,
//! columns from the lowest x. All functions only read their inputs.

use crate::environment::{axis_offset, Action, GridWorld, State};
use crate::error::{Error, Result};
use crate::policy::{DetPolicy, QTable};

fn cell(text: &str) -> String {
    format!("|{:^5}|", text)
}

fn grid<F>(env: &GridWorld, mut content: F) -> Result<String>
where
    F: FnMut(State) -> Result<String>,
{
    let (x0, x1) = env.x_range();
    let (y0, y1) = env.y_range();
    let mut out = String::new();

    out.push_str("     ");
    for x in x0..=x1 {
        out.push_str(&cell(&x.to_string()));
    }
    out.push_str("\n ");
    out.push_str(&"-".repeat(7 * (axis_offset(x1, x0) + 1) + 5));
    out.push('\n');

    for y in (y0..=y1).rev() {
        out.push_str(&format!("{:>5}", y));
        for x in x0..=x1 {
            out.push_str(&cell(&content(State::new(x, y))?));
        }
        out.push('\n');
    }
    Ok(out)
}

fn reward_label(reward: f64) -> String {
    format!("{:?}", reward)
}

/// The bare world: `r` marks the agent, `a` open cells, `na` blocked ones.
pub fn render_world(env: &GridWorld, agent: Option<State>) -> String {
    let rendered = grid(env, |state| {
        Ok(if Some(state) == agent {
            "r".to_string()
        } else if let Some(reward) = env.terminal_reward(state) {
            reward_label(reward)
        } else if env.contains(state) {
            "a".to_string()
        } else {
            "na".to_string()
        })
    });
    // The closure never fails.
    rendered.unwrap_or_default()
}

/// Per-state maximum action value.
pub fn render_values(env: &GridWorld, q: &QTable) -> Result<String> {
    grid(env, |state| {
        if env.is_blocked(state) {
            return Ok("na".to_string());
        }
        Ok(format!("{:.2}", q.max_q(state)?))
    })
}

fn arrow(action: Action) -> &'static str {
    match action {
        Action::North => "^",
        Action::South => "_",
        Action::East => "->",
        Action::West => "<-",
        Action::Exit => "x",
    }
}

/// Greedy action per cell, or the reward at reward states.
pub fn render_policy(env: &GridWorld, q: &QTable) -> Result<String> {
    let policy = DetPolicy::from_q_table(q)?;
    grid(env, |state| {
        if env.is_blocked(state) {
            return Ok("na".to_string());
        }
        if let Some(reward) = env.terminal_reward(state) {
            return Ok(reward_label(reward));
        }
        policy
            .action(state)
            .map(|a| arrow(a).to_string())
            .ok_or(Error::UnknownState(state))
    })
}

/// A visited path, e.g. `(1, 1) -> (1, 2) -> (1, 3)`.
pub fn render_path(path: &[State]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
