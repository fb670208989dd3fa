//! Path dependence: effort, risk and lock-in acting on generational mobility.

use crate::config::PathConfig;
use crate::linalg::{Matrix, advance_distribution, identity, normalize_row, one_hot, solve_linear};
use crate::model::{BOTTOM, N_STATES, TOP, generational_mobility};
use crate::stationary::stationary_distribution;
use serde::{Deserialize, Serialize};

/// Largest share of the stay probability that effort can move upward.
const MAX_EFFORT_SHIFT: f64 = 0.8;

/// Share of the donor cells that full risk moves into a leap or a fall.
const RISK_SHARE: f64 = 0.5;

/// Self-transition probability of the top state above which it is treated
/// as absorbing.
pub const ABSORPTION_THRESHOLD: f64 = 0.99;

/// Steps iterated to approximate the long-run distribution under lock-in.
pub const LOCK_IN_STEPS: usize = 500;

/// Outcome of [`analyze_path`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathResult {
    pub matrix: Matrix,
    pub long_run: Vec<f64>,
    /// Expected steps from the bottom state into the absorbing top state.
    pub expected_steps: Option<f64>,
}

/// Apply the behavioral knobs to `base`, returning a new row-stochastic
/// matrix.
///
/// Effort moves part of the stay probability one state up. Risk moves part
/// of the "one up" cell two states up and part of the stay cell one state
/// down. With lock-in the top row becomes absorbing.
pub fn build_path_matrix(base: &[Vec<f64>], cfg: &PathConfig) -> Matrix {
    let n_states = base.len();
    let top = n_states.saturating_sub(1);
    base.iter()
        .enumerate()
        .map(|(i_state, row)| {
            if cfg.lock_in && i_state == top {
                return one_hot(n_states, top);
            }
            let mut row = row.clone();

            if i_state < top {
                let shift = row[i_state] * cfg.effort.min(MAX_EFFORT_SHIFT);
                row[i_state] -= shift;
                row[i_state + 1] += shift;
            }

            if i_state + 2 <= top {
                let leap = row[i_state + 1] * cfg.risk * RISK_SHARE;
                row[i_state + 1] -= leap;
                row[i_state + 2] += leap;
            }
            if i_state > 0 {
                let fall = row[i_state] * cfg.risk * RISK_SHARE;
                row[i_state] -= fall;
                row[i_state - 1] += fall;
            }

            normalize_row(&row)
        })
        .collect()
}

/// Expected number of steps from the bottom state until absorption in the
/// top state.
///
/// Returns `None` unless the top state's self-transition exceeds
/// [`ABSORPTION_THRESHOLD`]. Solves `(I - Q) t = 1` over the transient
/// block `Q`.
pub fn expected_absorption_steps(mat: &[Vec<f64>]) -> Option<f64> {
    let n_states = mat.len();
    let top = n_states.checked_sub(1)?;
    if mat[top][top] <= ABSORPTION_THRESHOLD || top == 0 {
        return None;
    }

    let eye = identity(top);
    let sys: Vec<Vec<f64>> = mat[..top]
        .iter()
        .zip(eye)
        .map(|(row, eye_row)| {
            row[..top]
                .iter()
                .zip(eye_row)
                .map(|(q, e)| e - q)
                .collect()
        })
        .collect();
    let steps = solve_linear(&sys, &vec![1.0; top]);
    steps.first().copied()
}

/// Long-run distribution of the path matrix.
///
/// Under lock-in the chain is iterated [`LOCK_IN_STEPS`] times from the
/// bottom state; otherwise the stationary distribution is solved for.
pub fn long_run_distribution(mat: &[Vec<f64>], lock_in: bool) -> Vec<f64> {
    if !lock_in {
        return stationary_distribution(mat);
    }
    let mut dist = one_hot(mat.len(), BOTTOM);
    for _ in 0..LOCK_IN_STEPS {
        dist = advance_distribution(&dist, mat);
    }
    dist
}

/// Build the path matrix from the generational baseline and analyze it.
pub fn analyze_path(cfg: &PathConfig) -> PathResult {
    let matrix = build_path_matrix(&generational_mobility(), cfg);
    let long_run = long_run_distribution(&matrix, cfg.lock_in);
    let expected_steps = expected_absorption_steps(&matrix);

    match expected_steps {
        Some(steps) => log::info!("expected steps to reach the top: {steps:.3}"),
        None => log::info!("top state is not absorbing, P(top) = {:.4}", long_run[TOP]),
    }
    debug_assert_eq!(long_run.len(), N_STATES);

    PathResult {
        matrix,
        long_run,
        expected_steps,
    }
}
