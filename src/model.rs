//! Life-state space shared by the chain simulator and the path analyzer.

use crate::linalg::Matrix;

/// Number of life states.
pub const N_STATES: usize = 5;

/// Index of the worst state.
pub const BOTTOM: usize = 0;

/// Index of the best state.
pub const TOP: usize = N_STATES - 1;

/// Human-readable state labels, ordered from worst to best.
pub const STATE_LABELS: [&str; N_STATES] = [
    "destitute",
    "struggling",
    "stable",
    "comfortable",
    "thriving",
];

/// Day-to-day transition probabilities between life states.
///
/// Strongly diagonal: most days nothing changes.
pub fn daily_mobility() -> Matrix {
    vec![
        vec![0.990, 0.010, 0.000, 0.000, 0.000],
        vec![0.008, 0.984, 0.008, 0.000, 0.000],
        vec![0.000, 0.008, 0.984, 0.008, 0.000],
        vec![0.000, 0.000, 0.009, 0.983, 0.008],
        vec![0.000, 0.000, 0.000, 0.012, 0.988],
    ]
}

/// Generation-to-generation transition probabilities between life states.
pub fn generational_mobility() -> Matrix {
    vec![
        vec![0.60, 0.30, 0.08, 0.02, 0.00],
        vec![0.20, 0.50, 0.22, 0.06, 0.02],
        vec![0.05, 0.20, 0.50, 0.20, 0.05],
        vec![0.02, 0.06, 0.22, 0.50, 0.20],
        vec![0.00, 0.02, 0.08, 0.30, 0.60],
    ]
}

/// Expected state index `sum_i p_i * i` of a distribution.
pub fn expected_state(dist: &[f64]) -> f64 {
    dist.iter()
        .enumerate()
        .map(|(i_state, &prob)| prob * i_state as f64)
        .sum()
}

/// Index one state up, saturating at the top.
pub fn state_up(i_state: usize) -> usize {
    (i_state + 1).min(TOP)
}

/// Index one state down, saturating at the bottom.
pub fn state_down(i_state: usize) -> usize {
    i_state.saturating_sub(1)
}
