//! Discrete-time simulation of the life-state chain.

use crate::config::{ChainConfig, ConvergenceConfig};
use crate::linalg::{
    Matrix, advance_distribution, identity, l1_distance, normalize_row, one_hot, total_variation,
};
use crate::model::{
    BOTTOM, N_STATES, STATE_LABELS, daily_mobility, expected_state, state_down, state_up,
};
use crate::stationary::stationary_distribution;
use serde::{Deserialize, Serialize};

/// Fine steps per year.
pub const DAYS_PER_YEAR: usize = 365;

/// L1 change below which the chain counts as mixed.
pub const MIXING_TOL: f64 = 1e-5;

/// Step bound of the mixing-time search.
pub const MAX_MIXING_STEPS: usize = 5000;

/// Sampled step of a chain simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub step: usize,
    pub baseline_mean: f64,
    pub perturbed_mean: f64,
    pub baseline_dist: Vec<f64>,
    pub perturbed_dist: Vec<f64>,
}

/// Outcome of [`run_simulation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResult {
    pub baseline_matrix: Matrix,
    pub perturbed_matrix: Matrix,
    pub timeline: Vec<Sample>,
    /// Steps until the perturbed chain stops changing (see [`mixing_time`]).
    pub mixing_time: usize,
    /// Reciprocal of the mixing time (see [`spectral_gap_estimate`]).
    pub spectral_gap: f64,
    /// Stationary distribution of the perturbed matrix.
    pub stationary: Vec<f64>,
}

/// Shift `strength` of probability from falling one state to rising one
/// state in every row, then renormalize.
///
/// The bottom state "falls" onto itself and the top state "rises" onto
/// itself, so their self-loops absorb the respective side of the shift.
pub fn perturb_matrix(mat: &[Vec<f64>], strength: f64) -> Matrix {
    if strength == 0.0 {
        return mat.to_vec();
    }
    mat.iter()
        .enumerate()
        .map(|(i_state, row)| {
            let mut row = row.clone();
            let i_up = state_up(i_state);
            let i_down = state_down(i_state);
            row[i_up] += strength;
            row[i_down] = (row[i_down] - strength).max(0.0);
            normalize_row(&row)
        })
        .collect()
}

/// Sampling interval for a horizon of `n_steps` fine steps.
pub fn sampling_interval(n_steps: usize) -> usize {
    if n_steps <= 2 * DAYS_PER_YEAR {
        7
    } else if n_steps <= 10 * DAYS_PER_YEAR {
        30
    } else {
        60
    }
}

/// Advance baseline and perturbed distributions side by side.
///
/// The perturbed matrix is the override if one is configured, otherwise
/// the baseline with [`perturb_matrix`] applied.
pub fn run_simulation(cfg: &ChainConfig) -> ChainResult {
    let baseline_matrix = daily_mobility();
    let perturbed_matrix = match &cfg.override_matrix {
        Some(mat) => mat.clone(),
        None => perturb_matrix(&baseline_matrix, cfg.perturbation_strength),
    };

    let n_steps = cfg.horizon_years * DAYS_PER_YEAR;
    let interval = sampling_interval(n_steps);

    let mut baseline_dist = one_hot(N_STATES, cfg.initial_state);
    let mut perturbed_dist = baseline_dist.clone();
    let mut timeline = Vec::with_capacity(n_steps / interval + 2);
    timeline.push(make_sample(0, &baseline_dist, &perturbed_dist));

    for step in 1..=n_steps {
        baseline_dist = advance_distribution(&baseline_dist, &baseline_matrix);
        perturbed_dist = advance_distribution(&perturbed_dist, &perturbed_matrix);
        if step % interval == 0 || step == n_steps {
            timeline.push(make_sample(step, &baseline_dist, &perturbed_dist));
        }
    }

    let mixing_time = mixing_time(&perturbed_matrix);
    let spectral_gap = spectral_gap_estimate(mixing_time);
    let stationary = stationary_distribution(&perturbed_matrix);

    log::info!(
        "simulated {n_steps} steps ({} samples), mixing time {mixing_time}",
        timeline.len()
    );
    for (label, prob) in STATE_LABELS.iter().zip(&perturbed_dist) {
        log::debug!("P({label}) = {prob:.6} at step {n_steps}");
    }

    ChainResult {
        baseline_matrix,
        perturbed_matrix,
        timeline,
        mixing_time,
        spectral_gap,
        stationary,
    }
}

fn make_sample(step: usize, baseline_dist: &[f64], perturbed_dist: &[f64]) -> Sample {
    Sample {
        step,
        baseline_mean: expected_state(baseline_dist),
        perturbed_mean: expected_state(perturbed_dist),
        baseline_dist: baseline_dist.to_vec(),
        perturbed_dist: perturbed_dist.to_vec(),
    }
}

/// Number of steps from the bottom state until the L1 change between
/// consecutive distributions drops below [`MIXING_TOL`].
///
/// Returns [`MAX_MIXING_STEPS`] if that never happens, which flags a
/// periodic or very slowly mixing chain.
pub fn mixing_time(mat: &[Vec<f64>]) -> usize {
    let mut dist = one_hot(mat.len(), BOTTOM);
    for step in 1..=MAX_MIXING_STEPS {
        let next = advance_distribution(&dist, mat);
        if l1_distance(&next, &dist) < MIXING_TOL {
            return step;
        }
        dist = next;
    }
    MAX_MIXING_STEPS
}

/// Heuristic spectral gap, `1 / mixing_time` (0 for a zero mixing time).
///
/// This is not an eigenvalue computation; it only tracks the order of
/// magnitude of the true gap.
pub fn spectral_gap_estimate(mixing_time: usize) -> f64 {
    if mixing_time == 0 {
        0.0
    } else {
        1.0 / mixing_time as f64
    }
}

/// Outcome of [`run_convergence_simulation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceResult {
    pub matrix: Matrix,
    /// Analytic second eigenvalue, `1 - m`.
    pub lambda2: f64,
    /// `1 - |lambda2|`.
    pub spectral_gap: f64,
    /// Total variation distance to the uniform distribution, one per step.
    pub tvd: Vec<f64>,
    /// Empirical per-step contraction factor of the TVD.
    pub decay_rate: f64,
}

/// The matrix `(1 - m) I + m J / N`.
pub fn convergence_matrix(mixing: f64, dim: usize) -> Matrix {
    let jump = mixing / dim as f64;
    identity(dim)
        .into_iter()
        .map(|row| row.iter().map(|&e| (1.0 - mixing) * e + jump).collect())
        .collect()
}

/// Track the TVD to the uniform distribution of a chain started at the
/// bottom state under [`convergence_matrix`].
pub fn run_convergence_simulation(cfg: &ConvergenceConfig) -> ConvergenceResult {
    let matrix = convergence_matrix(cfg.mixing, N_STATES);
    let uniform = vec![1.0 / N_STATES as f64; N_STATES];

    let mut dist = one_hot(N_STATES, BOTTOM);
    let mut tvd = Vec::with_capacity(cfg.n_steps + 1);
    tvd.push(total_variation(&dist, &uniform));
    for _ in 0..cfg.n_steps {
        dist = advance_distribution(&dist, &matrix);
        tvd.push(total_variation(&dist, &uniform));
    }

    let lambda2 = 1.0 - cfg.mixing;
    let decay_rate = decay_rate(&tvd);
    log::info!("convergence with m = {}: decay rate {decay_rate:.6}", cfg.mixing);

    ConvergenceResult {
        matrix,
        lambda2,
        spectral_gap: 1.0 - lambda2.abs(),
        tvd,
        decay_rate,
    }
}

/// Geometric-mean ratio `(tvd_k / tvd_0)^(1/k)` up to the last step whose
/// TVD is still resolvable.
fn decay_rate(tvd: &[f64]) -> f64 {
    const FLOOR: f64 = 1e-9;
    let Some(&tvd_0) = tvd.first() else {
        return 1.0;
    };
    if tvd_0 <= FLOOR {
        return 1.0;
    }
    let last = tvd
        .iter()
        .enumerate()
        .skip(1)
        .take_while(|&(_, &val)| val > FLOOR)
        .last();
    match last {
        Some((k, &tvd_k)) => (tvd_k / tvd_0).powf(1.0 / k as f64).min(1.0),
        // Collapsed within one step.
        None => tvd.get(1).map_or(1.0, |&tvd_1| tvd_1 / tvd_0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perturbed_rows_stay_stochastic() {
        let mat = perturb_matrix(&daily_mobility(), 0.05);
        for row in &mat {
            assert!(row.iter().all(|&p| p >= 0.0));
            assert!((row.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        }
        // The bottom state can only gain upward mass.
        assert!(mat[0][1] > daily_mobility()[0][1]);
    }

    #[test]
    fn perturbation_raises_expected_state() {
        let cfg = ChainConfig {
            horizon_years: 3,
            perturbation_strength: 0.01,
            initial_state: 0,
            override_matrix: None,
        };
        let result = run_simulation(&cfg);
        let last = result.timeline.last().unwrap();
        assert!(last.perturbed_mean > last.baseline_mean);
    }

    #[test]
    fn zero_perturbation_does_not_diverge() {
        let cfg = ChainConfig {
            horizon_years: 1,
            perturbation_strength: 0.0,
            initial_state: 0,
            override_matrix: None,
        };
        let result = run_simulation(&cfg);
        assert_eq!(result.baseline_matrix, result.perturbed_matrix);
        for sample in &result.timeline {
            assert_eq!(sample.baseline_dist, sample.perturbed_dist);
            assert_eq!(sample.baseline_mean, sample.perturbed_mean);
        }
    }

    #[test]
    fn timeline_includes_both_ends() {
        for horizon_years in [1, 5, 30] {
            let cfg = ChainConfig {
                horizon_years,
                ..ChainConfig::default()
            };
            let result = run_simulation(&cfg);
            let n_steps = horizon_years * DAYS_PER_YEAR;
            assert_eq!(result.timeline.first().unwrap().step, 0);
            assert_eq!(result.timeline.last().unwrap().step, n_steps);
            let interval = sampling_interval(n_steps);
            assert_eq!(result.timeline.len(), n_steps.div_ceil(interval) + 1);
            for sample in &result.timeline {
                let sum: f64 = sample.perturbed_dist.iter().sum();
                assert!((sum - 1.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn override_matrix_replaces_perturbation() {
        let cfg = ChainConfig {
            horizon_years: 1,
            perturbation_strength: 0.05,
            initial_state: 2,
            override_matrix: Some(identity(N_STATES)),
        };
        let result = run_simulation(&cfg);
        let last = result.timeline.last().unwrap();
        assert_eq!(last.perturbed_dist, one_hot(N_STATES, 2));
        assert_eq!(last.perturbed_mean, 2.0);
    }

    #[test]
    fn sampling_interval_grows_with_horizon() {
        assert_eq!(sampling_interval(365), 7);
        assert_eq!(sampling_interval(5 * 365), 30);
        assert_eq!(sampling_interval(50 * 365), 60);
    }

    #[test]
    fn mixing_time_hits_bound_for_periodic_chain() {
        let flip = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        assert_eq!(mixing_time(&flip), MAX_MIXING_STEPS);
    }

    #[test]
    fn mixing_time_of_rank_one_chain() {
        let mat = vec![vec![0.3, 0.7]; 2];
        // One step reaches stationarity, the second observes no change.
        assert_eq!(mixing_time(&mat), 2);
        assert_eq!(spectral_gap_estimate(2), 0.5);
        assert_eq!(spectral_gap_estimate(0), 0.0);
    }

    #[test]
    fn decay_rate_matches_second_eigenvalue() {
        for mixing in [0.1, 0.5, 0.9] {
            let cfg = ConvergenceConfig {
                mixing,
                n_steps: 50,
            };
            let result = run_convergence_simulation(&cfg);
            assert!((result.decay_rate - (1.0 - mixing).abs()).abs() < 1e-6);
            assert!((result.lambda2 - (1.0 - mixing)).abs() < 1e-12);
        }
    }

    #[test]
    fn identity_never_mixes() {
        let cfg = ConvergenceConfig {
            mixing: 0.0,
            n_steps: 50,
        };
        let result = run_convergence_simulation(&cfg);
        assert_eq!(result.lambda2, 1.0);
        assert_eq!(result.spectral_gap, 0.0);
        let tvd_0 = result.tvd[0];
        assert!((tvd_0 - 0.8).abs() < 1e-12);
        assert!(result.tvd.iter().all(|&tvd| tvd >= tvd_0));
        assert_eq!(result.decay_rate, 1.0);
    }

    #[test]
    fn full_mixing_collapses_in_one_step() {
        let cfg = ConvergenceConfig {
            mixing: 1.0,
            n_steps: 5,
        };
        let result = run_convergence_simulation(&cfg);
        assert!(result.tvd[1] < 1e-12);
        assert!(result.decay_rate < 1e-6);
    }
}
