//! Nonconvex capital accumulation: equilibria, cobwebs and noisy paths.
//!
//! The map is
//!
//! ```text
//! k' = k - delta * k + s * A * k^gamma / (H^gamma + k^gamma) + sigma * z
//! ```
//!
//! floored at zero, where `z` is a standard normal draw.

use crate::analysis::{Analyzer, Report};
use crate::config::WealthConfig;
use anyhow::{Context, Result};
use rand::Rng;
use rand::distr::OpenClosed01;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Upper end of the equilibrium scan and of the phase map.
pub const SCAN_CEILING: f64 = 50.0;

/// Spacing of the equilibrium scan.
pub const SCAN_STEP: f64 = 0.1;

const BISECTION_ITERS: usize = 20;

/// Offset at which net growth is probed to classify an equilibrium.
const STABILITY_PROBE: f64 = 0.01;

const PHASE_POINTS: usize = 251;

pub const COBWEB_STEPS: usize = 30;

/// Number of Monte Carlo paths.
pub const MC_PATHS: usize = 15;

/// Number of Monte Carlo steps per path.
pub const MC_STEPS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stability {
    Stable,
    Unstable,
}

/// Fixed point of the deterministic map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Equilibrium {
    pub capital: f64,
    pub stability: Stability,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhasePoint {
    pub capital: f64,
    pub next: f64,
    /// Reference 45-degree line.
    pub identity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CobwebPoint {
    pub x: f64,
    pub y: f64,
}

/// Capital of every Monte Carlo path at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub step: usize,
    pub capital: Vec<f64>,
}

/// Outcome of [`run_wealth`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WealthResult {
    pub equilibria: Vec<Equilibrium>,
    pub phase_map: Vec<PhasePoint>,
    pub cobweb: Vec<CobwebPoint>,
    pub trajectories: Vec<TrajectoryPoint>,
    pub summary: Vec<Report>,
}

/// Saturating production term `s * A * k^gamma / (H^gamma + k^gamma)`.
pub fn production(cfg: &WealthConfig, capital: f64) -> f64 {
    let k_pow = capital.powf(cfg.shape);
    let h_pow = cfg.threshold.powf(cfg.shape);
    cfg.savings_rate * cfg.productivity * k_pow / (h_pow + k_pow)
}

/// Production minus depreciation.
pub fn net_growth(cfg: &WealthConfig, capital: f64) -> f64 {
    production(cfg, capital) - cfg.depreciation * capital
}

/// Deterministic map, floored at zero.
pub fn next_capital(cfg: &WealthConfig, capital: f64) -> f64 {
    (capital + net_growth(cfg, capital)).max(0.0)
}

/// Noisy map with additive Gaussian noise of standard deviation
/// `cfg.noise`, floored at zero.
pub fn step_capital<R: Rng + ?Sized>(cfg: &WealthConfig, capital: f64, rng: &mut R) -> f64 {
    let noise = if cfg.noise > 0.0 {
        cfg.noise * standard_normal(rng)
    } else {
        0.0
    };
    (capital + net_growth(cfg, capital) + noise).max(0.0)
}

/// Standard normal draw by the Box-Muller transform.
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u_1: f64 = rng.sample(OpenClosed01);
    let u_2: f64 = rng.random();
    (-2.0 * u_1.ln()).sqrt() * (TAU * u_2).cos()
}

/// Locate the fixed points of the deterministic map on `[0, SCAN_CEILING]`.
///
/// Zero is always reported. Interior roots are bracketed by sign changes of
/// the net growth on a grid of spacing [`SCAN_STEP`] and refined by
/// bisection, so roots closer together than the grid spacing, or touching
/// zero without crossing it, are missed.
pub fn find_equilibria(cfg: &WealthConfig) -> Vec<Equilibrium> {
    let mut equilibria = vec![Equilibrium {
        capital: 0.0,
        stability: if net_growth(cfg, STABILITY_PROBE) < 0.0 {
            Stability::Stable
        } else {
            Stability::Unstable
        },
    }];

    let n_points = (SCAN_CEILING / SCAN_STEP).round() as usize;
    let mut k_lo = 0.0;
    let mut g_lo = net_growth(cfg, k_lo);
    for i_point in 1..=n_points {
        let k_hi = i_point as f64 * SCAN_STEP;
        let g_hi = net_growth(cfg, k_hi);
        if g_lo * g_hi < 0.0 {
            let root = bisect(cfg, k_lo, k_hi);
            equilibria.push(Equilibrium {
                capital: root,
                stability: classify(cfg, root),
            });
        }
        k_lo = k_hi;
        g_lo = g_hi;
    }

    equilibria
}

fn bisect(cfg: &WealthConfig, mut lo: f64, mut hi: f64) -> f64 {
    let g_lo = net_growth(cfg, lo);
    for _ in 0..BISECTION_ITERS {
        let mid = 0.5 * (lo + hi);
        if net_growth(cfg, mid) * g_lo > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Stable if trajectories just below grow and those just above shrink.
fn classify(cfg: &WealthConfig, root: f64) -> Stability {
    let below = net_growth(cfg, root - STABILITY_PROBE);
    let above = net_growth(cfg, root + STABILITY_PROBE);
    if below > 0.0 && above < 0.0 {
        Stability::Stable
    } else {
        Stability::Unstable
    }
}

/// Pairs `(k, f(k))` on an even grid over `[0, SCAN_CEILING]`.
pub fn phase_map(cfg: &WealthConfig) -> Vec<PhasePoint> {
    (0..PHASE_POINTS)
        .map(|i_point| {
            let capital = SCAN_CEILING * i_point as f64 / (PHASE_POINTS - 1) as f64;
            PhasePoint {
                capital,
                next: next_capital(cfg, capital),
                identity: capital,
            }
        })
        .collect()
}

/// Cobweb diagram vertices of the deterministic map started from the
/// initial capital: `(k0, 0), (k0, k1), (k1, k1), (k1, k2), ...`.
pub fn cobweb(cfg: &WealthConfig) -> Vec<CobwebPoint> {
    let mut points = Vec::with_capacity(2 * COBWEB_STEPS + 1);
    let mut capital = cfg.initial_capital;
    points.push(CobwebPoint { x: capital, y: 0.0 });
    for _ in 0..COBWEB_STEPS {
        let next = next_capital(cfg, capital);
        points.push(CobwebPoint { x: capital, y: next });
        points.push(CobwebPoint { x: next, y: next });
        capital = next;
    }
    points
}

/// Simulate [`MC_PATHS`] noisy paths for [`MC_STEPS`] steps.
///
/// Initial capital is drawn uniformly within `init_jitter` of the
/// configured mean. At `shock_time` every path receives the shock.
pub fn monte_carlo<R: Rng + ?Sized>(
    cfg: &WealthConfig,
    rng: &mut R,
) -> Result<Vec<TrajectoryPoint>> {
    let mut capital: Vec<f64> = if cfg.init_jitter > 0.0 {
        let jitter_dist = Uniform::new_inclusive(-cfg.init_jitter, cfg.init_jitter)
            .context("failed to construct jitter distribution")?;
        (0..MC_PATHS)
            .map(|_| (cfg.initial_capital + jitter_dist.sample(rng)).max(0.0))
            .collect()
    } else {
        vec![cfg.initial_capital; MC_PATHS]
    };

    let mut trajectories = Vec::with_capacity(MC_STEPS + 1);
    for step in 0..=MC_STEPS {
        if step > 0 {
            for k in capital.iter_mut() {
                *k = step_capital(cfg, *k, rng);
            }
        }
        if step == cfg.shock_time && cfg.shock_magnitude > 0.0 {
            capital.iter_mut().for_each(|k| *k += cfg.shock_magnitude);
            log::debug!("applied shock of {} at step {step}", cfg.shock_magnitude);
        }
        trajectories.push(TrajectoryPoint {
            step,
            capital: capital.clone(),
        });
    }

    Ok(trajectories)
}

/// Lowest interior unstable equilibrium, the poverty-trap threshold.
pub fn trap_threshold(equilibria: &[Equilibrium]) -> Option<f64> {
    equilibria
        .iter()
        .filter(|eq| eq.capital > 0.0 && eq.stability == Stability::Unstable)
        .map(|eq| eq.capital)
        .reduce(f64::min)
}

/// Compute every output of the capital dynamics for one configuration.
pub fn run_wealth<R: Rng + ?Sized>(cfg: &WealthConfig, rng: &mut R) -> Result<WealthResult> {
    let equilibria = find_equilibria(cfg);
    log::info!("found {} equilibria: {equilibria:?}", equilibria.len());

    let trajectories = monte_carlo(cfg, rng).context("failed to simulate trajectories")?;

    let mut analyzer = Analyzer::new(trap_threshold(&equilibria));
    analyzer.add_trajectory(&trajectories);

    Ok(WealthResult {
        phase_map: phase_map(cfg),
        cobweb: cobweb(cfg),
        equilibria,
        trajectories,
        summary: analyzer.reports(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn default_map_has_a_poverty_trap() {
        let cfg = WealthConfig::default();
        let equilibria = find_equilibria(&cfg);
        assert_eq!(equilibria.len(), 3);

        assert_eq!(equilibria[0].capital, 0.0);
        assert_eq!(equilibria[0].stability, Stability::Stable);
        assert_eq!(equilibria[1].stability, Stability::Unstable);
        assert_eq!(equilibria[2].stability, Stability::Stable);

        for eq in &equilibria[1..] {
            assert!(net_growth(&cfg, eq.capital).abs() < 1e-5);
            let below = net_growth(&cfg, eq.capital - 0.05);
            let above = net_growth(&cfg, eq.capital + 0.05);
            assert!(below * above < 0.0);
        }
        assert!((equilibria[1].capital - 7.9).abs() < 0.2);
        assert!((equilibria[2].capital - 21.9).abs() < 0.2);
    }

    #[test]
    fn strong_depreciation_leaves_only_zero() {
        let cfg = WealthConfig {
            productivity: 8.0,
            ..WealthConfig::default()
        };
        let equilibria = find_equilibria(&cfg);
        assert_eq!(equilibria.len(), 1);
        assert_eq!(equilibria[0].stability, Stability::Stable);
        assert_eq!(trap_threshold(&equilibria), None);
    }

    #[test]
    fn deterministic_paths_split_at_the_threshold() {
        let cfg = WealthConfig::default();
        let threshold = trap_threshold(&find_equilibria(&cfg)).unwrap();

        let poor = WealthConfig {
            initial_capital: threshold - 1.0,
            ..cfg.clone()
        };
        let rich = WealthConfig {
            initial_capital: threshold + 1.0,
            ..cfg
        };
        let poor_end = cobweb(&poor).last().unwrap().x;
        let rich_end = cobweb(&rich).last().unwrap().x;
        assert!(poor_end < threshold - 1.0);
        assert!(rich_end > threshold + 1.0);
    }

    #[test]
    fn cobweb_alternates_vertical_and_horizontal() {
        let points = cobweb(&WealthConfig::default());
        assert_eq!(points.len(), 2 * COBWEB_STEPS + 1);
        for pair in points[1..].chunks_exact(2) {
            assert_eq!(pair[0].y, pair[1].y);
            assert_eq!(pair[1].x, pair[1].y);
        }
    }

    #[test]
    fn phase_map_spans_the_scan_range() {
        let points = phase_map(&WealthConfig::default());
        assert_eq!(points.len(), PHASE_POINTS);
        assert_eq!(points[0].capital, 0.0);
        assert_eq!(points[0].next, 0.0);
        assert_eq!(points.last().unwrap().capital, SCAN_CEILING);
        assert!(points.iter().all(|p| p.identity == p.capital));
    }

    #[test]
    fn noiseless_paths_follow_the_map() {
        let cfg = WealthConfig {
            noise: 0.0,
            init_jitter: 0.0,
            ..WealthConfig::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(1);
        let trajectories = monte_carlo(&cfg, &mut rng).unwrap();
        let mut k = cfg.initial_capital;
        for point in &trajectories {
            assert!(point.capital.iter().all(|&c| c == k));
            k = next_capital(&cfg, k);
        }
    }

    #[test]
    fn paths_stay_non_negative_and_have_fixed_shape() {
        let cfg = WealthConfig {
            noise: 5.0,
            initial_capital: 0.5,
            ..WealthConfig::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(2);
        let trajectories = monte_carlo(&cfg, &mut rng).unwrap();
        assert_eq!(trajectories.len(), MC_STEPS + 1);
        for (step, point) in trajectories.iter().enumerate() {
            assert_eq!(point.step, step);
            assert_eq!(point.capital.len(), MC_PATHS);
            assert!(point.capital.iter().all(|&c| c >= 0.0));
        }
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let cfg = WealthConfig::default();
        let run = |seed| {
            let mut rng = ChaCha12Rng::seed_from_u64(seed);
            monte_carlo(&cfg, &mut rng).unwrap()
        };
        assert_eq!(run(11), run(11));
        assert_ne!(run(11), run(12));
    }

    #[test]
    fn big_push_lifts_every_path_out_of_the_trap() {
        let cfg = WealthConfig {
            noise: 0.0,
            init_jitter: 0.0,
            initial_capital: 2.0,
            shock_magnitude: 20.0,
            shock_time: 5,
            ..WealthConfig::default()
        };
        let mut rng = ChaCha12Rng::seed_from_u64(3);
        let trajectories = monte_carlo(&cfg, &mut rng).unwrap();
        let before = trajectories[4].capital[0];
        let at = trajectories[5].capital[0];
        assert!((at - (next_capital(&cfg, before) + 20.0)).abs() < 1e-12);
        let threshold = trap_threshold(&find_equilibria(&cfg)).unwrap();
        assert!(trajectories[MC_STEPS].capital.iter().all(|&c| c > threshold));
    }

    #[test]
    fn standard_normal_has_unit_moments() {
        let mut rng = ChaCha12Rng::seed_from_u64(4);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / n as f64;
        let var = draws.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        assert!(mean.abs() < 0.05);
        assert!((var - 1.0).abs() < 0.05);
    }
}
