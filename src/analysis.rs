use crate::capital::TrajectoryPoint;
use crate::stats::{Accumulator, AccumulatorReport};
use serde::{Deserialize, Serialize};

/// Summary of a Monte Carlo ensemble produced by one observable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Report {
    /// Cross-path capital statistics, one entry per step.
    CapitalMoments(Vec<AccumulatorReport>),
    /// Share of paths below the trap threshold, one entry per step.
    TrapShare { threshold: f64, shares: Vec<f64> },
}

pub trait Obs {
    fn update(&mut self, point: &TrajectoryPoint);
    fn report(&self) -> Report;
}

pub struct CapitalMoments {
    reports: Vec<AccumulatorReport>,
}

impl CapitalMoments {
    pub fn new() -> Self {
        Self {
            reports: Vec::new(),
        }
    }
}

impl Obs for CapitalMoments {
    fn update(&mut self, point: &TrajectoryPoint) {
        let mut acc = Accumulator::new();
        point.capital.iter().for_each(|&k| acc.add(k));
        self.reports.push(acc.report());
    }

    fn report(&self) -> Report {
        Report::CapitalMoments(self.reports.clone())
    }
}

pub struct TrapShare {
    threshold: f64,
    shares: Vec<f64>,
}

impl TrapShare {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            shares: Vec::new(),
        }
    }
}

impl Obs for TrapShare {
    fn update(&mut self, point: &TrajectoryPoint) {
        let n_paths = point.capital.len();
        if n_paths == 0 {
            self.shares.push(0.0);
            return;
        }
        let n_trapped = point.capital.iter().filter(|&&k| k < self.threshold).count();
        self.shares.push(n_trapped as f64 / n_paths as f64);
    }

    fn report(&self) -> Report {
        Report::TrapShare {
            threshold: self.threshold,
            shares: self.shares.clone(),
        }
    }
}

/// Feeds trajectory points through a fixed set of observables.
pub struct Analyzer {
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    /// Without a trap threshold no path counts as trapped.
    pub fn new(trap_threshold: Option<f64>) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(CapitalMoments::new()),
            Box::new(TrapShare::new(trap_threshold.unwrap_or(0.0))),
        ];
        Self { obs_ptr_vec }
    }

    pub fn add_trajectory(&mut self, trajectory: &[TrajectoryPoint]) {
        for point in trajectory {
            for obs in &mut self.obs_ptr_vec {
                obs.update(point);
            }
        }
    }

    pub fn reports(&self) -> Vec<Report> {
        self.obs_ptr_vec.iter().map(|obs| obs.report()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(step: usize, capital: &[f64]) -> TrajectoryPoint {
        TrajectoryPoint {
            step,
            capital: capital.to_vec(),
        }
    }

    #[test]
    fn reports_one_entry_per_step() {
        let mut analyzer = Analyzer::new(Some(5.0));
        analyzer.add_trajectory(&[point(0, &[1.0, 3.0, 8.0, 10.0]), point(1, &[0.0, 6.0, 9.0, 12.0])]);
        let reports = analyzer.reports();
        assert_eq!(reports.len(), 2);

        let Report::CapitalMoments(moments) = &reports[0] else {
            panic!("unexpected report {:?}", reports[0]);
        };
        assert_eq!(moments.len(), 2);
        assert_eq!(moments[0].mean, 5.5);
        assert_eq!(moments[1].min, 0.0);
        assert_eq!(moments[1].max, 12.0);

        assert_eq!(
            reports[1],
            Report::TrapShare {
                threshold: 5.0,
                shares: vec![0.5, 0.25],
            }
        );
    }

    #[test]
    fn missing_threshold_traps_nobody() {
        let mut analyzer = Analyzer::new(None);
        analyzer.add_trajectory(&[point(0, &[0.0, 0.0])]);
        let Report::TrapShare { shares, .. } = &analyzer.reports()[1] else {
            panic!("expected trap share");
        };
        assert_eq!(shares, &vec![0.0]);
    }
}
