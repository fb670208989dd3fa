use crate::absorbing::{PathResult, analyze_path};
use crate::capital::{WealthResult, run_wealth};
use crate::chain::{ChainResult, ConvergenceResult, run_convergence_simulation, run_simulation};
use crate::config::{Config, check_mat};
use crate::linalg::{Matrix, update_matrix_probability};
use crate::model::{N_STATES, daily_mobility};
use crate::network::{Network, run_network};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;

/// Computation engine.
///
/// Holds the configuration and the random number generator that every
/// stochastic computation draws from. Deterministic computations ignore
/// the generator.
pub struct Engine {
    cfg: Config,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create an `Engine`, seeding the generator from the configured seed
    /// or from the OS if none is given.
    pub fn new(cfg: Config) -> Result<Self> {
        let rng = match cfg.rng.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng().context("failed to seed rng from the OS")?,
        };
        Ok(Self { cfg, rng })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    pub fn chain(&self) -> ChainResult {
        run_simulation(&self.cfg.chain)
    }

    pub fn convergence(&self) -> ConvergenceResult {
        run_convergence_simulation(&self.cfg.convergence)
    }

    pub fn path(&self) -> PathResult {
        analyze_path(&self.cfg.path)
    }

    pub fn wealth(&mut self) -> Result<WealthResult> {
        run_wealth(&self.cfg.wealth, &mut self.rng)
    }

    pub fn network(&mut self) -> Result<Network> {
        run_network(&self.cfg.network, &mut self.rng)
    }

    /// Edit one probability of the chain's perturbed matrix (the override
    /// if configured, the daily baseline otherwise) and keep the result as
    /// the new override.
    pub fn edit(&mut self, i_row: usize, i_col: usize, val: f64) -> Result<Matrix> {
        let mat = self
            .cfg
            .chain
            .override_matrix
            .clone()
            .unwrap_or_else(daily_mobility);
        let mat = update_matrix_probability(&mat, i_row, i_col, val)
            .context("invalid configuration")?;
        check_mat(&mat, N_STATES).context("edited matrix is not stochastic")?;
        self.cfg.chain.override_matrix = Some(mat.clone());
        Ok(mat)
    }
}
