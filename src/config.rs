use crate::linalg::Matrix;
use crate::model::N_STATES;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Full configuration of a run.
///
/// Loaded from a TOML file and validated before use.
/// Every section may be omitted, in which case its defaults apply.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub chain: ChainConfig,
    pub convergence: ConvergenceConfig,
    pub path: PathConfig,
    pub wealth: WealthConfig,
    pub network: NetworkConfig,
    pub rng: RngConfig,
}

/// Daily-step chain simulation parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainConfig {
    /// Simulated horizon in years.
    pub horizon_years: usize,
    /// Daily probability shifted from falling to rising.
    pub perturbation_strength: f64,
    /// Starting state index.
    pub initial_state: usize,
    /// Explicit perturbed matrix replacing the perturbation rule.
    pub override_matrix: Option<Matrix>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            horizon_years: 10,
            perturbation_strength: 0.01,
            initial_state: 0,
            override_matrix: None,
        }
    }
}

/// Parameters of the identity-interpolation convergence demo.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvergenceConfig {
    /// Weight `m` of the uniform jump in `(1 - m) I + m J / N`.
    pub mixing: f64,
    /// Number of recorded steps.
    pub n_steps: usize,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            mixing: 0.5,
            n_steps: 50,
        }
    }
}

/// Behavioral knobs of the path-dependence analyzer.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathConfig {
    pub effort: f64,
    pub risk: f64,
    /// Make the top state absorbing.
    pub lock_in: bool,
}

/// Capital accumulation map parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WealthConfig {
    /// Productivity `A`.
    pub productivity: f64,
    /// Savings rate `s`.
    pub savings_rate: f64,
    /// Half-saturation threshold `H`.
    pub threshold: f64,
    /// Shape exponent `gamma`.
    pub shape: f64,
    /// Depreciation rate `delta`.
    pub depreciation: f64,
    /// Standard deviation of the additive noise.
    pub noise: f64,
    pub initial_capital: f64,
    /// Half-width of the uniform jitter of each path's initial capital.
    pub init_jitter: f64,
    pub shock_magnitude: f64,
    /// Step at which the shock is applied.
    pub shock_time: usize,
}

impl Default for WealthConfig {
    fn default() -> Self {
        Self {
            productivity: 12.0,
            savings_rate: 0.2,
            threshold: 10.0,
            shape: 3.0,
            depreciation: 0.1,
            noise: 0.5,
            initial_capital: 5.0,
            init_jitter: 1.0,
            shock_magnitude: 0.0,
            shock_time: 10,
        }
    }
}

/// Network growth and force-directed layout parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub n_nodes: usize,
    /// Links created by every new node.
    pub links_per_node: usize,
    pub layout_steps: usize,
    pub spring_length: f64,
    pub spring_strength: f64,
    pub repulsion: f64,
    /// Pull of every node towards the origin.
    pub gravity: f64,
    /// Fraction of velocity kept between steps.
    pub damping: f64,
    pub time_step: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            n_nodes: 60,
            links_per_node: 2,
            layout_steps: 200,
            spring_length: 30.0,
            spring_strength: 0.05,
            repulsion: 500.0,
            gravity: 0.01,
            damping: 0.85,
            time_step: 1.0,
        }
    }
}

/// Random number generator settings.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RngConfig {
    /// Fixed seed; the OS entropy source is used when absent.
    pub seed: Option<u64>,
}

/// Largest shock time accepted, equal to the Monte Carlo horizon.
pub const MAX_SHOCK_TIME: usize = crate::capital::MC_STEPS;

impl Config {
    /// Load a [`Config`] from a TOML file.
    ///
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;

        let config: Config = toml::from_str(&contents).context("failed to deserialize config")?;

        config.validate().context("invalid configuration")?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chain.validate().context("invalid chain section")?;
        self.convergence
            .validate()
            .context("invalid convergence section")?;
        self.path.validate().context("invalid path section")?;
        self.wealth.validate().context("invalid wealth section")?;
        self.network.validate().context("invalid network section")?;
        Ok(())
    }
}

impl ChainConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.horizon_years, 1..=100).context("invalid horizon")?;
        check_num(self.perturbation_strength, 0.0..=0.05)
            .context("invalid perturbation strength")?;
        check_num(self.initial_state, 0..N_STATES).context("invalid initial state")?;
        if let Some(mat) = &self.override_matrix {
            check_mat(mat, N_STATES).context("invalid override matrix")?;
        }
        Ok(())
    }
}

impl ConvergenceConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.mixing, 0.0..=1.0).context("invalid mixing weight")?;
        check_num(self.n_steps, 1..=10_000).context("invalid number of steps")?;
        Ok(())
    }
}

impl PathConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.effort, 0.0..=1.0).context("invalid effort")?;
        check_num(self.risk, 0.0..=1.0).context("invalid risk")?;
        Ok(())
    }
}

impl WealthConfig {
    fn validate(&self) -> Result<()> {
        check_pos(self.productivity).context("invalid productivity")?;
        check_open_unit(self.savings_rate).context("invalid savings rate")?;
        check_pos(self.threshold).context("invalid threshold")?;
        if !(self.shape > 1.0 && self.shape.is_finite()) {
            bail!("invalid shape: number must be greater than 1, but is {}", self.shape);
        }
        check_open_unit(self.depreciation).context("invalid depreciation")?;
        check_num(self.noise, 0.0..f64::INFINITY).context("invalid noise")?;
        check_num(self.initial_capital, 0.0..f64::INFINITY).context("invalid initial capital")?;
        check_num(self.init_jitter, 0.0..f64::INFINITY).context("invalid initial jitter")?;
        check_num(self.shock_magnitude, 0.0..f64::INFINITY).context("invalid shock magnitude")?;
        check_num(self.shock_time, 0..=MAX_SHOCK_TIME).context("invalid shock time")?;
        Ok(())
    }
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        check_num(self.n_nodes, 2..=500).context("invalid number of nodes")?;
        check_num(self.links_per_node, 1..=10).context("invalid links per node")?;
        check_num(self.layout_steps, 0..=10_000).context("invalid number of layout steps")?;
        check_pos(self.spring_length).context("invalid spring length")?;
        check_num(self.spring_strength, 0.0..=1.0).context("invalid spring strength")?;
        check_num(self.repulsion, 0.0..f64::INFINITY).context("invalid repulsion")?;
        check_num(self.gravity, 0.0..=1.0).context("invalid gravity")?;
        check_num(self.damping, 0.0..=1.0).context("invalid damping")?;
        check_pos(self.time_step).context("invalid time step")?;
        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

fn check_pos(num: f64) -> Result<()> {
    if !(num > 0.0 && num.is_finite()) {
        bail!("number must be positive, but is {num:?}");
    }
    Ok(())
}

fn check_open_unit(num: f64) -> Result<()> {
    if !(num > 0.0 && num < 1.0) {
        bail!("number must be in the open interval (0, 1), but is {num:?}");
    }
    Ok(())
}

fn check_vec(vec: &[f64], exp_len: usize) -> Result<()> {
    let len = vec.len();
    if len != exp_len {
        bail!("vector length must be {exp_len}, but is {len}");
    }
    if vec.iter().any(|&ele| ele < 0.0 || !ele.is_finite()) {
        bail!("vector must have only finite non-negative elements");
    }
    let sum: f64 = vec.iter().sum();
    let tol = 1e-8;
    if (sum - 1.0).abs() > tol {
        bail!("vector must sum to 1.0 (tolerance: {tol}), but sums to {sum}");
    }
    Ok(())
}

/// Check that `mat` is a `dim x dim` row-stochastic matrix.
pub fn check_mat(mat: &[Vec<f64>], dim: usize) -> Result<()> {
    let n_rows = mat.len();
    if n_rows != dim {
        bail!("matrix must have {dim} rows, but has {n_rows}");
    }
    for (i_row, row) in mat.iter().enumerate() {
        check_vec(row, dim).with_context(|| format!("invalid row {i_row}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_sections_are_filled_in() {
        let config: Config = toml::from_str(
            "[path]\nlock_in = true\neffort = 0.3\n\n[rng]\nseed = 42\n",
        )
        .unwrap();
        assert!(config.path.lock_in);
        assert_eq!(config.path.effort, 0.3);
        assert_eq!(config.path.risk, 0.0);
        assert_eq!(config.rng.seed, Some(42));
        assert_eq!(config.wealth, WealthConfig::default());
    }

    #[test]
    fn out_of_range_knobs_are_rejected() {
        let mut config = Config::default();
        config.chain.perturbation_strength = 0.2;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.path.risk = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.wealth.shape = 1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.chain.initial_state = N_STATES;
        assert!(config.validate().is_err());
    }

    #[test]
    fn override_matrix_must_be_stochastic() {
        let mut config = Config::default();
        let mut mat = crate::model::daily_mobility();
        config.chain.override_matrix = Some(mat.clone());
        config.validate().unwrap();

        mat[2][2] += 0.1;
        config.chain.override_matrix = Some(mat);
        assert!(config.validate().is_err());

        config.chain.override_matrix = Some(vec![vec![1.0]]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("[path]\nluck = 0.5\n").is_err());
    }
}
