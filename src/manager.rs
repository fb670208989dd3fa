use crate::config::Config;
use crate::engine::Engine;
use anyhow::{Context, Result};
use glob::glob;
use rmp_serde::encode;
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// Drives the engine from a run directory.
///
/// Reads `config.toml` from the directory and writes each result next to
/// it as a MessagePack file with named fields.
pub struct Manager {
    sim_dir: PathBuf,
    engine: Engine,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;

        let engine = Engine::new(cfg).context("failed to construct engine")?;
        log::info!("{:#?}", engine.cfg());

        Ok(Self { sim_dir, engine })
    }

    pub fn run_chain(&self) -> Result<()> {
        let result = self.engine.chain();
        self.save_result("chain", &result)
    }

    pub fn run_convergence(&self) -> Result<()> {
        let result = self.engine.convergence();
        self.save_result("convergence", &result)
    }

    pub fn run_path(&self) -> Result<()> {
        let result = self.engine.path();
        self.save_result("path", &result)
    }

    pub fn run_wealth(&mut self) -> Result<()> {
        let result = self
            .engine
            .wealth()
            .context("failed to run wealth dynamics")?;
        self.save_result("wealth", &result)
    }

    pub fn run_network(&mut self) -> Result<()> {
        let result = self
            .engine
            .network()
            .context("failed to run network growth")?;
        self.save_result("network", &result)
    }

    pub fn edit_matrix(&mut self, i_row: usize, i_col: usize, val: f64) -> Result<()> {
        let mat = self
            .engine
            .edit(i_row, i_col, val)
            .context("failed to edit matrix")?;
        self.save_result("matrix", &mat)?;
        // Show the edited matrix against the baseline.
        self.run_chain()
    }

    pub fn run_all(&mut self) -> Result<()> {
        self.run_chain()?;
        self.run_convergence()?;
        self.run_path()?;
        self.run_wealth()?;
        self.run_network()?;
        Ok(())
    }

    /// Remove every result file from the run directory.
    pub fn clean(&self) -> Result<()> {
        let pattern = self.sim_dir.join("*.msgpack");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        for file in glob(pattern)
            .context("failed to glob result files")?
            .filter_map(Result::ok)
        {
            fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
            log::info!("removed {file:?}");
        }
        Ok(())
    }

    fn result_file(&self, name: &str) -> PathBuf {
        self.sim_dir.join(format!("{name}.msgpack"))
    }

    fn save_result<T: Serialize>(&self, name: &str, result: &T) -> Result<()> {
        let file = self.result_file(name);
        let handle = File::create(&file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(handle);
        encode::write_named(&mut writer, result)
            .with_context(|| format!("failed to serialize {name} result"))?;
        writer.flush().context("failed to flush writer stream")?;
        log::info!("saved {file:?}");
        Ok(())
    }
}
