use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pathogen: PathogenConfig,
    pub world: WorldConfig,
    pub output: OutputConfig,
}

/// Parameters of the pathogen seeded as the outbreak.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct PathogenConfig {
    pub name: String,
    /// Base transmission probability, scaled per vector.
    pub base_infectivity: f64,
    /// Drives the daily mortality roll of infected agents.
    pub severity: f64,
    /// Per-gene per-day mutation probability.
    pub mutation_rate: f64,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Side length of the square domain.
    pub size: f64,
    /// Number of agents.
    pub n_agents: usize,
    /// Number of travel waypoints.
    pub n_cities: usize,
    /// Per-agent per-day relocation probability.
    pub travel_rate: f64,
    /// RNG seed; omitted means OS entropy.
    pub seed: Option<u64>,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Number of simulated days between trajectory saves.
    pub days_per_save: usize,
    /// Number of saves written per trajectory file.
    pub saves_per_file: usize,
}

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

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        check_num(self.pathogen.base_infectivity, 0.0..=1.0)
            .context("invalid base infectivity")?;
        check_num(self.pathogen.severity, 0.0..=1.0).context("invalid severity")?;
        check_num(self.pathogen.mutation_rate, 0.0..=1.0).context("invalid mutation rate")?;

        check_num(self.world.size, 1.0..10_000.0).context("invalid world size")?;
        check_num(self.world.n_agents, 1..100_000).context("invalid number of agents")?;
        check_num(self.world.n_cities, 0..100).context("invalid number of cities")?;
        check_num(self.world.travel_rate, 0.0..=1.0).context("invalid travel rate")?;

        check_num(self.output.days_per_save, 1..10_000).context("invalid days per save")?;
        check_num(self.output.saves_per_file, 1..10_000).context("invalid saves per file")?;

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

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            pathogen: PathogenConfig {
                name: "test".to_string(),
                base_infectivity: 0.64,
                severity: 0.26,
                mutation_rate: 0.05,
            },
            world: WorldConfig {
                size: 100.0,
                n_agents: 500,
                n_cities: 5,
                travel_rate: 0.09,
                seed: Some(42),
            },
            output: OutputConfig {
                days_per_save: 1,
                saves_per_file: 64,
            },
        }
    }

    #[test]
    fn valid_config_passes_validation() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let mut cfg = valid_config();
        cfg.pathogen.base_infectivity = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.pathogen.severity = -0.1;
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.world.n_agents = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = valid_config();
        cfg.world.travel_rate = 2.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn seed_is_optional() {
        let toml_str = r#"
[pathogen]
name = "SARS-CoV-3"
base_infectivity = 0.64
severity = 0.26
mutation_rate = 0.05

[world]
size = 100.0
n_agents = 500
n_cities = 5
travel_rate = 0.09

[output]
days_per_save = 1
saves_per_file = 64
"#;
        let cfg: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.world.seed, None);
        cfg.validate().unwrap();
    }
}
