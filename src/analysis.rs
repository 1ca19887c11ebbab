use crate::config::Config;
use crate::model::{Health, World};
use crate::stats::{Accumulator, Peak};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Observable computed over a sequence of saved world snapshots.
pub trait Obs {
    fn update(&mut self, world: &World) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Mean population fraction in each health state.
pub struct HealthFractions {
    acc_vec: Vec<Accumulator>,
}

const HEALTH_STATES: [Health; 4] = [
    Health::Healthy,
    Health::Infected,
    Health::Recovered,
    Health::Deceased,
];

impl HealthFractions {
    pub fn new() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(HEALTH_STATES.len(), Accumulator::new);
        Self { acc_vec }
    }
}

impl Obs for HealthFractions {
    fn update(&mut self, world: &World) -> Result<()> {
        let n_agt = world.population.len();
        if n_agt == 0 {
            return Ok(());
        }
        for (health, acc) in HEALTH_STATES.iter().zip(self.acc_vec.iter_mut()) {
            let count = world
                .population
                .iter()
                .filter(|agt| agt.health == *health)
                .count();
            acc.add(count as f64 / n_agt as f64);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.acc_vec.iter().map(|acc| acc.report()).collect();
        serde_json::json!({
            "healthy": reports[0],
            "infected": reports[1],
            "recovered": reports[2],
            "deceased": reports[3],
        })
    }
}

/// Maximum infected fraction and the day it was reached.
pub struct PeakPrevalence {
    peak: Peak,
}

impl PeakPrevalence {
    pub fn new() -> Self {
        Self { peak: Peak::new() }
    }
}

impl Obs for PeakPrevalence {
    fn update(&mut self, world: &World) -> Result<()> {
        let n_agt = world.population.len();
        if n_agt == 0 {
            return Ok(());
        }
        let fraction = world.infected_count() as f64 / n_agt as f64;
        self.peak.add(fraction, world.day);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "peak_prevalence": self.peak.report() })
    }
}

/// Final values of the response levers.
///
/// Both levers are monotone, so the last snapshot carries the extremum.
pub struct PolicyLevers {
    quarantine_effectiveness: f64,
    vaccination_rate: f64,
}

impl PolicyLevers {
    pub fn new() -> Self {
        Self {
            quarantine_effectiveness: 0.0,
            vaccination_rate: 0.0,
        }
    }
}

impl Obs for PolicyLevers {
    fn update(&mut self, world: &World) -> Result<()> {
        self.quarantine_effectiveness = world.policy.quarantine_effectiveness;
        self.vaccination_rate = world.policy.vaccination_rate;
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "quarantine_effectiveness": self.quarantine_effectiveness,
            "vaccination_rate": self.vaccination_rate,
        })
    }
}

/// Mean gene values of the active outbreak, plus its final vector count.
pub struct GeneDrift {
    acc_vec: Vec<Accumulator>,
    n_vectors: usize,
}

impl GeneDrift {
    pub fn new() -> Self {
        let mut acc_vec = Vec::new();
        acc_vec.resize_with(4, Accumulator::new);
        Self {
            acc_vec,
            n_vectors: 0,
        }
    }
}

impl Obs for GeneDrift {
    fn update(&mut self, world: &World) -> Result<()> {
        let Some(idx) = world.current_outbreak else {
            return Ok(());
        };
        let pathogen = &world.outbreaks[idx];
        let genes = [
            pathogen.genes.environmental_stability,
            pathogen.genes.asymptomatic_spread,
            pathogen.genes.drug_resistance,
            pathogen.genes.zoonotic_potential,
        ];
        for (acc, gene) in self.acc_vec.iter_mut().zip(genes) {
            acc.add(gene);
        }
        self.n_vectors = pathogen.vectors.len();
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let reports: Vec<_> = self.acc_vec.iter().map(|acc| acc.report()).collect();
        serde_json::json!({
            "environmental_stability": reports[0],
            "asymptomatic_spread": reports[1],
            "drug_resistance": reports[2],
            "zoonotic_potential": reports[3],
            "n_vectors": self.n_vectors,
        })
    }
}

/// Runs every observable over the trajectory files of a run.
pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(HealthFractions::new()),
            Box::new(PeakPrevalence::new()),
            Box::new(PolicyLevers::new()),
            Box::new(GeneDrift::new()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.saves_per_file {
            let world = decode::from_read(&mut reader).context("failed to read state")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&world).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Agent, Policy};

    fn world_with_counts(healthy: usize, infected: usize, day: u32) -> World {
        let mut population = Vec::new();
        for _ in 0..healthy {
            population.push(Agent::new(0.0, 0.0));
        }
        for _ in 0..infected {
            let mut agt = Agent::new(0.0, 0.0);
            agt.health = Health::Infected;
            agt.infection = Some(0);
            population.push(agt);
        }
        World {
            day,
            size: 100.0,
            travel_rate: 0.0,
            population,
            cities: Vec::new(),
            outbreaks: Vec::new(),
            current_outbreak: None,
            policy: Policy::default(),
        }
    }

    #[test]
    fn health_fractions_average_over_snapshots() {
        let mut obs = HealthFractions::new();
        obs.update(&world_with_counts(10, 0, 1)).unwrap();
        obs.update(&world_with_counts(5, 5, 2)).unwrap();

        let report = obs.report();
        assert_eq!(report["healthy"]["mean"], 0.75);
        assert_eq!(report["infected"]["mean"], 0.25);
    }

    #[test]
    fn peak_prevalence_records_the_worst_day() {
        let mut obs = PeakPrevalence::new();
        obs.update(&world_with_counts(9, 1, 1)).unwrap();
        obs.update(&world_with_counts(4, 6, 2)).unwrap();
        obs.update(&world_with_counts(8, 2, 3)).unwrap();

        let report = obs.report();
        assert_eq!(report["peak_prevalence"]["max"], 0.6);
        assert_eq!(report["peak_prevalence"]["day"], 2);
    }

    #[test]
    fn policy_levers_track_the_last_snapshot() {
        let mut obs = PolicyLevers::new();

        let mut world = world_with_counts(10, 0, 1);
        world.policy.quarantine_effectiveness = 0.1;
        world.policy.vaccination_rate = 0.02;
        obs.update(&world).unwrap();

        world.policy.quarantine_effectiveness = 0.3;
        obs.update(&world).unwrap();

        let report = obs.report();
        assert_eq!(report["quarantine_effectiveness"], 0.3);
        assert_eq!(report["vaccination_rate"], 0.02);
    }
}
