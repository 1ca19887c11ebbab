use crate::config::Config;
use crate::model::{Agent, City, Health, Pathogen, Policy, Vector, World};
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, world state, and random number generator,
/// and provides methods to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    world: World,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a random initial state.
    ///
    /// Agents and cities are placed uniformly over the domain; no outbreak is
    /// active until [`Engine::seed_outbreak`] is called.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let mut rng = match cfg.world.seed {
            Some(seed) => ChaCha12Rng::seed_from_u64(seed),
            None => ChaCha12Rng::try_from_os_rng()?,
        };

        let pos_dist = Uniform::new(0.0, cfg.world.size)?;

        let mut population = Vec::with_capacity(cfg.world.n_agents);
        for _ in 0..cfg.world.n_agents {
            population.push(Agent::new(pos_dist.sample(&mut rng), pos_dist.sample(&mut rng)));
        }

        let density_dist = Uniform::new(0.1, 0.9)?;
        let mut cities = Vec::with_capacity(cfg.world.n_cities);
        for _ in 0..cfg.world.n_cities {
            cities.push(City {
                x: pos_dist.sample(&mut rng),
                y: pos_dist.sample(&mut rng),
                population_density: density_dist.sample(&mut rng),
            });
        }

        let world = World {
            day: 0,
            size: cfg.world.size,
            travel_rate: cfg.world.travel_rate,
            population,
            cities,
            outbreaks: Vec::new(),
            current_outbreak: None,
            policy: Policy::default(),
        };

        Ok(Self { cfg, world, rng })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Read-only snapshot of the simulation state.
    ///
    /// Only consistent between steps: [`Engine::step`] fully advances one day
    /// before returning.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Start the outbreak by infecting one uniformly-random healthy agent.
    ///
    /// # Errors
    /// Fails if an outbreak is already active or no healthy agent is left
    /// to serve as patient zero.
    pub fn seed_outbreak(&mut self, pathogen: Pathogen) -> Result<()> {
        if self.world.current_outbreak.is_some() {
            bail!("an outbreak is already active");
        }

        let healthy: Vec<usize> = self
            .world
            .population
            .iter()
            .enumerate()
            .filter(|(_, agt)| agt.health == Health::Healthy)
            .map(|(idx, _)| idx)
            .collect();
        if healthy.is_empty() {
            bail!("no healthy agent available as patient zero");
        }
        let patient_zero = healthy[self.rng.random_range(0..healthy.len())];

        log::info!("seeding outbreak {:?}", pathogen.name);

        self.world.outbreaks.push(pathogen);
        let outbreak_idx = self.world.outbreaks.len() - 1;
        self.world.current_outbreak = Some(outbreak_idx);

        let agt = &mut self.world.population[patient_zero];
        agt.health = Health::Infected;
        agt.infection = Some(outbreak_idx);
        agt.day_infected = self.world.day;

        Ok(())
    }

    /// Advance the simulation by one day.
    ///
    /// Sub-steps run in a fixed order, and the order of random draws within
    /// each is part of the reproducibility contract: policy response, travel,
    /// transmission pass, health progression, pathogen mutation.
    pub fn step(&mut self) -> Result<()> {
        if self.world.population.is_empty() {
            bail!("cannot step a world with no population");
        }

        self.world.day += 1;

        self.apply_policy().context("failed to apply policy response")?;
        self.simulate_travel().context("failed to simulate travel")?;
        self.spread_infection()
            .context("failed to perform transmission pass")?;
        self.progress_population();
        self.mutate_outbreak();

        Ok(())
    }

    /// Perform the simulation and save the visited states to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        for i_save in 0..self.cfg.output.saves_per_file {
            for _ in 0..self.cfg.output.days_per_save {
                self.step().context("failed to perform step")?;
            }

            encode::write(&mut writer, &self.world).context("failed to serialize state")?;

            let progress = 100.0 * (i_save + 1) as f64 / self.cfg.output.saves_per_file as f64;
            log::info!("completed {progress:06.2}%");
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }

    fn apply_policy(&mut self) -> Result<()> {
        let n_agt = self.world.population.len();
        let prevalence = self.world.infected_count() as f64 / n_agt as f64 * 1.05;
        self.world.policy.respond(prevalence);

        let quarantine_dist = Bernoulli::new(self.world.policy.quarantine_effectiveness)?;
        let vaccination_dist = Bernoulli::new(self.world.policy.vaccination_rate / 250.0)?;

        for agt in &mut self.world.population {
            // Quarantine assignment is re-rolled daily and idempotent; it
            // only ever sets the flag.
            if agt.symptomatic && quarantine_dist.sample(&mut self.rng) {
                agt.quarantined = true;
            }
            if vaccination_dist.sample(&mut self.rng) {
                agt.vaccinated = true;
            }
        }

        Ok(())
    }

    fn simulate_travel(&mut self) -> Result<()> {
        let travel_dist = Bernoulli::new(self.world.travel_rate)?;
        let offset_dist = Uniform::new_inclusive(-5.0, 5.0)?;
        let size = self.world.size;

        for agt in &mut self.world.population {
            if travel_dist.sample(&mut self.rng) {
                agt.x = (agt.x + offset_dist.sample(&mut self.rng)).clamp(0.0, size);
                agt.y = (agt.y + offset_dist.sample(&mut self.rng)).clamp(0.0, size);
            }
        }

        Ok(())
    }

    fn spread_infection(&mut self) -> Result<()> {
        let day = self.world.day;
        let World {
            population,
            outbreaks,
            ..
        } = &mut self.world;
        let rng = &mut self.rng;

        // Snapshot the source set before mutating any target: agents infected
        // during this pass must not transmit until the next day.
        let sources: Vec<usize> = population
            .iter()
            .enumerate()
            .filter(|(_, agt)| agt.health == Health::Infected && !agt.quarantined)
            .map(|(idx, _)| idx)
            .collect();

        for src_idx in sources {
            let src = population[src_idx].clone();
            let outbreak_idx = src
                .infection
                .context("infected source carries no pathogen reference")?;
            let pathogen = &outbreaks[outbreak_idx];
            let radius = pathogen.contact_radius();
            let kinds: Vec<Vector> = pathogen.vectors.keys().copied().collect();

            for tgt_idx in 0..population.len() {
                // Target eligibility is evaluated per pair, so an agent
                // infected earlier in the pass is skipped for later sources.
                let tgt = &population[tgt_idx];
                if tgt.health != Health::Healthy || tgt.vaccinated {
                    continue;
                }

                let distance = src.distance_to(tgt);
                // One fresh vector draw per pair, uniform over carried kinds.
                let kind = kinds[rng.random_range(0..kinds.len())];
                let infectivity = pathogen.infectivity(kind);

                if distance < radius && rng.random::<f64>() < infectivity * (1.0 - tgt.immunity) {
                    let tgt = &mut population[tgt_idx];
                    tgt.health = Health::Infected;
                    tgt.infection = Some(outbreak_idx);
                    tgt.day_infected = day;
                    tgt.symptomatic = rng.random::<f64>() < pathogen.genes.asymptomatic_spread;
                }
            }
        }

        Ok(())
    }

    fn progress_population(&mut self) {
        let day = self.world.day;
        let World {
            population,
            outbreaks,
            ..
        } = &mut self.world;

        for agt in population.iter_mut() {
            let severity = agt
                .infection
                .map(|idx| outbreaks[idx].severity)
                .unwrap_or(0.0);
            agt.progress(day, severity, &mut self.rng);
        }
    }

    fn mutate_outbreak(&mut self) {
        if let Some(idx) = self.world.current_outbreak {
            self.world.outbreaks[idx].mutate(&mut self.rng);
        }
    }
}
