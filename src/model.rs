//! Simulation data types.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Health state of an agent.
///
/// Transitions are one-way along Healthy -> Infected -> Recovered | Deceased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Health {
    Healthy,
    Infected,
    Recovered,
    Deceased,
}

/// Mode of transmission, carrying an independent infectivity weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Vector {
    Airborne,
    Surface,
    Blood,
}

impl Vector {
    /// Full universe of vector kinds a pathogen can acquire through mutation.
    pub const ALL: [Vector; 3] = [Vector::Airborne, Vector::Surface, Vector::Blood];
}

/// Genetic traits of a pathogen, each a real value in [0,1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genes {
    /// Widens the contact radius.
    pub environmental_stability: f64,
    /// Probability that a new infection presents symptoms.
    pub asymptomatic_spread: f64,
    pub drug_resistance: f64,
    pub zoonotic_potential: f64,
}

impl Default for Genes {
    fn default() -> Self {
        Self {
            environmental_stability: 0.5,
            asymptomatic_spread: 0.6,
            drug_resistance: 0.8,
            zoonotic_potential: 0.1,
        }
    }
}

impl Genes {
    /// Mutable views of all genes in a fixed order.
    ///
    /// The order is part of the determinism contract: mutation rolls one
    /// draw per gene, in this order.
    fn iter_mut(&mut self) -> [&mut f64; 4] {
        [
            &mut self.environmental_stability,
            &mut self.asymptomatic_spread,
            &mut self.drug_resistance,
            &mut self.zoonotic_potential,
        ]
    }
}

/// The disease entity: immutable identity plus mutable genetic state.
///
/// Exactly one instance exists per active outbreak, held in the world's
/// outbreak table; every infected agent references it by index, so a
/// mutation is visible to the whole infected cohort at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pathogen {
    pub name: String,
    pub base_infectivity: f64,
    pub severity: f64,
    pub mutation_rate: f64,
    pub genes: Genes,
    /// Carried vectors and their weights; grows through mutation, never shrinks.
    pub vectors: BTreeMap<Vector, f64>,
}

const INITIAL_AIRBORNE_WEIGHT: f64 = 0.8;
const ACQUIRED_VECTOR_WEIGHT: f64 = 0.3;

impl Pathogen {
    pub fn new(name: &str, base_infectivity: f64, severity: f64, mutation_rate: f64) -> Self {
        Self {
            name: name.to_string(),
            base_infectivity,
            severity,
            mutation_rate,
            genes: Genes::default(),
            vectors: BTreeMap::from([(Vector::Airborne, INITIAL_AIRBORNE_WEIGHT)]),
        }
    }

    /// Infectivity through a given vector: zero if the vector is not carried.
    pub fn infectivity(&self, vector: Vector) -> f64 {
        self.base_infectivity * self.vectors.get(&vector).copied().unwrap_or(0.0)
    }

    /// Maximum distance at which transmission can be attempted.
    pub fn contact_radius(&self) -> f64 {
        1.0 + self.genes.environmental_stability * 3.0
    }

    /// Apply one day of genetic drift.
    ///
    /// Each gene independently mutates with probability `mutation_rate` by a
    /// uniform delta in [-0.2, 0.2], clamped to [0,1]. With probability
    /// `mutation_rate / 2` one vector kind is drawn uniformly from the full
    /// universe and acquired at a fixed initial weight if not yet carried;
    /// existing weights are untouched.
    pub fn mutate<R: Rng>(&mut self, rng: &mut R) {
        for gene in self.genes.iter_mut() {
            if rng.random::<f64>() < self.mutation_rate {
                *gene = (*gene + rng.random_range(-0.2..=0.2)).clamp(0.0, 1.0);
            }
        }

        if rng.random::<f64>() < self.mutation_rate / 2.0 {
            let kind = Vector::ALL[rng.random_range(0..Vector::ALL.len())];
            self.vectors.entry(kind).or_insert(ACQUIRED_VECTOR_WEIGHT);
        }
    }
}

/// Simulated person: a position in the world and a health state machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub x: f64,
    pub y: f64,
    pub health: Health,
    /// In [0,1]; set to 0.6 upon recovery, never decreases otherwise.
    pub immunity: f64,
    /// Index into the world's outbreak table; `None` while never infected.
    pub infection: Option<usize>,
    pub symptomatic: bool,
    pub quarantined: bool,
    pub vaccinated: bool,
    /// Day the infection began; meaningful only while `infection` is set.
    pub day_infected: u32,
}

const RECOVERY_IMMUNITY: f64 = 0.6;
const RECOVERY_DAYS: i64 = 14;

impl Agent {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            health: Health::Healthy,
            immunity: 0.0,
            infection: None,
            symptomatic: false,
            quarantined: false,
            vaccinated: false,
            day_infected: 0,
        }
    }

    pub fn distance_to(&self, other: &Agent) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Advance the health state machine by one day.
    ///
    /// Only Infected agents transition: the mortality roll comes first, then
    /// the recovery check against an illness duration jittered by a fresh
    /// uniform integer in [-3, 3]. Recovered and Deceased are absorbing.
    pub fn progress<R: Rng>(&mut self, current_day: u32, severity: f64, rng: &mut R) {
        if self.health != Health::Infected {
            return;
        }

        if rng.random::<f64>() < severity * 0.01 {
            self.health = Health::Deceased;
        } else {
            let jitter: i64 = rng.random_range(-3..=3);
            if current_day as i64 - self.day_infected as i64 > RECOVERY_DAYS + jitter {
                self.health = Health::Recovered;
                self.immunity = RECOVERY_IMMUNITY;
            }
        }
    }
}

/// Travel waypoint.
///
/// Kept as extensible state for future travel-targeting policies; cities do
/// not currently bias destination choice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub x: f64,
    pub y: f64,
    pub population_density: f64,
}

/// World-wide adaptive response levers.
///
/// Both levers are monotone ratchets driven by observed prevalence; they
/// persist after case counts subside.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    /// In [0, 0.5].
    pub quarantine_effectiveness: f64,
    /// In [0, 0.3].
    pub vaccination_rate: f64,
}

impl Policy {
    /// Tighten the levers in response to the current infected fraction.
    pub fn respond(&mut self, prevalence: f64) {
        if prevalence > 0.03 {
            self.quarantine_effectiveness = (self.quarantine_effectiveness + 0.02).min(0.5);
        }
        if prevalence > 0.1 {
            self.vaccination_rate = (self.vaccination_rate + 0.01).min(0.3);
        }
    }
}

/// State of the simulation at a given day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    /// Current simulated day.
    pub day: u32,

    /// Side length of the square domain [0,size] x [0,size].
    pub size: f64,

    /// Per-agent per-day probability of relocating.
    pub travel_rate: f64,

    /// All agents; fixed cardinality, deceased agents persist as inert records.
    pub population: Vec<Agent>,

    /// Fixed travel waypoints.
    pub cities: Vec<City>,

    /// Pathogen table; agents reference entries by index.
    pub outbreaks: Vec<Pathogen>,

    /// Index of the active outbreak, `None` before seeding.
    pub current_outbreak: Option<usize>,

    pub policy: Policy,
}

impl World {
    pub fn infected_count(&self) -> usize {
        self.population
            .iter()
            .filter(|agt| agt.health == Health::Infected)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha12Rng;

    #[test]
    fn infectivity_is_zero_for_uncarried_vector() {
        let pat = Pathogen::new("test", 0.64, 0.26, 0.05);
        assert_eq!(pat.infectivity(Vector::Airborne), 0.64 * 0.8);
        assert_eq!(pat.infectivity(Vector::Blood), 0.0);
    }

    #[test]
    fn mutation_keeps_genes_and_weights_clamped() {
        let mut rng = ChaCha12Rng::seed_from_u64(7);
        let mut pat = Pathogen::new("test", 0.64, 0.26, 0.9);

        for _ in 0..10_000 {
            pat.mutate(&mut rng);
            for gene in [
                pat.genes.environmental_stability,
                pat.genes.asymptomatic_spread,
                pat.genes.drug_resistance,
                pat.genes.zoonotic_potential,
            ] {
                assert!((0.0..=1.0).contains(&gene));
            }
            for &weight in pat.vectors.values() {
                assert!((0.0..=1.0).contains(&weight));
            }
        }
    }

    #[test]
    fn mutation_never_removes_vectors() {
        let mut rng = ChaCha12Rng::seed_from_u64(11);
        let mut pat = Pathogen::new("test", 0.64, 0.26, 0.9);

        let mut n_vectors = pat.vectors.len();
        for _ in 0..10_000 {
            pat.mutate(&mut rng);
            assert!(pat.vectors.len() >= n_vectors);
            n_vectors = pat.vectors.len();
        }
        // At this mutation rate every kind should have been acquired.
        assert_eq!(n_vectors, Vector::ALL.len());
        assert!(pat.vectors.contains_key(&Vector::Airborne));
    }

    #[test]
    fn acquired_vector_does_not_overwrite_existing_weight() {
        let mut rng = ChaCha12Rng::seed_from_u64(13);
        let mut pat = Pathogen::new("test", 0.64, 0.26, 1.0);

        for _ in 0..1_000 {
            pat.mutate(&mut rng);
            assert_eq!(pat.vectors[&Vector::Airborne], 0.8);
        }
    }

    #[test]
    fn infected_agent_past_illness_duration_recovers() {
        let mut rng = ChaCha12Rng::seed_from_u64(17);
        let mut agt = Agent::new(0.0, 0.0);
        agt.health = Health::Infected;
        agt.infection = Some(0);
        agt.day_infected = 0;

        // 20 days elapsed beats 14 + jitter for any jitter in [-3, 3].
        agt.progress(20, 0.0, &mut rng);
        assert_eq!(agt.health, Health::Recovered);
        assert_eq!(agt.immunity, 0.6);
    }

    #[test]
    fn recently_infected_agent_stays_infected() {
        let mut rng = ChaCha12Rng::seed_from_u64(19);
        let mut agt = Agent::new(0.0, 0.0);
        agt.health = Health::Infected;
        agt.infection = Some(0);
        agt.day_infected = 5;

        // 5 days elapsed is below 14 + jitter for any jitter in [-3, 3].
        agt.progress(10, 0.0, &mut rng);
        assert_eq!(agt.health, Health::Infected);
        assert_eq!(agt.immunity, 0.0);
    }

    #[test]
    fn healthy_and_absorbing_states_do_not_transition() {
        let mut rng = ChaCha12Rng::seed_from_u64(23);
        for health in [Health::Healthy, Health::Recovered, Health::Deceased] {
            let mut agt = Agent::new(0.0, 0.0);
            agt.health = health;
            for day in 0..100 {
                agt.progress(day, 1.0, &mut rng);
                assert_eq!(agt.health, health);
            }
        }
    }

    #[test]
    fn policy_levers_are_monotone_and_capped() {
        let mut policy = Policy::default();
        let mut prev = (0.0, 0.0);

        for prevalence in [0.0, 0.05, 0.2, 0.5, 1.0, 0.0, 0.2] {
            policy.respond(prevalence);
            assert!(policy.quarantine_effectiveness >= prev.0);
            assert!(policy.vaccination_rate >= prev.1);
            prev = (policy.quarantine_effectiveness, policy.vaccination_rate);
        }

        for _ in 0..100 {
            policy.respond(1.0);
        }
        assert_eq!(policy.quarantine_effectiveness, 0.5);
        assert!((policy.vaccination_rate - 0.3).abs() < 1e-12);
    }
}
