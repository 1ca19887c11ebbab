use serde::{Deserialize, Serialize};

/// Online mean and variance accumulator (Welford's algorithm).
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccumulatorReport {
    pub mean: f64,
    pub std_dev: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
        }
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;
    }

    pub fn report(&self) -> AccumulatorReport {
        AccumulatorReport {
            mean: self.mean,
            std_dev: if self.n_vals > 1 {
                (self.diff_2_sum / (self.n_vals as f64 - 1.0)).sqrt()
            } else {
                f64::NAN
            },
        }
    }
}

/// Tracks the maximum of a day-indexed series and when it occurred.
pub struct Peak {
    max: f64,
    day: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeakReport {
    pub max: f64,
    pub day: u32,
}

impl Peak {
    pub fn new() -> Self {
        Self {
            max: f64::NEG_INFINITY,
            day: 0,
        }
    }

    pub fn add(&mut self, val: f64, day: u32) {
        if val > self.max {
            self.max = val;
            self.day = day;
        }
    }

    pub fn report(&self) -> PeakReport {
        PeakReport {
            max: self.max,
            day: self.day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_matches_direct_computation() {
        let vals = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut acc = Accumulator::new();
        for &val in &vals {
            acc.add(val);
        }

        let report = acc.report();
        assert!((report.mean - 3.0).abs() < 1e-12);
        // Sample variance of 1..=5 is 2.5.
        assert!((report.std_dev - 2.5_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn peak_keeps_first_maximum() {
        let mut peak = Peak::new();
        for (day, val) in [(1, 0.1), (2, 0.7), (3, 0.7), (4, 0.2)] {
            peak.add(val, day);
        }

        let report = peak.report();
        assert_eq!(report.max, 0.7);
        assert_eq!(report.day, 2);
    }
}
