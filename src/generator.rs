use std::time::Duration;

use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaChaRng};
use rand_distr::{Distribution, WeightedIndex};

use crate::{AppointmentType, Registration};

/// Severity distribution: mild conditions are the most common.
const SEVERITY_WEIGHTS: [u32; 5] = [35, 30, 20, 10, 5];
/// Appointment channel distribution: walk-in, scheduled, emergency.
const TYPE_WEIGHTS: [u32; 3] = [60, 30, 10];

/// Generates randomized registrations for the service simulation.
///
/// Arrival times are spread over a simulated window (1–4 seconds between
/// consecutive arrivals), so the queue sees a mix of long- and
/// short-waiting patients rather than everyone arriving at once. Seeded
/// generators produce identical sequences.
pub struct PatientGenerator {
    rng: ChaChaRng,
    severity_dist: WeightedIndex<u32>,
    type_dist: WeightedIndex<u32>,
    counter: usize,
}

impl PatientGenerator {
    /// A generator seeded for reproducibility, or from entropy when no seed
    /// is given.
    #[must_use]
    pub fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(ChaChaRng::from_entropy, ChaChaRng::seed_from_u64);
        Self {
            rng,
            severity_dist: WeightedIndex::new(&SEVERITY_WEIGHTS).expect("static weights are valid"),
            type_dist: WeightedIndex::new(&TYPE_WEIGHTS).expect("static weights are valid"),
            counter: 0,
        }
    }

    /// Generates `count` registrations named `P1`, `P2`, ... with arrival
    /// times starting at `start` and stepping 1–4 seconds apart.
    pub fn generate(&mut self, count: usize, start: Duration) -> Vec<Registration> {
        let mut arrival = start;
        (0..count)
            .map(|_| {
                self.counter += 1;
                let registration = Registration {
                    name: format!("P{}", self.counter),
                    age: self.rng.gen_range(1..=90),
                    severity: self.severity(),
                    urgency: self.rng.gen_range(1..=5),
                    appointment_type: self.appointment_type(),
                    notes: String::new(),
                    arrival_time: Some(arrival),
                };
                arrival += Duration::from_secs(self.rng.gen_range(1..=4));
                registration
            })
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn severity(&mut self) -> u8 {
        self.severity_dist.sample(&mut self.rng) as u8 + 1
    }

    fn appointment_type(&mut self) -> AppointmentType {
        match self.type_dist.sample(&mut self.rng) {
            0 => AppointmentType::WalkIn,
            1 => AppointmentType::Scheduled,
            _ => AppointmentType::Emergency,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generated_attributes_are_in_domain() {
        let mut generator = PatientGenerator::new(Some(17));
        let registrations = generator.generate(200, Duration::default());
        assert_eq!(registrations.len(), 200);
        for registration in &registrations {
            assert!((1..=5).contains(&registration.severity));
            assert!((1..=5).contains(&registration.urgency));
            assert!((1..=90).contains(&registration.age));
            assert!(!registration.name.is_empty());
            assert!(registration.arrival_time.is_some());
        }
    }

    #[test]
    fn test_arrivals_are_spread_and_increasing() {
        let mut generator = PatientGenerator::new(Some(17));
        let registrations = generator.generate(50, Duration::from_secs(5));
        assert_eq!(registrations[0].arrival_time, Some(Duration::from_secs(5)));
        let arrivals: Vec<_> = registrations
            .iter()
            .map(|r| r.arrival_time.unwrap())
            .collect();
        for pair in arrivals.windows(2) {
            let step = pair[1] - pair[0];
            assert!(step >= Duration::from_secs(1) && step <= Duration::from_secs(4));
        }
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let a = PatientGenerator::new(Some(42)).generate(30, Duration::default());
        let b = PatientGenerator::new(Some(42)).generate(30, Duration::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_names_continue_across_batches() {
        let mut generator = PatientGenerator::new(Some(1));
        let first = generator.generate(3, Duration::default());
        let second = generator.generate(2, Duration::default());
        assert_eq!(first[0].name, "P1");
        assert_eq!(second[0].name, "P4");
        assert_eq!(second[1].name, "P5");
    }
}
