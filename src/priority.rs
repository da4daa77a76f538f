use std::cmp::Reverse;
use std::time::Duration;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::{AgeGroup, AppointmentType, PatientId, PatientRecord};

/// Weight configuration of the priority model.
///
/// The score of a waiting patient is the weighted sum
///
/// ```text
/// severity * severity_weight + urgency * urgency_weight
///     + age bonus + appointment-type bonus
///     + waiting minutes * wait_weight_per_minute
/// ```
///
/// The wait term grows without bound, so for fixed attributes the score is
/// strictly increasing in waiting time and no patient starves. The defaults
/// put one severity step at 100 points, making the emergency bonus worth two
/// steps and an hour of waiting worth 60 points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PriorityWeights {
    /// Multiplier of the severity ordinal.
    pub severity_weight: f64,
    /// Multiplier of the urgency ordinal.
    pub urgency_weight: f64,
    /// Points added per minute of waiting.
    pub wait_weight_per_minute: f64,
    /// Additive bonus for children.
    pub age_bonus_child: f64,
    /// Additive bonus for seniors.
    pub age_bonus_senior: f64,
    /// Additive bonus for walk-ins.
    pub type_bonus_walk_in: f64,
    /// Additive bonus for scheduled appointments.
    pub type_bonus_scheduled: f64,
    /// Additive bonus for emergencies.
    pub type_bonus_emergency: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            severity_weight: 100.0,
            urgency_weight: 10.0,
            wait_weight_per_minute: 1.0,
            age_bonus_child: 5.0,
            age_bonus_senior: 5.0,
            type_bonus_walk_in: 0.0,
            type_bonus_scheduled: 100.0,
            type_bonus_emergency: 200.0,
        }
    }
}

impl PriorityWeights {
    /// The additive bonus for the given age bracket.
    #[must_use]
    pub fn age_bonus(&self, age_group: AgeGroup) -> f64 {
        match age_group {
            AgeGroup::Child => self.age_bonus_child,
            AgeGroup::Adult => 0.0,
            AgeGroup::Senior => self.age_bonus_senior,
        }
    }

    /// The additive bonus for the given appointment type.
    #[must_use]
    pub fn type_bonus(&self, appointment_type: AppointmentType) -> f64 {
        match appointment_type {
            AppointmentType::WalkIn => self.type_bonus_walk_in,
            AppointmentType::Scheduled => self.type_bonus_scheduled,
            AppointmentType::Emergency => self.type_bonus_emergency,
        }
    }

    /// Scores a record as of `now`. Pure: no part of the record is mutated.
    ///
    /// Arrivals in the simulated future contribute zero wait.
    #[must_use]
    pub fn score(&self, record: &PatientRecord, now: Duration) -> f64 {
        let waited = now
            .checked_sub(record.arrival_time())
            .unwrap_or_default()
            .as_secs_f64()
            / 60.0;
        self.severity_weight * f64::from(record.severity())
            + self.urgency_weight * f64::from(record.urgency())
            + self.age_bonus(record.age_group())
            + self.type_bonus(record.appointment_type())
            + self.wait_weight_per_minute * waited
    }
}

/// Total order on waiting patients: score descending, then arrival time
/// ascending, then ID ascending. The greatest key is served first, so the
/// key slots directly into a max-heap, and equal scores resolve
/// deterministically for reproducible simulation output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PriorityKey {
    score: OrderedFloat<f64>,
    arrival: Reverse<Duration>,
    id: Reverse<PatientId>,
}

impl PriorityKey {
    /// Builds the key from a score and the tie-break attributes.
    #[must_use]
    pub fn new(score: f64, arrival_time: Duration, id: PatientId) -> Self {
        Self {
            score: OrderedFloat(score),
            arrival: Reverse(arrival_time),
            id: Reverse(id),
        }
    }

    /// The key of a record based on its stored score.
    #[must_use]
    pub fn of(record: &PatientRecord) -> Self {
        Self::new(record.score(), record.arrival_time(), record.id())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{PatientStatus, Registration};

    use quickcheck_macros::quickcheck;

    fn record(
        id: u64,
        severity: u8,
        urgency: u8,
        appointment_type: AppointmentType,
        arrival: Duration,
    ) -> PatientRecord {
        PatientRecord::new(
            PatientId::from(id),
            Registration::new("P", 30, severity, urgency, appointment_type),
            arrival,
        )
    }

    #[test]
    fn test_default_weights_scenario() {
        let weights = PriorityWeights::default();
        let adult_walk_in = record(1, 5, 3, AppointmentType::WalkIn, Duration::default());
        let adult_emergency = record(2, 5, 3, AppointmentType::Emergency, Duration::default());
        let now = Duration::default();
        assert!(float_cmp::approx_eq!(f64, weights.score(&adult_walk_in, now), 530.0));
        assert!(float_cmp::approx_eq!(f64, weights.score(&adult_emergency, now), 730.0));
    }

    #[test]
    fn test_age_bonus_applies_to_child_and_senior() {
        let weights = PriorityWeights::default();
        let child = PatientRecord::new(
            PatientId::from(1_u64),
            Registration::new("C", 8, 2, 2, AppointmentType::WalkIn),
            Duration::default(),
        );
        let adult = PatientRecord::new(
            PatientId::from(2_u64),
            Registration::new("A", 30, 2, 2, AppointmentType::WalkIn),
            Duration::default(),
        );
        let senior = PatientRecord::new(
            PatientId::from(3_u64),
            Registration::new("S", 72, 2, 2, AppointmentType::WalkIn),
            Duration::default(),
        );
        let now = Duration::default();
        assert!(float_cmp::approx_eq!(
            f64,
            weights.score(&child, now),
            weights.score(&adult, now) + weights.age_bonus_child
        ));
        assert!(float_cmp::approx_eq!(
            f64,
            weights.score(&senior, now),
            weights.score(&adult, now) + weights.age_bonus_senior
        ));
    }

    #[quickcheck]
    fn prop_score_strictly_increases_with_wait(
        severity: u8,
        urgency: u8,
        wait_a: u16,
        wait_b: u16,
    ) -> bool {
        let severity = severity % 5 + 1;
        let urgency = urgency % 5 + 1;
        let (shorter, longer) = if wait_a < wait_b {
            (wait_a, wait_b)
        } else if wait_b < wait_a {
            (wait_b, wait_a)
        } else {
            return true;
        };
        let weights = PriorityWeights::default();
        let patient = record(
            1,
            severity,
            urgency,
            AppointmentType::WalkIn,
            Duration::default(),
        );
        weights.score(&patient, Duration::from_secs(u64::from(longer)))
            > weights.score(&patient, Duration::from_secs(u64::from(shorter)))
    }

    #[test]
    fn test_future_arrival_contributes_no_wait() {
        let weights = PriorityWeights::default();
        let patient = record(1, 2, 2, AppointmentType::WalkIn, Duration::from_secs(100));
        assert!(float_cmp::approx_eq!(
            f64,
            weights.score(&patient, Duration::from_secs(40)),
            weights.score(&patient, Duration::from_secs(100))
        ));
    }

    #[test]
    fn test_key_orders_by_score_then_arrival_then_id() {
        let low = PriorityKey::new(100.0, Duration::default(), PatientId::from(1_u64));
        let high = PriorityKey::new(200.0, Duration::from_secs(60), PatientId::from(2_u64));
        assert!(high > low);

        let early = PriorityKey::new(100.0, Duration::from_secs(1), PatientId::from(5_u64));
        let late = PriorityKey::new(100.0, Duration::from_secs(2), PatientId::from(4_u64));
        assert!(early > late);

        let first = PriorityKey::new(100.0, Duration::from_secs(1), PatientId::from(4_u64));
        let second = PriorityKey::new(100.0, Duration::from_secs(1), PatientId::from(5_u64));
        assert!(first > second);
    }

    #[test]
    fn test_key_of_uses_stored_score() {
        let mut patient = record(3, 4, 4, AppointmentType::Scheduled, Duration::from_secs(5));
        patient.set_score(617.0);
        assert_eq!(patient.status(), PatientStatus::Waiting);
        assert_eq!(
            PriorityKey::of(&patient),
            PriorityKey::new(617.0, Duration::from_secs(5), PatientId::from(3_u64))
        );
    }
}
