//! Patient queue scheduling simulation.

#![warn(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_import_braces,
    unused_qualifications
)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::inline_always
)]

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};

mod clock;
pub use clock::Clock;

mod patient;
pub use patient::{PatientRecord, PatientView, Registration};

mod priority;
pub use priority::{PriorityKey, PriorityWeights};

mod queue;
pub use queue::{QueueError, QueueEvent, SchedulingQueue};

mod rescorer;
pub use rescorer::Rescorer;

mod stats;
pub use stats::{StatsCollector, StatsReport};

mod generator;
pub use generator::PatientGenerator;

mod simulation;
pub use simulation::{ServiceSimulator, ServicedPatient, SimulationConfig};

pub mod export;

/// Patient ID, unique throughout the queue's lifetime and never reused.
#[derive(
    From,
    Into,
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Copy,
    Clone,
    Hash,
    Display,
)]
pub struct PatientId(u64);

/// Age bracket derived from the raw age at registration.
#[derive(
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Copy,
    Clone,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::ToString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgeGroup {
    /// Younger than 12.
    Child,
    /// Between 12 and 59.
    Adult,
    /// 60 or older.
    Senior,
}

impl AgeGroup {
    /// Derives the age bracket from a raw age in years.
    #[must_use]
    pub fn from_age(age: u32) -> Self {
        if age < 12 {
            AgeGroup::Child
        } else if age >= 60 {
            AgeGroup::Senior
        } else {
            AgeGroup::Adult
        }
    }
}

/// The channel through which the patient entered the queue.
#[derive(
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Copy,
    Clone,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::ToString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    /// No prior appointment.
    WalkIn,
    /// Booked in advance.
    Scheduled,
    /// Emergency admission.
    Emergency,
}

/// Patient lifecycle status. Transitions are monotonic:
/// waiting → in-service → served, with cancellation possible from
/// either of the first two states.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Copy,
    Clone,
    Hash,
    Serialize,
    Deserialize,
    strum::EnumString,
    strum::ToString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PatientStatus {
    /// In the queue, eligible for `call_next`.
    Waiting,
    /// Called and currently being seen.
    InService,
    /// Service finished.
    Served,
    /// Removed before or during service.
    Cancelled,
}

#[cfg(test)]
mod test {
    use super::*;

    use std::str::FromStr;

    #[test]
    fn test_age_group_boundaries() {
        assert_eq!(AgeGroup::from_age(0), AgeGroup::Child);
        assert_eq!(AgeGroup::from_age(11), AgeGroup::Child);
        assert_eq!(AgeGroup::from_age(12), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(59), AgeGroup::Adult);
        assert_eq!(AgeGroup::from_age(60), AgeGroup::Senior);
        assert_eq!(AgeGroup::from_age(90), AgeGroup::Senior);
    }

    #[test]
    fn test_appointment_type_strings() {
        assert_eq!(
            AppointmentType::from_str("walk_in").unwrap(),
            AppointmentType::WalkIn
        );
        assert_eq!(AppointmentType::Emergency.to_string(), "emergency");
        assert_eq!(
            serde_json::to_string(&AppointmentType::Scheduled).unwrap(),
            r#""scheduled""#
        );
    }

    #[test]
    fn test_patient_id_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&PatientId::from(7_u64)).unwrap(), "7");
    }
}
