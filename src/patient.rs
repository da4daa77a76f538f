use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{AgeGroup, AppointmentType, PatientId, PatientStatus};

/// Raw registration input, as collected by the front desk.
///
/// Severity and urgency are ordinals in `1..=5` (higher is worse); values
/// outside that domain are rejected at registration. The arrival time
/// defaults to the queue clock's current time but can be given explicitly,
/// which the simulator uses to spread arrivals over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Condition severity, `1..=5`.
    pub severity: u8,
    /// Treatment urgency, `1..=5`.
    pub urgency: u8,
    /// How the patient entered the queue.
    pub appointment_type: AppointmentType,
    /// Free-text notes from the registration form.
    #[serde(default)]
    pub notes: String,
    /// Explicit arrival time since the clock epoch; `None` means "now".
    #[serde(default)]
    pub arrival_time: Option<Duration>,
}

impl Registration {
    /// A registration with the given core attributes, no notes, arriving now.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        age: u32,
        severity: u8,
        urgency: u8,
        appointment_type: AppointmentType,
    ) -> Self {
        Self {
            name: name.into(),
            age,
            severity,
            urgency,
            appointment_type,
            notes: String::new(),
            arrival_time: None,
        }
    }

    /// Sets an explicit arrival time.
    #[must_use]
    pub fn arriving_at(mut self, arrival_time: Duration) -> Self {
        self.arrival_time = Some(arrival_time);
        self
    }
}

/// A patient owned by the scheduling queue.
///
/// Attributes are immutable after registration; only the score (recomputed
/// by the rescorer), the status, and the transition timestamps change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    id: PatientId,
    name: String,
    age: u32,
    age_group: AgeGroup,
    severity: u8,
    urgency: u8,
    appointment_type: AppointmentType,
    notes: String,
    arrival_time: Duration,
    score: f64,
    status: PatientStatus,
    called_at: Option<Duration>,
    served_at: Option<Duration>,
}

impl PatientRecord {
    pub(crate) fn new(id: PatientId, registration: Registration, arrival_time: Duration) -> Self {
        Self {
            id,
            age_group: AgeGroup::from_age(registration.age),
            name: registration.name,
            age: registration.age,
            severity: registration.severity,
            urgency: registration.urgency,
            appointment_type: registration.appointment_type,
            notes: registration.notes,
            arrival_time,
            score: 0.0,
            status: PatientStatus::Waiting,
            called_at: None,
            served_at: None,
        }
    }

    /// The unique ID assigned at registration.
    #[must_use]
    pub fn id(&self) -> PatientId {
        self.id
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Age in years.
    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Age bracket derived from the age.
    #[must_use]
    pub fn age_group(&self) -> AgeGroup {
        self.age_group
    }

    /// Condition severity, `1..=5`.
    #[must_use]
    pub fn severity(&self) -> u8 {
        self.severity
    }

    /// Treatment urgency, `1..=5`.
    #[must_use]
    pub fn urgency(&self) -> u8 {
        self.urgency
    }

    /// How the patient entered the queue.
    #[must_use]
    pub fn appointment_type(&self) -> AppointmentType {
        self.appointment_type
    }

    /// Registration notes.
    #[must_use]
    pub fn notes(&self) -> &str {
        &self.notes
    }

    /// Arrival time since the clock epoch.
    #[must_use]
    pub fn arrival_time(&self) -> Duration {
        self.arrival_time
    }

    /// The score as of the last recompute. Staleness is bounded by the
    /// rescorer's period.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    pub(crate) fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> PatientStatus {
        self.status
    }

    /// When the patient was called, if they were.
    #[must_use]
    pub fn called_at(&self) -> Option<Duration> {
        self.called_at
    }

    /// When service finished, if it did.
    #[must_use]
    pub fn served_at(&self) -> Option<Duration> {
        self.served_at
    }

    /// How long the patient waited between arrival and being called.
    ///
    /// `None` while still waiting. Arrivals registered in the simulated
    /// future clamp to zero, matching the reported wait of a patient called
    /// the moment they arrive.
    #[must_use]
    pub fn waited(&self) -> Option<Duration> {
        self.called_at
            .map(|called| called.checked_sub(self.arrival_time).unwrap_or_default())
    }

    pub(crate) fn call(&mut self, now: Duration) {
        self.status = PatientStatus::InService;
        self.called_at = Some(now);
    }

    pub(crate) fn serve(&mut self, now: Duration) {
        self.status = PatientStatus::Served;
        self.served_at = Some(now);
    }

    pub(crate) fn cancel(&mut self) {
        self.status = PatientStatus::Cancelled;
    }

    /// The read-only view handed to display and export collaborators.
    #[must_use]
    pub fn view(&self) -> PatientView {
        PatientView {
            id: self.id,
            name: self.name.clone(),
            age: self.age,
            severity: self.severity,
            urgency: self.urgency,
            age_group: self.age_group,
            appointment_type: self.appointment_type,
            arrival_time: self.arrival_time,
            score: self.score,
            status: self.status,
            notes: self.notes.clone(),
        }
    }
}

/// A point-in-time copy of one record, as exposed by
/// [`snapshot`](crate::SchedulingQueue::snapshot).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientView {
    /// The unique ID assigned at registration.
    pub id: PatientId,
    /// Display name.
    pub name: String,
    /// Age in years.
    pub age: u32,
    /// Condition severity, `1..=5`.
    pub severity: u8,
    /// Treatment urgency, `1..=5`.
    pub urgency: u8,
    /// Age bracket derived from the age.
    pub age_group: AgeGroup,
    /// How the patient entered the queue.
    pub appointment_type: AppointmentType,
    /// Arrival time since the clock epoch.
    pub arrival_time: Duration,
    /// Score as of the last recompute.
    pub score: f64,
    /// Lifecycle status at snapshot time.
    pub status: PatientStatus,
    /// Registration notes.
    pub notes: String,
}

#[cfg(test)]
mod test {
    use super::*;

    fn record() -> PatientRecord {
        PatientRecord::new(
            PatientId::from(1_u64),
            Registration::new("Maya", 50, 1, 3, AppointmentType::WalkIn),
            Duration::from_secs(10),
        )
    }

    #[test]
    fn test_new_record_is_waiting() {
        let record = record();
        assert_eq!(record.status(), PatientStatus::Waiting);
        assert_eq!(record.called_at(), None);
        assert_eq!(record.served_at(), None);
        assert_eq!(record.waited(), None);
        assert_eq!(record.age_group(), AgeGroup::Adult);
    }

    #[test]
    fn test_transitions_set_timestamps() {
        let mut record = record();
        record.call(Duration::from_secs(70));
        assert_eq!(record.status(), PatientStatus::InService);
        assert_eq!(record.called_at(), Some(Duration::from_secs(70)));
        assert_eq!(record.waited(), Some(Duration::from_secs(60)));
        record.serve(Duration::from_secs(100));
        assert_eq!(record.status(), PatientStatus::Served);
        assert_eq!(record.served_at(), Some(Duration::from_secs(100)));
    }

    #[test]
    fn test_wait_clamps_for_future_arrivals() {
        let mut record = PatientRecord::new(
            PatientId::from(2_u64),
            Registration::new("Kavi", 8, 3, 4, AppointmentType::WalkIn)
                .arriving_at(Duration::from_secs(100)),
            Duration::from_secs(100),
        );
        record.call(Duration::from_secs(40));
        assert_eq!(record.waited(), Some(Duration::default()));
    }
}
