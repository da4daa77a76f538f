//! CSV serialization of queue snapshots and simulation reports.
//!
//! The column order is stable so downstream report tooling can rely on it.
//! Where the files land is the caller's concern; these functions only write
//! to the handle they are given.

use std::io;

use crate::{PatientView, ServicedPatient};

/// Columns of a snapshot export, in order.
pub const SNAPSHOT_HEADER: [&str; 11] = [
    "id",
    "name",
    "age",
    "severity",
    "urgency",
    "age_group",
    "appointment_type",
    "arrival_secs",
    "score",
    "status",
    "notes",
];

/// Columns of a serviced-patients export, in order.
pub const SERVICED_HEADER: [&str; 10] = [
    "id",
    "name",
    "severity",
    "urgency",
    "appointment_type",
    "arrival_secs",
    "called_secs",
    "wait_secs",
    "doctor",
    "order",
];

/// Writes one row per snapshot record.
///
/// # Errors
///
/// Returns an error when the underlying writer fails.
pub fn write_snapshot<W: io::Write>(writer: W, rows: &[PatientView]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&SNAPSHOT_HEADER)?;
    for row in rows {
        csv.write_record(&[
            row.id.to_string(),
            row.name.clone(),
            row.age.to_string(),
            row.severity.to_string(),
            row.urgency.to_string(),
            row.age_group.to_string(),
            row.appointment_type.to_string(),
            format!("{:.3}", row.arrival_time.as_secs_f64()),
            format!("{:.1}", row.score),
            row.status.to_string(),
            row.notes.clone(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Writes one row per served patient, in service order.
///
/// # Errors
///
/// Returns an error when the underlying writer fails.
pub fn write_serviced<W: io::Write>(writer: W, rows: &[ServicedPatient]) -> csv::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&SERVICED_HEADER)?;
    for row in rows {
        csv.write_record(&[
            row.id.to_string(),
            row.name.clone(),
            row.severity.to_string(),
            row.urgency.to_string(),
            row.appointment_type.to_string(),
            format!("{:.3}", row.arrival_time.as_secs_f64()),
            format!("{:.3}", row.called_at.as_secs_f64()),
            format!("{:.3}", row.waited.as_secs_f64()),
            row.doctor.to_string(),
            row.order.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{AppointmentType, Clock, PriorityWeights, Registration, SchedulingQueue};

    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_snapshot_export_shape() {
        let queue = SchedulingQueue::new(PriorityWeights::default(), Arc::new(Clock::manual()));
        queue
            .register(
                Registration::new("Sana", 30, 4, 5, AppointmentType::Emergency)
                    .arriving_at(Duration::from_secs(2)),
            )
            .unwrap();

        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, &queue.snapshot()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,name,age,severity,urgency,age_group,appointment_type,arrival_secs,score,status,notes"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,Sana,30,4,5,adult,emergency,2.000,"));
        assert!(row.contains("waiting"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_serviced_export_shape() {
        let row = ServicedPatient {
            id: crate::PatientId::from(3_u64),
            name: String::from("P3"),
            severity: 2,
            urgency: 4,
            appointment_type: AppointmentType::WalkIn,
            arrival_time: Duration::from_secs(1),
            called_at: Duration::from_secs(31),
            waited: Duration::from_secs(30),
            doctor: 1,
            order: 0,
        };
        let mut buffer = Vec::new();
        write_serviced(&mut buffer, &[row]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(
            text,
            "id,name,severity,urgency,appointment_type,arrival_secs,called_secs,wait_secs,doctor,order\n\
             3,P3,2,4,walk_in,1.000,31.000,30.000,1,0\n"
        );
    }

    #[test]
    fn test_empty_snapshot_writes_header_only() {
        let mut buffer = Vec::new();
        write_snapshot(&mut buffer, &[]).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
