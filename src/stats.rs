use std::collections::BTreeMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use itertools::Itertools;
use serde::Serialize;

use crate::{AppointmentType, QueueEvent};

/// Aggregates queue transitions for reporting.
///
/// The collector owns the receiving end of the queue's event channel and
/// never touches queue state. Pending events are drained whenever
/// [`stats`](StatsCollector::stats) is called.
pub struct StatsCollector {
    receiver: Mutex<Receiver<QueueEvent>>,
    aggregates: Mutex<Aggregates>,
}

#[derive(Default)]
struct Aggregates {
    served: u64,
    cancelled: u64,
    /// Wait (arrival to call) of every served patient.
    waits: Vec<Duration>,
    by_type: BTreeMap<AppointmentType, u64>,
    by_severity: BTreeMap<u8, u64>,
}

/// A point-in-time aggregate view over everything served and cancelled so
/// far.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    /// Number of patients served to completion.
    pub served: u64,
    /// Number of patients cancelled while waiting or in service.
    pub cancelled: u64,
    /// Mean wait of served patients, in seconds.
    pub mean_wait_secs: f64,
    /// Median wait of served patients, in seconds.
    pub p50_wait_secs: f64,
    /// 90th-percentile wait of served patients, in seconds.
    pub p90_wait_secs: f64,
    /// Served counts broken down by appointment type.
    pub served_by_type: BTreeMap<AppointmentType, u64>,
    /// Served counts broken down by severity.
    pub served_by_severity: BTreeMap<u8, u64>,
}

impl StatsCollector {
    /// Creates a collector together with the sender to register on the
    /// queue.
    #[must_use]
    pub fn channel() -> (Sender<QueueEvent>, Self) {
        let (sender, receiver) = mpsc::channel();
        (
            sender,
            Self {
                receiver: Mutex::new(receiver),
                aggregates: Mutex::new(Aggregates::default()),
            },
        )
    }

    fn pump(&self) {
        let receiver = self.receiver.lock().expect("stats receiver poisoned");
        let mut aggregates = self.aggregates.lock().expect("stats aggregates poisoned");
        while let Ok(event) = receiver.try_recv() {
            match event {
                QueueEvent::Called(_) => {}
                QueueEvent::Completed(record) => {
                    aggregates.served += 1;
                    aggregates
                        .waits
                        .push(record.waited().unwrap_or_default());
                    *aggregates
                        .by_type
                        .entry(record.appointment_type())
                        .or_insert(0) += 1;
                    *aggregates.by_severity.entry(record.severity()).or_insert(0) += 1;
                }
                QueueEvent::Cancelled(_) => aggregates.cancelled += 1,
            }
        }
    }

    /// Drains pending events and returns the running aggregates.
    #[must_use]
    pub fn stats(&self) -> StatsReport {
        self.pump();
        let aggregates = self.aggregates.lock().expect("stats aggregates poisoned");
        let sorted_waits = aggregates
            .waits
            .iter()
            .map(Duration::as_secs_f64)
            .sorted_by(|a, b| a.partial_cmp(b).expect("waits are finite"))
            .collect_vec();
        StatsReport {
            served: aggregates.served,
            cancelled: aggregates.cancelled,
            mean_wait_secs: mean(&sorted_waits),
            p50_wait_secs: percentile(&sorted_waits, 50.0),
            p90_wait_secs: percentile(&sorted_waits, 90.0),
            served_by_type: aggregates.by_type.clone(),
            served_by_severity: aggregates.by_severity.clone(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        0.0
    } else {
        sorted.iter().sum::<f64>() / sorted.len() as f64
    }
}

/// Nearest-rank percentile over an ascending slice; 0 on empty input.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (p / 100.0 * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
