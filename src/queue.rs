use std::collections::{BinaryHeap, HashMap};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use itertools::Itertools;
use serde::Serialize;
use thiserror::Error;

use crate::clock::Clock;
use crate::priority::{PriorityKey, PriorityWeights};
use crate::{PatientId, PatientRecord, PatientStatus, PatientView, Registration};

/// Errors returned by queue commands. The queue is left untouched on every
/// error path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// Registration input outside the accepted domain.
    #[error("invalid attributes: {0}")]
    InvalidAttributes(String),
    /// The referenced patient does not exist or is not in the expected
    /// status for the requested transition.
    #[error("patient {0} not found in the expected status")]
    NotFound(PatientId),
}

/// A transition observed on the queue, published to the registered event
/// sender. Each event carries a copy of the record at transition time.
#[derive(Debug, Clone, Serialize)]
pub enum QueueEvent {
    /// A patient was pulled from the waiting set and moved in service.
    Called(PatientRecord),
    /// Service finished for a patient.
    Completed(PatientRecord),
    /// A patient left the queue before or during service.
    Cancelled(PatientRecord),
}

struct Inner {
    /// All live records: waiting and in-service.
    live: HashMap<PatientId, PatientRecord>,
    /// Max-heap over the waiting set. Entries go stale when their patient
    /// is called, cancelled, or rescored; stale entries are skipped on pop
    /// and dropped wholesale on rescore.
    heap: BinaryHeap<HeapEntry>,
    next_id: u64,
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    key: PriorityKey,
    id: PatientId,
}

impl Inner {
    /// True when the entry at the top of the heap no longer describes a
    /// waiting patient with that exact key.
    fn is_stale(&self, entry: &HeapEntry) -> bool {
        self.live.get(&entry.id).map_or(true, |record| {
            record.status() != PatientStatus::Waiting || PriorityKey::of(record) != entry.key
        })
    }

    /// Drops stale entries until the top of the heap is live.
    fn skim(&mut self) {
        while let Some(entry) = self.heap.peek() {
            if self.is_stale(entry) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }

    fn waiting_len(&self) -> usize {
        self.live
            .values()
            .filter(|r| r.status() == PatientStatus::Waiting)
            .count()
    }
}

/// The concurrency-safe priority queue of patients.
///
/// The queue is the sole owner of patient ordering and the only component
/// that mutates status or heap membership. Every operation runs under one
/// mutex, so concurrent callers observe each command as indivisible and
/// the overall effect is consistent with some total order among them.
/// `call_next` on an empty waiting set returns `None` immediately rather
/// than blocking; retry policy belongs to the caller.
pub struct SchedulingQueue {
    weights: PriorityWeights,
    clock: Arc<Clock>,
    inner: Mutex<Inner>,
    event_sender: Option<Sender<QueueEvent>>,
}

impl SchedulingQueue {
    /// A queue scoring with the given weights and reading the given clock.
    #[must_use]
    pub fn new(weights: PriorityWeights, clock: Arc<Clock>) -> Self {
        Self {
            weights,
            clock,
            inner: Mutex::new(Inner {
                live: HashMap::new(),
                heap: BinaryHeap::new(),
                next_id: 0,
            }),
            event_sender: None,
        }
    }

    /// Registers a sender to publish transition events to, consumed by the
    /// stats collector.
    #[must_use]
    pub fn event_sender(mut self, sender: Sender<QueueEvent>) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// The clock this queue reads.
    #[must_use]
    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }

    /// The weight configuration this queue scores with.
    #[must_use]
    pub fn weights(&self) -> &PriorityWeights {
        &self.weights
    }

    fn emit(&self, event: QueueEvent) {
        if let Some(sender) = &self.event_sender {
            // The collector may have been dropped already during shutdown.
            let _ = sender.send(event);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("queue mutex poisoned")
    }

    /// Registers a new patient and returns the assigned ID.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidAttributes`] when the name is empty,
    /// severity or urgency fall outside `1..=5`, or the age exceeds 130.
    pub fn register(&self, registration: Registration) -> Result<PatientId, QueueError> {
        validate(&registration)?;
        let now = self.clock.time();
        let arrival_time = registration.arrival_time.unwrap_or(now);
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = PatientId::from(inner.next_id);
        let mut record = PatientRecord::new(id, registration, arrival_time);
        record.set_score(self.weights.score(&record, now));
        inner.heap.push(HeapEntry {
            key: PriorityKey::of(&record),
            id,
        });
        log::debug!(
            "registered patient {} ({}) with score {:.1}",
            id,
            record.name(),
            record.score()
        );
        inner.live.insert(id, record);
        Ok(id)
    }

    /// Returns a copy of the highest-priority waiting patient without
    /// changing any ordering or status. `None` when nobody is waiting.
    #[must_use]
    pub fn peek_next(&self) -> Option<PatientRecord> {
        let mut inner = self.lock();
        inner.skim();
        let id = inner.heap.peek()?.id;
        inner.live.get(&id).cloned()
    }

    /// Atomically removes the highest-priority waiting patient, marks them
    /// in service, stamps `called_at`, and returns a copy. `None` when
    /// nobody is waiting (an expected condition, not an error).
    pub fn call_next(&self) -> Option<PatientRecord> {
        let now = self.clock.time();
        let called = {
            let mut inner = self.lock();
            inner.skim();
            let entry = inner.heap.pop()?;
            let record = inner
                .live
                .get_mut(&entry.id)
                .expect("skimmed heap top must be live");
            record.call(now);
            record.clone()
        };
        log::debug!("called patient {} ({})", called.id(), called.name());
        self.emit(QueueEvent::Called(called.clone()));
        Some(called)
    }

    /// Finishes service for an in-service patient and removes them from the
    /// live set.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] when the ID is unknown or the
    /// patient is not in service.
    pub fn complete_service(&self, id: PatientId) -> Result<(), QueueError> {
        let now = self.clock.time();
        let served = {
            let mut inner = self.lock();
            match inner.live.get(&id) {
                Some(record) if record.status() == PatientStatus::InService => {}
                _ => return Err(QueueError::NotFound(id)),
            }
            let mut record = inner.live.remove(&id).expect("checked above");
            record.serve(now);
            record
        };
        log::debug!("served patient {} ({})", served.id(), served.name());
        self.emit(QueueEvent::Completed(served));
        Ok(())
    }

    /// Cancels a waiting or in-service patient and removes them from the
    /// live set.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::NotFound`] when the ID is not live.
    pub fn cancel(&self, id: PatientId) -> Result<(), QueueError> {
        let cancelled = {
            let mut inner = self.lock();
            let mut record = inner.live.remove(&id).ok_or(QueueError::NotFound(id))?;
            record.cancel();
            record
        };
        log::debug!("cancelled patient {}", cancelled.id());
        self.emit(QueueEvent::Cancelled(cancelled));
        Ok(())
    }

    /// Recomputes the score of every waiting patient as of `now` and
    /// rebuilds the heap. Runs as one indivisible operation with respect to
    /// every other queue command.
    pub fn rescore_all(&self, now: Duration) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        for record in inner.live.values_mut() {
            if record.status() == PatientStatus::Waiting {
                record.set_score(self.weights.score(record, now));
            }
        }
        inner.heap = inner
            .live
            .values()
            .filter(|record| record.status() == PatientStatus::Waiting)
            .map(|record| HeapEntry {
                key: PriorityKey::of(record),
                id: record.id(),
            })
            .collect();
        log::trace!("rescored {} waiting patients at {:?}", inner.heap.len(), now);
    }

    /// Recomputes all waiting scores as of the queue clock's current time.
    pub fn rescore(&self) {
        self.rescore_all(self.clock.time());
    }

    /// A consistent, point-in-time, priority-ordered copy of the live set:
    /// waiting patients in service order, then in-service patients in call
    /// order. Never mutates.
    #[must_use]
    pub fn snapshot(&self) -> Vec<PatientView> {
        let inner = self.lock();
        let waiting = inner
            .live
            .values()
            .filter(|record| record.status() == PatientStatus::Waiting)
            .sorted_by_key(|record| std::cmp::Reverse(PriorityKey::of(record)));
        let in_service = inner
            .live
            .values()
            .filter(|record| record.status() == PatientStatus::InService)
            .sorted_by_key(|record| (record.called_at(), record.id()));
        waiting.chain(in_service).map(PatientRecord::view).collect()
    }

    /// Number of patients currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().waiting_len()
    }

    /// True when nobody is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Empties the live set. Issued IDs are not reused afterwards.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.live.clear();
        inner.heap.clear();
    }
}

fn validate(registration: &Registration) -> Result<(), QueueError> {
    if registration.name.trim().is_empty() {
        return Err(QueueError::InvalidAttributes(String::from(
            "name must not be empty",
        )));
    }
    if !(1..=5).contains(&registration.severity) {
        return Err(QueueError::InvalidAttributes(format!(
            "severity {} outside 1..=5",
            registration.severity
        )));
    }
    if !(1..=5).contains(&registration.urgency) {
        return Err(QueueError::InvalidAttributes(format!(
            "urgency {} outside 1..=5",
            registration.urgency
        )));
    }
    if registration.age > 130 {
        return Err(QueueError::InvalidAttributes(format!(
            "age {} outside 0..=130",
            registration.age
        )));
    }
    Ok(())
}
