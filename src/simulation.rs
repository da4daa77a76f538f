use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use rand::Rng;
use rand_chacha::{rand_core::SeedableRng, ChaChaRng};
use serde::Serialize;

use crate::generator::PatientGenerator;
use crate::{AppointmentType, PatientId, QueueError, SchedulingQueue};

/// Simulation parameters.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Number of virtual patients to generate.
    pub patients: usize,
    /// Number of virtual doctors pulling from the queue concurrently.
    pub doctors: usize,
    /// RNG seed; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Real-time unit of one simulated service step. Each service holds a
    /// patient for 3–8 ticks.
    pub service_tick: Duration,
    /// How long an idle doctor sleeps before retrying an empty queue.
    pub backoff: Duration,
    /// Whether to draw a progress bar while the queue drains.
    pub progress: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            patients: 30,
            doctors: 2,
            seed: None,
            service_tick: Duration::from_millis(5),
            backoff: Duration::from_millis(1),
            progress: false,
        }
    }
}

/// One row of the simulation report: a patient that completed service.
#[derive(Debug, Clone, Serialize)]
pub struct ServicedPatient {
    /// Queue-assigned ID.
    pub id: PatientId,
    /// Display name.
    pub name: String,
    /// Condition severity.
    pub severity: u8,
    /// Treatment urgency.
    pub urgency: u8,
    /// How the patient entered the queue.
    pub appointment_type: AppointmentType,
    /// Arrival time since the clock epoch.
    pub arrival_time: Duration,
    /// When the patient was called.
    pub called_at: Duration,
    /// Wait between arrival and call.
    pub waited: Duration,
    /// Index of the doctor who served the patient.
    pub doctor: usize,
    /// Zero-based position in the overall service order.
    pub order: usize,
}

/// Exercises a shared queue under synthetic load.
///
/// The simulator registers generated patients, then runs one thread per
/// virtual doctor. Each doctor loops: `call_next` → hold for a randomized
/// service duration → `complete_service`; an empty queue means a short
/// backoff and retry. Doctors stop cooperatively, either when every
/// generated patient has been served or when the stop flag is raised.
pub struct ServiceSimulator {
    queue: Arc<SchedulingQueue>,
    config: SimulationConfig,
    stop: Arc<AtomicBool>,
}

impl ServiceSimulator {
    /// A simulator driving the given queue.
    #[must_use]
    pub fn new(queue: Arc<SchedulingQueue>, config: SimulationConfig) -> Self {
        Self {
            queue,
            config,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A handle that makes every doctor finish its current patient and
    /// exit.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Registers the generated patients and runs the doctor pool until the
    /// queue drains. Returns one report row per served patient, in service
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::InvalidAttributes`] when the configuration
    /// asks for zero patients or zero doctors; a pool without doctors would
    /// leave every registered patient waiting forever. Registration errors
    /// propagate as well, though a generated registration is always valid.
    pub fn run(&self) -> Result<Vec<ServicedPatient>, QueueError> {
        if self.config.patients == 0 || self.config.doctors == 0 {
            return Err(QueueError::InvalidAttributes(format!(
                "simulation requires positive patient and doctor counts, got {} and {}",
                self.config.patients, self.config.doctors
            )));
        }
        let start = self.queue.clock().time();
        let mut generator = PatientGenerator::new(self.config.seed);
        for registration in generator.generate(self.config.patients, start) {
            self.queue.register(registration)?;
        }
        log::info!(
            "simulation started: {} patients, {} doctors",
            self.config.patients,
            self.config.doctors
        );

        let serviced = Arc::new(Mutex::new(Vec::new()));
        let order = Arc::new(AtomicUsize::new(0));
        let workers: Vec<_> = (0..self.config.doctors)
            .map(|doctor| {
                let worker = Worker {
                    doctor,
                    queue: Arc::clone(&self.queue),
                    serviced: Arc::clone(&serviced),
                    order: Arc::clone(&order),
                    stop: Arc::clone(&self.stop),
                    config: self.config.clone(),
                    rng: ChaChaRng::seed_from_u64(
                        self.config.seed.unwrap_or(0).wrapping_add(doctor as u64),
                    ),
                };
                std::thread::spawn(move || worker.run())
            })
            .collect();

        self.watch_progress(&order);
        for worker in workers {
            if worker.join().is_err() {
                log::error!("doctor thread panicked");
            }
        }

        let mut report = Arc::try_unwrap(serviced)
            .map_or_else(|arc| arc.lock().expect("report poisoned").clone(), |mutex| {
                mutex.into_inner().expect("report poisoned")
            });
        report.sort_by_key(|row| row.order);
        log::info!("simulation finished: {} patients served", report.len());
        Ok(report)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn watch_progress(&self, order: &Arc<AtomicUsize>) {
        if !self.config.progress {
            return;
        }
        let bar = ProgressBar::new(self.config.patients as u64)
            .with_style(ProgressStyle::default_bar().template("{msg} {wide_bar} {pos}/{len}"));
        bar.set_message("serving");
        loop {
            let done = order.load(Ordering::SeqCst);
            bar.set_position(done as u64);
            if done >= self.config.patients || self.stop.load(Ordering::SeqCst) {
                break;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        bar.finish();
    }
}

struct Worker {
    doctor: usize,
    queue: Arc<SchedulingQueue>,
    serviced: Arc<Mutex<Vec<ServicedPatient>>>,
    order: Arc<AtomicUsize>,
    stop: Arc<AtomicBool>,
    config: SimulationConfig,
    rng: ChaChaRng,
}

impl Worker {
    fn run(mut self) {
        while !self.stop.load(Ordering::SeqCst) {
            if self.order.load(Ordering::SeqCst) >= self.config.patients {
                break;
            }
            match self.queue.call_next() {
                Some(record) => {
                    let hold = self.config.service_tick * self.rng.gen_range(3..=8);
                    std::thread::sleep(hold);
                    if let Err(error) = self.queue.complete_service(record.id()) {
                        // Only possible if an outside caller cancelled the
                        // patient mid-service.
                        log::warn!("doctor {}: {}", self.doctor, error);
                        continue;
                    }
                    let order = self.order.fetch_add(1, Ordering::SeqCst);
                    let row = ServicedPatient {
                        id: record.id(),
                        name: record.name().to_owned(),
                        severity: record.severity(),
                        urgency: record.urgency(),
                        appointment_type: record.appointment_type(),
                        arrival_time: record.arrival_time(),
                        called_at: record.called_at().unwrap_or_default(),
                        waited: record.waited().unwrap_or_default(),
                        doctor: self.doctor,
                        order,
                    };
                    log::debug!(
                        "doctor {} served {} (waited {:?})",
                        self.doctor,
                        row.name,
                        row.waited
                    );
                    self.serviced.lock().expect("report poisoned").push(row);
                }
                None => std::thread::sleep(self.config.backoff),
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{Clock, PriorityWeights, Rescorer, StatsCollector};

    use std::collections::HashSet;

    fn sim_queue() -> (Arc<SchedulingQueue>, StatsCollector) {
        let (sender, collector) = StatsCollector::channel();
        let queue = Arc::new(
            SchedulingQueue::new(PriorityWeights::default(), Arc::new(Clock::system()))
                .event_sender(sender),
        );
        (queue, collector)
    }

    #[test]
    fn test_every_patient_is_served() {
        let (queue, collector) = sim_queue();
        let config = SimulationConfig {
            patients: 30,
            doctors: 3,
            seed: Some(42),
            service_tick: Duration::from_millis(1),
            ..SimulationConfig::default()
        };
        let rescorer = Rescorer::start(Arc::clone(&queue), Duration::from_millis(10));
        let report = ServiceSimulator::new(Arc::clone(&queue), config)
            .run()
            .unwrap();
        rescorer.stop();

        assert_eq!(report.len(), 30);
        assert!(queue.is_empty());
        let ids: HashSet<_> = report.iter().map(|row| row.id).collect();
        assert_eq!(ids.len(), 30);
        let orders: Vec<_> = report.iter().map(|row| row.order).collect();
        assert_eq!(orders, (0..30).collect::<Vec<_>>());
        assert_eq!(collector.stats().served, 30);
    }

    #[test]
    fn test_single_doctor_drains_queue() {
        let (queue, _collector) = sim_queue();
        let config = SimulationConfig {
            patients: 10,
            doctors: 1,
            seed: Some(7),
            service_tick: Duration::from_millis(1),
            ..SimulationConfig::default()
        };
        let report = ServiceSimulator::new(Arc::clone(&queue), config)
            .run()
            .unwrap();
        assert_eq!(report.len(), 10);
        assert!(report.iter().all(|row| row.doctor == 0));
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        for (patients, doctors) in [(5, 0), (0, 2), (0, 0)] {
            let (queue, _collector) = sim_queue();
            let config = SimulationConfig {
                patients,
                doctors,
                seed: Some(1),
                ..SimulationConfig::default()
            };
            let result = ServiceSimulator::new(Arc::clone(&queue), config).run();
            assert!(matches!(result, Err(QueueError::InvalidAttributes(_))));
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_stop_flag_exits_early() {
        let (queue, _collector) = sim_queue();
        let config = SimulationConfig {
            patients: 500,
            doctors: 2,
            seed: Some(3),
            service_tick: Duration::from_millis(2),
            ..SimulationConfig::default()
        };
        let simulator = ServiceSimulator::new(Arc::clone(&queue), config);
        let stop = simulator.stop_flag();
        let stopper = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::SeqCst);
        });
        let report = simulator.run().unwrap();
        stopper.join().unwrap();
        assert!(report.len() < 500);
    }
}
