//! Tick scheduler properties, exercised against mock ports.

use hatchling_core::{
    config::SimConfig,
    error::{SimError, SimResult},
    ports::{PopulationQueryPort, TickCommandPort},
    scheduler::{DispatchOutcome, SchedulerState, TickScheduler},
    types::{PetId, Tick},
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;
use std::time::{Duration, Instant};

/// Command port that records every submission (with the submitting
/// thread), tracks the in-flight high-water mark, and fails on demand.
struct RecordingPort {
    sends: Mutex<Vec<(ThreadId, PetId, Tick)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    hold: Duration,
    /// Pets that fail with PetNotFound.
    missing: HashSet<PetId>,
    /// Pets that fail with a non-NotFound error.
    broken: HashSet<PetId>,
}

impl RecordingPort {
    fn new(hold: Duration) -> Self {
        Self {
            sends: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hold,
            missing: HashSet::new(),
            broken: HashSet::new(),
        }
    }

    fn send_count(&self) -> usize {
        self.sends.lock().unwrap().len()
    }
}

impl TickCommandPort for RecordingPort {
    fn submit_pet_tick(&self, pet_id: &str, tick_seq: Tick) -> SimResult<()> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.hold.is_zero() {
            std::thread::sleep(self.hold);
        }
        self.sends.lock().unwrap().push((
            std::thread::current().id(),
            pet_id.to_string(),
            tick_seq,
        ));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.missing.contains(pet_id) {
            return Err(SimError::PetNotFound(pet_id.to_string()));
        }
        if self.broken.contains(pet_id) {
            return Err(SimError::CommandRejected {
                pet_id: pet_id.to_string(),
                reason: "induced failure".into(),
            });
        }
        Ok(())
    }
}

/// Population port serving a fixed snapshot and counting queries.
struct FixedPopulation {
    ids: Vec<PetId>,
    queries: AtomicUsize,
    fail: bool,
}

impl FixedPopulation {
    fn new(ids: &[&str]) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            queries: AtomicUsize::new(0),
            fail: false,
        }
    }
}

impl PopulationQueryPort for FixedPopulation {
    fn alive_pets(&self) -> SimResult<Vec<PetId>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SimError::Other(anyhow::anyhow!("projection store offline")));
        }
        Ok(self.ids.clone())
    }
}

fn config(interval_ms: u64, concurrency: usize) -> SimConfig {
    SimConfig {
        tick_interval_ms: interval_ms,
        concurrency,
        start_paused: false,
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn tick_sequences_are_globally_unique_and_monotonic() {
    // The counter is a shared global logical clock, one increment per
    // per-pet dispatch — deliberately NOT a per-pet tick count.
    let ids: Vec<String> = (0..20).map(|n| format!("pet-{n:02}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    let port = Arc::new(RecordingPort::new(Duration::from_millis(2)));
    let population = Arc::new(FixedPopulation::new(&id_refs));

    let mut scheduler = TickScheduler::new(
        &config(40, 8),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        Arc::clone(&population) as Arc<dyn PopulationQueryPort>,
    );
    scheduler.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || port.send_count() >= 60));
    scheduler.stop();

    let sends = port.sends.lock().unwrap();
    let known: HashSet<&str> = id_refs.iter().copied().collect();

    // Pairwise distinct across all senders.
    let mut seen = HashSet::new();
    for (_, pet_id, seq) in sends.iter() {
        assert!(seen.insert(*seq), "sequence {seq} was allocated twice");
        assert!(
            known.contains(pet_id.as_str()),
            "dispatched to {pet_id}, which was never in a snapshot"
        );
    }

    // Strictly increasing per sender thread.
    let mut per_thread: HashMap<ThreadId, Vec<Tick>> = HashMap::new();
    for (thread, _, seq) in sends.iter() {
        per_thread.entry(*thread).or_default().push(*seq);
    }
    for (thread, seqs) in per_thread {
        for pair in seqs.windows(2) {
            assert!(
                pair[1] > pair[0],
                "sequences on {thread:?} not strictly increasing: {pair:?}"
            );
        }
    }
}

#[test]
fn in_flight_sends_never_exceed_the_concurrency_bound() {
    let ids: Vec<String> = (0..20).map(|n| format!("pet-{n:02}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(|s| s.as_str()).collect();
    // Slow sends force the whole population to pile up on the pool.
    let port = Arc::new(RecordingPort::new(Duration::from_millis(20)));
    let population = Arc::new(FixedPopulation::new(&id_refs));

    let mut scheduler = TickScheduler::new(
        &config(30, 8),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        population as Arc<dyn PopulationQueryPort>,
    );
    scheduler.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || port.send_count() >= 40));
    scheduler.stop();

    let max = port.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 8, "observed {max} concurrent sends, bound is 8");
    assert!(max >= 2, "expected real overlap, observed max {max}");
}

#[test]
fn empty_population_rounds_are_noops() {
    let port = Arc::new(RecordingPort::new(Duration::ZERO));
    let population = Arc::new(FixedPopulation::new(&[]));

    let mut scheduler = TickScheduler::new(
        &config(20, 8),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        Arc::clone(&population) as Arc<dyn PopulationQueryPort>,
    );
    let outcomes = scheduler.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        population.queries.load(Ordering::SeqCst) >= 3
    }));
    assert_eq!(scheduler.state(), SchedulerState::Running);
    assert_eq!(port.send_count(), 0);
    assert_eq!(scheduler.dispatched_count(), 0);
    assert!(outcomes.try_recv().is_err());

    scheduler.stop();
}

#[test]
fn missing_pet_is_skipped_without_stalling_the_rest() {
    let port = Arc::new({
        let mut p = RecordingPort::new(Duration::ZERO);
        p.missing.insert("ghost".to_string());
        p
    });
    let population = Arc::new(FixedPopulation::new(&["alpha", "ghost", "omega"]));

    let mut scheduler = TickScheduler::new(
        &config(25, 8),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        Arc::clone(&population) as Arc<dyn PopulationQueryPort>,
    );
    let outcomes = scheduler.start().unwrap();

    // At least two full rounds: the skip must not poison later rounds.
    assert!(wait_until(Duration::from_secs(5), || port.send_count() >= 6));
    assert_eq!(scheduler.state(), SchedulerState::Running);
    scheduler.stop();

    let mut delivered: HashMap<String, usize> = HashMap::new();
    let mut skipped = 0usize;
    while let Ok(outcome) = outcomes.try_recv() {
        match outcome {
            DispatchOutcome::Delivered { pet_id, .. } => {
                *delivered.entry(pet_id).or_default() += 1;
            }
            DispatchOutcome::SkippedMissing { pet_id, .. } => {
                assert_eq!(pet_id, "ghost");
                skipped += 1;
            }
            DispatchOutcome::Failed { pet_id, error, .. } => {
                panic!("unexpected failure for {pet_id}: {error}");
            }
        }
    }
    assert!(skipped >= 1, "ghost was never skipped");
    assert!(delivered.get("alpha").copied().unwrap_or(0) >= 2);
    assert!(delivered.get("omega").copied().unwrap_or(0) >= 2);
}

#[test]
fn other_errors_are_reported_and_processing_resumes() {
    let port = Arc::new({
        let mut p = RecordingPort::new(Duration::ZERO);
        p.broken.insert("cursed".to_string());
        p
    });
    let population = Arc::new(FixedPopulation::new(&["alpha", "cursed"]));

    let mut scheduler = TickScheduler::new(
        &config(25, 4),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        population as Arc<dyn PopulationQueryPort>,
    );
    let outcomes = scheduler.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || port.send_count() >= 4));
    assert_eq!(scheduler.state(), SchedulerState::Running);
    scheduler.stop();

    let mut failed = 0usize;
    let mut delivered = 0usize;
    while let Ok(outcome) = outcomes.try_recv() {
        match outcome {
            DispatchOutcome::Failed { pet_id, .. } => {
                assert_eq!(pet_id, "cursed");
                failed += 1;
            }
            DispatchOutcome::Delivered { pet_id, .. } => {
                assert_eq!(pet_id, "alpha");
                delivered += 1;
            }
            DispatchOutcome::SkippedMissing { pet_id, .. } => {
                panic!("unexpected skip for {pet_id}");
            }
        }
    }
    assert!(failed >= 2, "failures should recur every round, got {failed}");
    assert!(delivered >= 2, "healthy pet starved by a broken neighbor");
}

#[test]
fn stop_prevents_new_rounds_and_population_queries() {
    let port = Arc::new(RecordingPort::new(Duration::ZERO));
    let population = Arc::new(FixedPopulation::new(&["alpha"]));

    let mut scheduler = TickScheduler::new(
        &config(20, 2),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        Arc::clone(&population) as Arc<dyn PopulationQueryPort>,
    );
    scheduler.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || {
        population.queries.load(Ordering::SeqCst) >= 2
    }));
    scheduler.stop();
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    let queries_at_stop = population.queries.load(Ordering::SeqCst);
    let sends_at_stop = port.send_count();
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(population.queries.load(Ordering::SeqCst), queries_at_stop);
    assert_eq!(port.send_count(), sends_at_stop);
}

#[test]
fn failed_population_query_is_fatal() {
    let port = Arc::new(RecordingPort::new(Duration::ZERO));
    let population = Arc::new({
        let mut p = FixedPopulation::new(&["alpha"]);
        p.fail = true;
        p
    });

    let mut scheduler = TickScheduler::new(
        &config(20, 2),
        Arc::clone(&port) as Arc<dyn TickCommandPort>,
        population as Arc<dyn PopulationQueryPort>,
    );
    scheduler.start().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        scheduler.state() == SchedulerState::Stopped
    }));
    assert_eq!(port.send_count(), 0);
    scheduler.stop();
}

#[test]
fn start_twice_is_rejected() {
    let port = Arc::new(RecordingPort::new(Duration::ZERO));
    let population = Arc::new(FixedPopulation::new(&[]));

    let mut scheduler = TickScheduler::new(
        &config(1_000, 2),
        port as Arc<dyn TickCommandPort>,
        population as Arc<dyn PopulationQueryPort>,
    );
    scheduler.start().unwrap();
    assert!(matches!(scheduler.start(), Err(SimError::AlreadyRunning)));
    scheduler.stop();
}
