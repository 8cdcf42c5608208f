//! The tick scheduler — the heart of the simulation.
//!
//! On a fixed cadence it discovers every currently-alive pet through
//! the population port, issues one time-tick command per pet through
//! the command port, caps how many commands are in flight at once, and
//! isolates per-pet failures so one broken pet cannot stall the rest.
//!
//! PIPELINE (three thread roles, joined by channels):
//!   timer ──round──▶ expander ──dispatch unit──▶ worker pool (×bound)
//!
//!   - The timer emits one round signal per interval, on schedule,
//!     with no catch-up. Slow downstream stages make rounds overlap:
//!     round N+1's units queue behind round N's in the shared work
//!     queue, and the concurrency bound applies across both.
//!   - The expander queries the population port exactly once per round
//!     and enqueues one dispatch unit per pet in the snapshot. The
//!     snapshot comes from the read model and may be stale.
//!   - Each worker allocates the next global tick sequence, submits
//!     the command, and classifies the result. Pool size is the
//!     concurrency bound: at most that many submissions are ever
//!     outstanding, regardless of population size or round overlap.
//!
//! FAILURE POLICY:
//!   - Not-found: warned and swallowed. Snapshots are stale by
//!     construction, so missing pets are steady-state, not exceptional.
//!   - Any other submission error: logged, reported on the outcome
//!     channel, and the stream keeps going.
//!   - A failed population query is fatal: the scheduler logs it and
//!     transitions to Stopped. This is the one unrecoverable condition.
//!
//! There is no per-send timeout: a command submission that never
//! returns holds one worker indefinitely, degrading throughput without
//! crashing the scheduler. Kept as-is deliberately — adding a deadline
//! would change observable behavior.

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::ports::{PopulationQueryPort, TickCommandPort};
use crate::types::{PetId, Tick};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long an idle worker waits on the work queue before re-checking
/// the running flag.
const WORKER_POLL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Running,
}

/// The classified result of one per-pet send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered {
        pet_id: PetId,
        tick_seq: Tick,
    },
    /// The target pet no longer exists in the authoritative store.
    /// Never propagated — stale snapshots make this routine.
    SkippedMissing {
        pet_id: PetId,
        tick_seq: Tick,
    },
    Failed {
        pet_id: PetId,
        tick_seq: Tick,
        error: String,
    },
}

pub struct TickScheduler {
    interval: Duration,
    concurrency: usize,
    commands: Arc<dyn TickCommandPort>,
    population: Arc<dyn PopulationQueryPort>,
    /// The global tick sequence. Incremented once per initiated
    /// dispatch (not once per round), shared across all pets.
    tick_seq: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    shutdown_tx: Option<Sender<()>>,
    handles: Vec<JoinHandle<()>>,
}

impl TickScheduler {
    pub fn new(
        config: &SimConfig,
        commands: Arc<dyn TickCommandPort>,
        population: Arc<dyn PopulationQueryPort>,
    ) -> Self {
        Self {
            interval: config.tick_interval(),
            concurrency: config.concurrency.max(1),
            commands,
            population,
            tick_seq: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx: None,
            handles: Vec::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Stopped
        }
    }

    /// Total tick sequences allocated so far.
    pub fn dispatched_count(&self) -> u64 {
        self.tick_seq.load(Ordering::SeqCst)
    }

    /// Start the pipeline. Returns the outcome channel; dropping the
    /// receiver is fine, outcomes are then discarded.
    pub fn start(&mut self) -> SimResult<Receiver<DispatchOutcome>> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SimError::AlreadyRunning);
        }
        log::info!(
            "Starting tick scheduler (interval {:?}, concurrency {})",
            self.interval,
            self.concurrency
        );

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let (rounds_tx, rounds_rx) = crossbeam_channel::unbounded::<Instant>();
        let (work_tx, work_rx) = crossbeam_channel::unbounded::<PetId>();
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded::<DispatchOutcome>();

        self.shutdown_tx = Some(shutdown_tx);
        self.handles.push(spawn_timer(self.interval, rounds_tx, shutdown_rx));
        self.handles.push(spawn_expander(
            Arc::clone(&self.population),
            rounds_rx,
            work_tx,
            Arc::clone(&self.running),
        ));
        for worker in 0..self.concurrency {
            self.handles.push(spawn_worker(
                worker,
                Arc::clone(&self.commands),
                work_rx.clone(),
                outcome_tx.clone(),
                Arc::clone(&self.tick_seq),
                Arc::clone(&self.running),
            ));
        }

        Ok(outcome_rx)
    }

    /// Stop the pipeline: no new rounds, no new dispatch units. Sends
    /// already in flight are not cancelled — each worker finishes its
    /// current submission before exiting. Queued units that no worker
    /// has picked up yet are abandoned.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) && self.handles.is_empty() {
            return;
        }
        log::info!("Stopping tick scheduler");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for TickScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Round source: one signal per interval until shutdown. No catch-up —
/// signals queue behind a slow expander rather than being skipped.
fn spawn_timer(
    interval: Duration,
    rounds_tx: Sender<Instant>,
    shutdown_rx: Receiver<()>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("tick-timer".into())
        .spawn(move || {
            let ticker = crossbeam_channel::tick(interval);
            loop {
                crossbeam_channel::select! {
                    recv(ticker) -> _ => {
                        if rounds_tx.send(Instant::now()).is_err() {
                            // Expander gone (fatal error downstream).
                            break;
                        }
                    }
                    recv(shutdown_rx) -> _ => break,
                }
            }
            log::debug!("Tick timer stopped");
        })
        .expect("failed to spawn tick timer")
}

/// Round expander: one population query per round, one dispatch unit
/// per pet in the snapshot. An empty snapshot makes the round a no-op.
fn spawn_expander(
    population: Arc<dyn PopulationQueryPort>,
    rounds_rx: Receiver<Instant>,
    work_tx: Sender<PetId>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("round-expander".into())
        .spawn(move || {
            for _fired_at in rounds_rx.iter() {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let snapshot = match population.alive_pets() {
                    Ok(ids) => ids,
                    Err(e) => {
                        // Pipeline-fatal: the read path itself is broken.
                        log::error!("Fatal: population query failed, stopping scheduler: {e}");
                        running.store(false, Ordering::SeqCst);
                        break;
                    }
                };
                log::debug!("Round expanded to {} alive pets", snapshot.len());
                for pet_id in snapshot {
                    if work_tx.send(pet_id).is_err() {
                        return;
                    }
                }
            }
            log::debug!("Round expander stopped");
        })
        .expect("failed to spawn round expander")
}

/// Per-pet sender: allocate the next global sequence, submit, classify.
fn spawn_worker(
    worker: usize,
    commands: Arc<dyn TickCommandPort>,
    work_rx: Receiver<PetId>,
    outcome_tx: Sender<DispatchOutcome>,
    tick_seq: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name(format!("tick-worker-{worker}"))
        .spawn(move || {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }
                let pet_id = match work_rx.recv_timeout(WORKER_POLL) {
                    Ok(pet_id) => pet_id,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };
                let seq = tick_seq.fetch_add(1, Ordering::SeqCst) + 1;
                let outcome = match commands.submit_pet_tick(&pet_id, seq) {
                    Ok(()) => {
                        log::trace!("Tick #{seq} delivered to pet {pet_id}");
                        DispatchOutcome::Delivered { pet_id, tick_seq: seq }
                    }
                    Err(e) if e.is_not_found() => {
                        log::warn!(
                            "Skipping tick #{seq} for pet {pet_id}: not in authoritative \
                             store (stale projection)"
                        );
                        DispatchOutcome::SkippedMissing { pet_id, tick_seq: seq }
                    }
                    Err(e) => {
                        log::error!("Failed to deliver tick #{seq} to pet {pet_id}: {e}");
                        DispatchOutcome::Failed {
                            pet_id,
                            tick_seq: seq,
                            error: e.to_string(),
                        }
                    }
                };
                let _ = outcome_tx.send(outcome);
            }
        })
        .expect("failed to spawn tick worker")
}
