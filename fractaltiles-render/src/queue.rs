//! Job queue and worker pool.
//!
//! Jobs wait in a FIFO and are handed greedily to idle slots. Each slot
//! holds one hired worker and at most one running job, stamped with the
//! generation that was live when it was assigned. Bumping the generation
//! cancels in-flight work without interrupting it: late results are
//! dropped on arrival.
//!
//! All bookkeeping happens on the driver thread. Workers only talk back
//! through the event channel handed to the supervisor, which is drained by
//! [`JobQueue::process_events`] or [`JobQueue::wait_for_events`].

use crate::{QueueError, Supervisor, TileStore};
use crossbeam_channel::{unbounded, Receiver, Sender};
use fractaltiles_core::{
    DirtyFlag, JobAssignment, TileKey, TileOutput, WorkerEnvelope, WorkerId, WorkerToMain,
};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::time::Duration;

struct RunningJob {
    generation: u64,
    job: JobAssignment,
}

struct Slot<W> {
    id: WorkerId,
    worker: W,
    running: Option<RunningJob>,
}

pub struct JobQueue<S: Supervisor> {
    supervisor: S,
    pending: VecDeque<JobAssignment>,
    // Slot index -> worker. Indices >= pool_size only exist while their
    // job finishes.
    slots: BTreeMap<usize, Slot<S::Worker>>,
    pool_size: usize,
    generation: u64,
    next_worker: u64,
    events_tx: Sender<WorkerEnvelope>,
    events_rx: Receiver<WorkerEnvelope>,
    dirty: DirtyFlag,
    failures: HashMap<TileKey, u32>,
    abandoned: HashSet<TileKey>,
    max_retries: u32,
    disposed: bool,
}

impl<S: Supervisor> JobQueue<S> {
    /// Hire `pool_size` workers. A failed tile is retried at most
    /// `max_retries` times per submission.
    pub fn new(supervisor: S, pool_size: usize, max_retries: u32) -> Result<Self, QueueError> {
        let (events_tx, events_rx) = unbounded();
        let mut queue = Self {
            supervisor,
            pending: VecDeque::new(),
            slots: BTreeMap::new(),
            pool_size,
            generation: 0,
            next_worker: 0,
            events_tx,
            events_rx,
            dirty: DirtyFlag::default(),
            failures: HashMap::new(),
            abandoned: HashSet::new(),
            max_retries,
            disposed: false,
        };

        queue.hire_missing()?;
        log::info!("Job queue started with {} workers", pool_size);
        Ok(queue)
    }

    pub fn supervisor(&self) -> &S {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut S {
        &mut self.supervisor
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get_queue_size(&self) -> usize {
        self.pending.len()
    }

    /// Busy flag per slot, in slot order. Includes slots being retired.
    pub fn get_worker_busyness(&self) -> Vec<bool> {
        self.slots.values().map(|s| s.running.is_some()).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.slots.values().filter(|s| s.running.is_some()).count()
    }

    /// Nothing pending and nothing running.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty() && self.in_flight() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// True when a tile became ready since the last call.
    pub fn take_dirty(&mut self) -> bool {
        self.dirty.read_and_clear()
    }

    pub fn set_pool_size(
        &mut self,
        pool_size: usize,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        self.ensure_live()?;
        if pool_size == self.pool_size {
            return Ok(());
        }

        log::info!("Resizing pool from {} to {} workers", self.pool_size, pool_size);
        self.pool_size = pool_size;

        let idle_surplus: Vec<usize> = self
            .slots
            .iter()
            .filter(|(&index, slot)| index >= pool_size && slot.running.is_none())
            .map(|(&index, _)| index)
            .collect();
        for index in idle_surplus {
            self.fire(index);
        }

        self.hire_missing()?;
        self.pump(store)
    }

    /// Append jobs. Their tiles must already be queued in the store.
    pub fn enqueue_end(
        &mut self,
        jobs: impl IntoIterator<Item = JobAssignment>,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        self.ensure_live()?;
        for job in jobs {
            self.forget_failures(&job.tile_id);
            self.pending.push_back(job);
        }
        self.pump(store)
    }

    /// Put jobs in front of everything pending, keeping their order.
    pub fn enqueue_start(
        &mut self,
        jobs: impl IntoIterator<Item = JobAssignment>,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        self.ensure_live()?;
        let jobs: Vec<JobAssignment> = jobs.into_iter().collect();
        for job in jobs.into_iter().rev() {
            self.forget_failures(&job.tile_id);
            self.pending.push_front(job);
        }
        self.pump(store)
    }

    /// Drop pending jobs and their queued records. Running jobs finish
    /// normally.
    pub fn prune(&mut self, store: &mut TileStore<S::Payload>) -> Result<(), QueueError> {
        self.ensure_live()?;
        let dropped = self.pending.len();

        for job in self.pending.drain(..) {
            store.discard_queued(job.tile_id)?;
        }
        for tile in self.abandoned.drain() {
            store.discard_queued(tile)?;
        }
        self.failures.clear();

        if dropped > 0 {
            log::debug!("Pruned {} pending jobs", dropped);
        }
        Ok(())
    }

    /// Drop pending jobs and invalidate everything in flight. Store records
    /// are left alone; callers clear the store alongside.
    pub fn clear_and_bump_generation(&mut self) -> Result<(), QueueError> {
        self.ensure_live()?;
        self.pending.clear();
        self.failures.clear();
        self.abandoned.clear();
        self.generation += 1;

        log::info!("Job queue cleared, generation {}", self.generation);
        Ok(())
    }

    /// Handle every worker message already received. Returns how many.
    pub fn process_events(
        &mut self,
        store: &mut TileStore<S::Payload>,
    ) -> Result<usize, QueueError> {
        self.ensure_live()?;
        let mut handled = 0;
        while let Ok(envelope) = self.events_rx.try_recv() {
            self.handle_event(envelope, store)?;
            handled += 1;
        }
        Ok(handled)
    }

    /// Block up to `timeout` for a worker message, then handle it and
    /// everything queued behind it.
    pub fn wait_for_events(
        &mut self,
        store: &mut TileStore<S::Payload>,
        timeout: Duration,
    ) -> Result<usize, QueueError> {
        self.ensure_live()?;
        match self.events_rx.recv_timeout(timeout) {
            Ok(envelope) => {
                self.handle_event(envelope, store)?;
                Ok(1 + self.process_events(store)?)
            }
            Err(_) => Ok(0),
        }
    }

    /// Terminate all workers. Every later call fails with `Disposed`.
    pub fn dispose(&mut self) -> Result<(), QueueError> {
        self.ensure_live()?;
        self.disposed = true;
        self.pending.clear();
        self.failures.clear();
        self.abandoned.clear();
        self.terminate_all();

        log::info!("Job queue disposed");
        Ok(())
    }

    fn handle_event(
        &mut self,
        envelope: WorkerEnvelope,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        let Some(index) = self.slot_of(envelope.worker) else {
            log::debug!("Ignoring message from retired {}", envelope.worker);
            return Ok(());
        };

        match envelope.message {
            WorkerToMain::TileComplete { output } => self.handle_done(index, output, store)?,
            WorkerToMain::Error { message, .. } => {
                log::warn!("{} failed: {}", envelope.worker, message);
                self.replace_worker(index, store)?;
            }
        }

        self.pump(store)
    }

    fn handle_done(
        &mut self,
        index: usize,
        output: TileOutput,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        let running = self.slots.get_mut(&index).and_then(|s| s.running.take());

        match running {
            None => {
                log::warn!("Slot {} reported tile {} without a job", index, output.tile_id);
            }
            Some(running) if running.generation != self.generation => {
                log::debug!(
                    "Dropping stale tile {} (generation {} vs current {})",
                    output.tile_id,
                    running.generation,
                    self.generation
                );
            }
            Some(running) if running.job.tile_id != output.tile_id => {
                log::warn!(
                    "Slot {} returned tile {} for job {}",
                    index,
                    output.tile_id,
                    running.job.tile_id
                );
                self.job_failed(running.job, store)?;
            }
            Some(running) => {
                let tile_id = running.job.tile_id;
                let compute_time_ms = output.compute_time_ms;

                match self.supervisor.collect_result(output) {
                    Ok(result) => {
                        store.set_ready(tile_id, result.payload)?;
                        self.failures.remove(&tile_id);
                        self.dirty.set();
                        log::debug!("Tile {} ready in {:.2}ms", tile_id, compute_time_ms);
                    }
                    Err(e) => {
                        log::warn!("Could not collect tile {}: {}", tile_id, e);
                        self.job_failed(running.job, store)?;
                    }
                }
            }
        }

        if index >= self.pool_size {
            self.fire(index);
        }
        Ok(())
    }

    /// Terminate a failed worker, hire its replacement into the same slot
    /// and give its job another go.
    fn replace_worker(
        &mut self,
        index: usize,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        let Some(slot) = self.slots.remove(&index) else {
            return Ok(());
        };
        self.supervisor.terminate_worker(slot.worker);

        if index < self.pool_size {
            if let Err(e) = self.hire_into(index) {
                log::error!("Failed to replace {} in slot {}: {}", slot.id, index, e);
            }
        }

        match slot.running {
            Some(running) if running.generation == self.generation => {
                self.job_failed(running.job, store)
            }
            _ => Ok(()),
        }
    }

    fn job_failed(
        &mut self,
        job: JobAssignment,
        store: &mut TileStore<S::Payload>,
    ) -> Result<(), QueueError> {
        store.reset_to_queued(job.tile_id)?;

        let failures = {
            let count = self.failures.entry(job.tile_id).or_insert(0);
            *count += 1;
            *count
        };

        if failures > self.max_retries {
            log::error!(
                "Tile {} failed {} times, giving up until it is resubmitted",
                job.tile_id,
                failures
            );
            self.abandoned.insert(job.tile_id);
        } else {
            log::warn!("Tile {} failed, retrying (attempt {})", job.tile_id, failures + 1);
            self.pending.push_front(job);
        }
        Ok(())
    }

    fn pump(&mut self, store: &mut TileStore<S::Payload>) -> Result<(), QueueError> {
        // Slots whose replacement could not be hired are retried here.
        if let Err(e) = self.hire_missing() {
            log::error!("Pool is below {} workers: {}", self.pool_size, e);
        }

        while let Some(index) = self.next_idle_slot() {
            let Some(job) = self.pending.pop_front() else {
                break;
            };
            store.set_rendering(job.tile_id)?;

            let generation = self.generation;
            let Some(slot) = self.slots.get_mut(&index) else {
                break;
            };
            let assigned = self.supervisor.assign_worker(&slot.worker, &job);
            log::debug!("Assigning tile {} to {}", job.tile_id, slot.id);
            slot.running = Some(RunningJob { generation, job });

            if let Err(e) = assigned {
                log::warn!("Could not assign to slot {}: {}", index, e);
                self.replace_worker(index, store)?;
            }
        }
        Ok(())
    }

    fn next_idle_slot(&self) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.running.is_none())
            .map(|(&index, _)| index)
    }

    fn slot_of(&self, worker: WorkerId) -> Option<usize> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.id == worker)
            .map(|(&index, _)| index)
    }

    fn hire_missing(&mut self) -> Result<(), QueueError> {
        for index in 0..self.pool_size {
            if !self.slots.contains_key(&index) {
                self.hire_into(index)?;
            }
        }
        Ok(())
    }

    fn hire_into(&mut self, index: usize) -> Result<(), QueueError> {
        let id = WorkerId(self.next_worker);
        self.next_worker += 1;

        let worker = self.supervisor.hire_worker(id, self.events_tx.clone())?;
        self.slots.insert(
            index,
            Slot {
                id,
                worker,
                running: None,
            },
        );
        log::debug!("Hired {} into slot {}", id, index);
        Ok(())
    }

    fn fire(&mut self, index: usize) {
        if let Some(slot) = self.slots.remove(&index) {
            log::debug!("Retiring {} from slot {}", slot.id, index);
            self.supervisor.terminate_worker(slot.worker);
        }
    }

    fn terminate_all(&mut self) {
        let slots = std::mem::take(&mut self.slots);
        for slot in slots.into_values() {
            self.supervisor.terminate_worker(slot.worker);
        }
    }

    fn forget_failures(&mut self, tile: &TileKey) {
        self.failures.remove(tile);
        self.abandoned.remove(tile);
    }

    fn ensure_live(&self) -> Result<(), QueueError> {
        if self.disposed {
            Err(QueueError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl<S: Supervisor> Drop for JobQueue<S> {
    fn drop(&mut self) {
        if !self.disposed {
            self.terminate_all();
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
