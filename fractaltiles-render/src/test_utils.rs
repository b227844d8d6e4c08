//! Hand-driven collaborators for unit tests.

use crate::{JobResult, Painter, Supervisor, SupervisorError};
use crossbeam_channel::Sender;
use fractaltiles_core::{
    Bounds, JobAssignment, Resolution, Tile, TileKey, TileOutput, WorkerEnvelope, WorkerId,
    WorkerToMain,
};

pub(crate) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn tile(ix: i64) -> Tile {
    let key = TileKey::new(4, ix, 0);
    Tile {
        key,
        section: key.section(&Bounds::square((0.0, 0.0), 4.0)),
        resolution: Resolution::square(2),
    }
}

pub(crate) fn job(ix: i64) -> JobAssignment {
    JobAssignment::new(tile(ix), 100)
}

pub(crate) struct ManualWorker {
    pub id: WorkerId,
}

/// Supervisor whose workers never run. Tests play the workers' part by
/// pushing envelopes through [`ManualSupervisor::complete`] and
/// [`ManualSupervisor::crash`].
#[derive(Default)]
pub(crate) struct ManualSupervisor {
    pub hired: Vec<WorkerId>,
    pub terminated: Vec<WorkerId>,
    pub assignments: Vec<(WorkerId, TileKey)>,
    pub refuse_assignments: bool,
    /// Number of upcoming hires that fail.
    pub failing_hires: usize,
    events: Option<Sender<WorkerEnvelope>>,
}

impl ManualSupervisor {
    /// Worker most recently handed `tile`.
    pub fn worker_for(&self, tile: TileKey) -> WorkerId {
        self.assignments
            .iter()
            .rev()
            .find(|(_, t)| *t == tile)
            .map(|(w, _)| *w)
            .expect("tile was never assigned")
    }

    pub fn assigned_tiles(&self) -> Vec<TileKey> {
        self.assignments.iter().map(|(_, t)| *t).collect()
    }

    pub fn complete(&self, worker: WorkerId, tile: TileKey) {
        self.complete_with(worker, tile, vec![0; 16]);
    }

    /// Empty `pixels` make `collect_result` fail.
    pub fn complete_with(&self, worker: WorkerId, tile: TileKey, pixels: Vec<u8>) {
        self.send(WorkerEnvelope::new(
            worker,
            WorkerToMain::TileComplete {
                output: TileOutput {
                    tile_id: tile,
                    width: 2,
                    height: 2,
                    pixels,
                    compute_time_ms: 1.0,
                },
            },
        ));
    }

    pub fn crash(&self, worker: WorkerId, tile: Option<TileKey>) {
        self.send(WorkerEnvelope::new(
            worker,
            WorkerToMain::Error {
                tile_id: tile,
                message: "simulated crash".to_string(),
            },
        ));
    }

    fn send(&self, envelope: WorkerEnvelope) {
        self.events
            .as_ref()
            .expect("no worker hired yet")
            .send(envelope)
            .expect("queue dropped its event channel");
    }
}

impl Supervisor for ManualSupervisor {
    type Worker = ManualWorker;
    type Payload = String;

    fn hire_worker(
        &mut self,
        id: WorkerId,
        events: Sender<WorkerEnvelope>,
    ) -> Result<ManualWorker, SupervisorError> {
        if self.failing_hires > 0 {
            self.failing_hires -= 1;
            return Err(SupervisorError::Hire {
                worker: id,
                reason: "simulated hire failure".to_string(),
            });
        }
        self.hired.push(id);
        self.events = Some(events);
        Ok(ManualWorker { id })
    }

    fn assign_worker(
        &mut self,
        worker: &ManualWorker,
        job: &JobAssignment,
    ) -> Result<(), SupervisorError> {
        if self.refuse_assignments {
            return Err(SupervisorError::WorkerGone(worker.id));
        }
        self.assignments.push((worker.id, job.tile_id));
        Ok(())
    }

    fn collect_result(&mut self, output: TileOutput) -> Result<JobResult<String>, SupervisorError> {
        if output.pixels.is_empty() {
            return Err(SupervisorError::PixelBuffer {
                tile: output.tile_id,
                expected: 16,
                actual: 0,
            });
        }
        Ok(JobResult {
            tile_id: output.tile_id,
            payload: format!("tile {}", output.tile_id),
        })
    }

    fn terminate_worker(&mut self, worker: ManualWorker) {
        self.terminated.push(worker.id);
    }
}

/// Painter that remembers what it was asked to do.
#[derive(Default)]
pub(crate) struct RecordingPainter {
    pub clears: usize,
    pub painted: Vec<(String, Bounds)>,
}

impl Painter<String> for RecordingPainter {
    fn clear_canvas(&mut self) {
        self.clears += 1;
        self.painted.clear();
    }

    fn paint_tile(&mut self, payload: &String, output_bounds: &Bounds) {
        self.painted.push((payload.clone(), *output_bounds));
    }
}
