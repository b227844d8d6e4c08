use crate::{Bitmap, JobResult, Supervisor, SupervisorError};
use crossbeam_channel::{unbounded, Sender};
use fractaltiles_compute::{spawn_worker, Kernel};
use fractaltiles_core::{JobAssignment, MainToWorker, TileOutput, WorkerEnvelope, WorkerId};
use std::thread::JoinHandle;

/// A background thread running a kernel, reached through its inbox.
pub struct ThreadWorker {
    id: WorkerId,
    inbox: Sender<MainToWorker>,
    handle: JoinHandle<()>,
}

impl ThreadWorker {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Runs every worker on its own OS thread with a clone of one kernel and
/// decodes their output into `Bitmap`s.
pub struct ThreadSupervisor {
    kernel: Box<dyn Kernel>,
}

impl ThreadSupervisor {
    pub fn new(kernel: Box<dyn Kernel>) -> Self {
        Self { kernel }
    }

    pub fn kernel_id(&self) -> &'static str {
        self.kernel.id()
    }
}

impl Supervisor for ThreadSupervisor {
    type Worker = ThreadWorker;
    type Payload = Bitmap;

    fn hire_worker(
        &mut self,
        id: WorkerId,
        events: Sender<WorkerEnvelope>,
    ) -> Result<ThreadWorker, SupervisorError> {
        let (inbox, receiver) = unbounded();
        let handle = spawn_worker(id, self.kernel.clone(), receiver, events).map_err(|e| {
            SupervisorError::Hire {
                worker: id,
                reason: e.to_string(),
            }
        })?;

        Ok(ThreadWorker { id, inbox, handle })
    }

    fn assign_worker(
        &mut self,
        worker: &ThreadWorker,
        job: &JobAssignment,
    ) -> Result<(), SupervisorError> {
        worker
            .inbox
            .send(MainToWorker::RenderTile { job: job.clone() })
            .map_err(|_| SupervisorError::WorkerGone(worker.id))
    }

    fn collect_result(&mut self, output: TileOutput) -> Result<JobResult<Bitmap>, SupervisorError> {
        let payload = Bitmap::from_rgba(output.tile_id, output.width, output.height, &output.pixels)?;
        Ok(JobResult {
            tile_id: output.tile_id,
            payload,
        })
    }

    fn terminate_worker(&mut self, worker: ThreadWorker) {
        // A busy thread sees this after its current tile; its result is
        // then sent from a worker id nobody listens for.
        let _ = worker.inbox.send(MainToWorker::Terminate);
        if worker.handle.is_finished() {
            let _ = worker.handle.join();
        }
    }
}
