use crate::SupervisorError;
use crossbeam_channel::Sender;
use fractaltiles_core::{JobAssignment, TileKey, TileOutput, WorkerEnvelope, WorkerId};

/// A converted result, ready for the tile store.
#[derive(Debug, Clone, PartialEq)]
pub struct JobResult<P> {
    pub tile_id: TileKey,
    pub payload: P,
}

/// Adapter between the job queue and one compute backend.
///
/// The queue only schedules; how workers are started, how a job reaches
/// them and how their raw output becomes a cache payload is up to the
/// supervisor. Workers report back by sending `WorkerEnvelope`s, tagged with
/// the id they were hired under, on the `events` channel.
pub trait Supervisor {
    type Worker;
    type Payload;

    fn hire_worker(
        &mut self,
        id: WorkerId,
        events: Sender<WorkerEnvelope>,
    ) -> Result<Self::Worker, SupervisorError>;

    fn assign_worker(
        &mut self,
        worker: &Self::Worker,
        job: &JobAssignment,
    ) -> Result<(), SupervisorError>;

    fn collect_result(
        &mut self,
        output: TileOutput,
    ) -> Result<JobResult<Self::Payload>, SupervisorError>;

    /// Stop a worker. Whatever it is computing is abandoned.
    fn terminate_worker(&mut self, worker: Self::Worker);
}
