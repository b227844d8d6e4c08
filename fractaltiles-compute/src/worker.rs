use crate::Kernel;
use crossbeam_channel::{Receiver, Sender};
use fractaltiles_core::{MainToWorker, TileOutput, WorkerEnvelope, WorkerId, WorkerToMain};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Worker message loop.
///
/// Renders each `RenderTile` and reports the result. Returns on
/// `Terminate`, when the inbox closes, or when the driver stops listening.
/// A kernel panic is reported as an `Error` for that tile and ends the
/// worker: it must be replaced, not reused.
pub fn run_worker(
    id: WorkerId,
    kernel: Box<dyn Kernel>,
    inbox: Receiver<MainToWorker>,
    events: Sender<WorkerEnvelope>,
) {
    log::debug!("{} started with kernel {}", id, kernel.id());

    for message in inbox.iter() {
        let job = match message {
            MainToWorker::Terminate => break,
            MainToWorker::RenderTile { job } => job,
        };

        let start = Instant::now();
        let rendered = panic::catch_unwind(AssertUnwindSafe(|| kernel.render(&job)));

        let reply = match rendered {
            Ok(pixels) => WorkerToMain::TileComplete {
                output: TileOutput {
                    tile_id: job.tile_id,
                    width: job.tile.resolution.width,
                    height: job.tile.resolution.height,
                    pixels,
                    compute_time_ms: start.elapsed().as_secs_f64() * 1000.0,
                },
            },
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("{} crashed on tile {}: {}", id, job.tile_id, message);

                let _ = events.send(WorkerEnvelope::new(
                    id,
                    WorkerToMain::Error {
                        tile_id: Some(job.tile_id),
                        message,
                    },
                ));
                return;
            }
        };

        if events.send(WorkerEnvelope::new(id, reply)).is_err() {
            log::debug!("{} lost its driver", id);
            return;
        }
    }

    log::debug!("{} exiting", id);
}

/// Start `run_worker` on a named background thread.
pub fn spawn_worker(
    id: WorkerId,
    kernel: Box<dyn Kernel>,
    inbox: Receiver<MainToWorker>,
    events: Sender<WorkerEnvelope>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("fractaltiles-{}", id))
        .spawn(move || run_worker(id, kernel, inbox, events))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "kernel panicked".to_string()
    }
}
