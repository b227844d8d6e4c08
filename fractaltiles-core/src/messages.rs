use crate::{Bounds, Resolution, Tile, TileKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tile to compute plus the quality parameters it is computed with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobAssignment {
    pub tile_id: TileKey,
    pub tile: Tile,
    pub max_iterations: u32,
}

impl JobAssignment {
    pub fn new(tile: Tile, max_iterations: u32) -> Self {
        Self {
            tile_id: tile.key,
            tile,
            max_iterations,
        }
    }

    pub fn section(&self) -> Bounds {
        self.tile.section
    }

    pub fn resolution(&self) -> Resolution {
        self.tile.resolution
    }
}

/// Raw result of a computed tile: `width * height` RGBA texels, row-major.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TileOutput {
    pub tile_id: TileKey,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub compute_time_ms: f64,
}

/// Identity of one hired worker. Never reused within a pool.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Messages sent from the driver to a worker.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum MainToWorker {
    /// Compute one tile. At most one is in flight per worker.
    RenderTile { job: JobAssignment },

    /// Finish up and exit.
    Terminate,
}

/// Messages sent from a worker to the driver.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type")]
pub enum WorkerToMain {
    /// Worker completed a tile.
    TileComplete { output: TileOutput },

    /// Worker failed. `tile_id` is the job it was working on, if any.
    Error {
        tile_id: Option<TileKey>,
        message: String,
    },
}

/// A worker message tagged with its sender.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WorkerEnvelope {
    pub worker: WorkerId,
    pub message: WorkerToMain,
}

impl WorkerEnvelope {
    pub fn new(worker: WorkerId, message: WorkerToMain) -> Self {
        Self { worker, message }
    }
}
