//! Render pipeline error types.

use crate::store::TileState;
use fractaltiles_core::{ConfigError, TileKey, WorkerId};
use thiserror::Error;

/// Tile store misuse. Always a scheduler bug: the state machine is out of
/// sync with the queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cannot {operation} tile {tile}: it is {found}")]
    InvalidTransition {
        tile: TileKey,
        operation: &'static str,
        found: TileState,
    },

    #[error("Cannot {operation} tile {tile}: not in the store")]
    Missing {
        tile: TileKey,
        operation: &'static str,
    },

    #[error("Tile store is disposed")]
    Disposed,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Failed to hire {worker}: {reason}")]
    Hire { worker: WorkerId, reason: String },

    #[error("{0} is no longer listening")]
    WorkerGone(WorkerId),

    #[error("Tile {tile} pixel buffer has {actual} bytes, expected {expected}")]
    PixelBuffer {
        tile: TileKey,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is disposed")]
    Disposed,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Composer is disposed")]
    Disposed,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
