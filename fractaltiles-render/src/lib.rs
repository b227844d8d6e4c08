//! Tile store, job queue and composer of the tiled renderer.
//!
//! The composer owns everything and is driven from one thread. Workers
//! behind a [`Supervisor`] compute tiles elsewhere and only ever talk back
//! through messages.

pub mod bitmap;
pub mod composer;
pub mod error;
pub mod painter;
pub mod queue;
pub mod store;
pub mod supervisor;
pub mod thread_supervisor;

#[cfg(test)]
mod test_utils;

pub use bitmap::Bitmap;
pub use composer::Composer;
pub use error::{QueueError, RenderError, StoreError, SupervisorError};
pub use painter::{FramePainter, Painter};
pub use queue::JobQueue;
pub use store::{TileRecord, TileState, TileStore, TimeWheel};
pub use supervisor::{JobResult, Supervisor};
pub use thread_supervisor::{ThreadSupervisor, ThreadWorker};
