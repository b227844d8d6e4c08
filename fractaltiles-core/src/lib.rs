pub mod bounds;
pub mod camera;
pub mod config;
pub mod flag;
pub mod messages;
pub mod tiles;
pub mod viewport;

pub use bounds::{Bounds, OutputRect, Resolution};
pub use camera::{Camera, MAX_DEPTH, MIN_SCALE};
pub use config::{default_pool_size, CacheConfig, ConfigError, KernelKind, PlaneConfig, RenderSettings};
pub use flag::DirtyFlag;
pub use messages::{JobAssignment, MainToWorker, TileOutput, WorkerEnvelope, WorkerId, WorkerToMain};
pub use tiles::{tile_width, Tile, TileCorners, TileKey, TileKeyParseError, Tiler};
pub use viewport::Viewport;
