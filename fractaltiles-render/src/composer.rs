//! Driving loop of the tiled renderer.
//!
//! The composer is ticked by its owner (an animation loop, a test, a
//! headless batch run). Each [`Composer::draw`] drains finished tiles from
//! the workers and, when something changed, works out which tiles the
//! camera can see, submits the ones the cache is missing and repaints
//! everything that is ready.
//!
//! Tiles are laid at the camera's optimal depth and at up to three coarser
//! depths. Coarse tiles are cheap, finish first and are painted first, so a
//! blurry version of the view shows while fine tiles are still in flight.

use crate::{
    Bitmap, JobQueue, Painter, RenderError, Supervisor, ThreadSupervisor, TileState, TileStore,
};
use fractaltiles_compute::create_kernel;
use fractaltiles_core::{
    Bounds, CacheConfig, Camera, ConfigError, DirtyFlag, JobAssignment, PlaneConfig,
    RenderSettings, Tile, Tiler,
};
use std::time::Duration;

/// Coarser depths laid under the optimal one as fallback.
const FALLBACK_DEPTHS: u32 = 3;

pub struct Composer<S: Supervisor, P: Painter<S::Payload>> {
    camera: Camera,
    tiler: Tiler,
    store: TileStore<S::Payload>,
    queue: JobQueue<S>,
    painter: P,
    max_iterations: u32,
    dirty: DirtyFlag,
    disposed: bool,
}

impl<P: Painter<Bitmap>> Composer<ThreadSupervisor, P> {
    /// Pipeline with one OS thread per worker running `settings.kernel`.
    pub fn threaded(
        plane: &PlaneConfig,
        settings: &RenderSettings,
        painter: P,
    ) -> Result<Self, RenderError> {
        let supervisor = ThreadSupervisor::new(create_kernel(settings.kernel));
        Self::new(plane, settings, supervisor, painter)
    }
}

impl<S: Supervisor, P: Painter<S::Payload>> Composer<S, P> {
    pub fn new(
        plane: &PlaneConfig,
        settings: &RenderSettings,
        supervisor: S,
        painter: P,
    ) -> Result<Self, RenderError> {
        plane.validate()?;
        settings.validate()?;

        let queue = JobQueue::new(supervisor, settings.pool_size, settings.max_retries)?;
        log::info!(
            "Composer ready: {} texels per tile, {} iterations",
            settings.tile_resolution,
            settings.max_iterations
        );

        Ok(Self {
            camera: Camera::new(plane),
            tiler: Tiler::new(plane.bounds(), settings.tile_resolution),
            store: TileStore::new(settings.cache),
            queue,
            painter,
            max_iterations: settings.max_iterations,
            dirty: DirtyFlag::new(true),
            disposed: false,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Camera mutations mark the view dirty on their own.
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn painter_mut(&mut self) -> &mut P {
        &mut self.painter
    }

    pub fn store(&self) -> &TileStore<S::Payload> {
        &self.store
    }

    pub fn queue(&self) -> &JobQueue<S> {
        &self.queue
    }

    pub fn resolution(&self) -> u32 {
        self.tiler.resolution()
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// No job pending or running.
    pub fn is_idle(&self) -> bool {
        self.queue.is_idle()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Repaint if anything changed since the last call. Returns whether a
    /// repaint happened.
    pub fn draw(&mut self) -> Result<bool, RenderError> {
        self.ensure_live()?;
        self.queue.process_events(&mut self.store)?;

        // Every flag is read so every flag is cleared.
        let camera_moved = self.camera.take_dirty();
        let tiles_arrived = self.queue.take_dirty();
        let forced = self.dirty.read_and_clear();
        if !(camera_moved || tiles_arrived || forced) {
            return Ok(false);
        }

        let view = self.camera.viewport_bounds();
        let depth = self.camera.optimal_depth(self.tiler.resolution());
        let tiles = self.visible_tiles(&view, depth);

        if self.tiler.view_changed(&view, depth) {
            self.queue.prune(&mut self.store)?;
            self.prepare_tiles(&tiles)?;
            let evicted = self.store.prune()?;
            log::debug!(
                "View changed: depth {}, {} tiles visible, {} evicted",
                depth,
                tiles.len(),
                evicted
            );
        }

        self.painter.clear_canvas();
        for tile in &tiles {
            let payload = self.store.get(&tile.key)?.and_then(|r| r.payload());
            if let Some(payload) = payload {
                let bounds = self.camera.plane_bounds_to_output(&tile.section);
                self.painter.paint_tile(payload, &bounds);
            }
        }
        Ok(true)
    }

    /// Block up to `timeout` for finished tiles. Returns how many worker
    /// messages were handled.
    pub fn wait_for_tiles(&mut self, timeout: Duration) -> Result<usize, RenderError> {
        self.ensure_live()?;
        Ok(self.queue.wait_for_events(&mut self.store, timeout)?)
    }

    /// Change texels per tile. Everything cached so far is discarded.
    pub fn set_resolution(&mut self, resolution: u32) -> Result<(), RenderError> {
        self.ensure_live()?;
        if resolution == 0 {
            return Err(ConfigError::Invalid {
                field: "tile_resolution",
                reason: "must be at least 1 texel".to_string(),
            }
            .into());
        }
        if resolution == self.tiler.resolution() {
            return Ok(());
        }

        log::info!("Tile resolution {} -> {}", self.tiler.resolution(), resolution);
        self.invalidate()?;
        self.tiler.set_resolution(resolution);
        Ok(())
    }

    /// Change the iteration budget. Everything cached so far is discarded.
    pub fn set_max_iterations(&mut self, max_iterations: u32) -> Result<(), RenderError> {
        self.ensure_live()?;
        if max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_iterations",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        if max_iterations == self.max_iterations {
            return Ok(());
        }

        log::info!("Max iterations {} -> {}", self.max_iterations, max_iterations);
        self.invalidate()?;
        self.max_iterations = max_iterations;
        self.tiler.forget_view();
        Ok(())
    }

    pub fn set_pool_size(&mut self, pool_size: usize) -> Result<(), RenderError> {
        self.ensure_live()?;
        Ok(self.queue.set_pool_size(pool_size, &mut self.store)?)
    }

    /// Swap the eviction policy. Visible tiles it evicts are resubmitted
    /// on the next draw.
    pub fn set_cache_policy(&mut self, policy: CacheConfig) -> Result<(), RenderError> {
        self.ensure_live()?;
        policy.validate()?;
        self.store.set_policy(policy)?;
        self.tiler.forget_view();
        self.dirty.set();
        Ok(())
    }

    /// Stop all workers and drop every tile. Later calls fail.
    pub fn dispose(&mut self) -> Result<(), RenderError> {
        self.ensure_live()?;
        self.disposed = true;
        self.queue.dispose()?;
        self.store.dispose()?;
        log::info!("Composer disposed");
        Ok(())
    }

    fn invalidate(&mut self) -> Result<(), RenderError> {
        self.queue.clear_and_bump_generation()?;
        self.store.clear()?;
        self.dirty.set();
        Ok(())
    }

    /// Coarsest first.
    fn visible_tiles(&self, view: &Bounds, depth: u32) -> Vec<Tile> {
        (depth.saturating_sub(FALLBACK_DEPTHS)..=depth)
            .flat_map(|d| self.tiler.lay_tiles(view, d))
            .collect()
    }

    /// Submit tiles the store lacks and refresh the age of ready ones.
    fn prepare_tiles(&mut self, tiles: &[Tile]) -> Result<(), RenderError> {
        let mut jobs = Vec::new();

        for tile in tiles {
            let state = self.store.get(&tile.key)?.map(|r| r.state());
            match state {
                None | Some(TileState::Queued) => {
                    self.store.set_queued(tile.key)?;
                    jobs.push(JobAssignment::new(tile.clone(), self.max_iterations));
                }
                Some(TileState::Ready) => {
                    self.store.touch(tile.key)?;
                }
                Some(TileState::Rendering) => {}
            }
        }

        if !jobs.is_empty() {
            log::debug!("Submitting {} tiles", jobs.len());
        }
        Ok(self.queue.enqueue_end(jobs, &mut self.store)?)
    }

    fn ensure_live(&self) -> Result<(), RenderError> {
        if self.disposed {
            Err(RenderError::Disposed)
        } else {
            Ok(())
        }
    }
}
