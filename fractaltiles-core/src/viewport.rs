use crate::{Bounds, PlaneConfig};
use serde::{Deserialize, Serialize};

/// Visible window into the plane, in plane units.
///
/// Every mutation re-clamps to the plane. When the window is wider (or
/// taller) than the plane it is centered with symmetric overflow on that
/// axis instead of being clamped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    plane: Bounds,
    bounds: Bounds,
}

impl Viewport {
    /// Starts out covering the whole plane.
    pub fn new(plane: &PlaneConfig) -> Self {
        let plane = plane.bounds();
        Self {
            plane,
            bounds: plane,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn plane_bounds(&self) -> Bounds {
        self.plane
    }

    /// Resize to `width` x `height`, keeping `anchor` at the same relative
    /// position inside the window. Anchors on the center when `None`.
    pub fn resize(&mut self, width: f64, height: f64, anchor: Option<(f64, f64)>) {
        let (ax, ay) = anchor.unwrap_or_else(|| self.bounds.center());

        let horizontal = proportion(ax - self.bounds.min_x, self.bounds.width());
        let vertical = proportion(ay - self.bounds.min_y, self.bounds.height());

        let min_x = ax - width * horizontal;
        let min_y = ay - height * vertical;

        self.bounds = Bounds::new(min_x, min_y, min_x + width, min_y + height);
        self.clamp_to_plane();
    }

    pub fn move_by(&mut self, dx: f64, dy: f64) {
        self.bounds = self.bounds.translated(dx, dy);
        self.clamp_to_plane();
    }

    fn clamp_to_plane(&mut self) {
        let width = self.bounds.width();
        let height = self.bounds.height();

        let min_x = clamp_axis(self.bounds.min_x, width, self.plane.min_x, self.plane.max_x);
        let min_y = clamp_axis(self.bounds.min_y, height, self.plane.min_y, self.plane.max_y);

        self.bounds = Bounds::new(min_x, min_y, min_x + width, min_y + height);
    }
}

fn proportion(offset: f64, extent: f64) -> f64 {
    if extent > 0.0 {
        offset / extent
    } else {
        0.5
    }
}

/// New minimum edge for a window of `extent` on one axis of the plane.
fn clamp_axis(min: f64, extent: f64, plane_min: f64, plane_max: f64) -> f64 {
    let plane_extent = plane_max - plane_min;
    if extent > plane_extent {
        plane_min - (extent - plane_extent) / 2.0
    } else {
        min.max(plane_min).min(plane_max - extent)
    }
}
