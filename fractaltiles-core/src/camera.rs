use crate::{Bounds, DirtyFlag, OutputRect, PlaneConfig, Viewport};

/// Deepest subdivision level ever requested.
pub const MAX_DEPTH: u32 = 60;

/// Smallest plane-units-per-output-pixel the camera allows.
pub const MIN_SCALE: f64 = 1.0 / (1u64 << 58) as f64;

/// Maps between client pixels, output pixels and plane coordinates.
///
/// `scale` is plane units per output pixel. Output pixels are client pixels
/// multiplied by the device pixel ratio. Every pan, zoom or resize marks the
/// camera dirty.
#[derive(Clone, Debug)]
pub struct Camera {
    viewport: Viewport,
    plane_side: f64,
    output: OutputRect,
    pixel_ratio: f64,
    scale: f64,
    max_scale: f64,
    dirty: DirtyFlag,
}

impl Camera {
    pub fn new(plane: &PlaneConfig) -> Self {
        Self {
            viewport: Viewport::new(plane),
            plane_side: plane.side,
            output: OutputRect::sized(plane.side, plane.side),
            pixel_ratio: 1.0,
            scale: 1.0,
            max_scale: 1.0,
            dirty: DirtyFlag::new(true),
        }
    }

    pub fn viewport_bounds(&self) -> Bounds {
        self.viewport.bounds()
    }

    pub fn plane_bounds(&self) -> Bounds {
        self.viewport.plane_bounds()
    }

    pub fn plane_side(&self) -> f64 {
        self.plane_side
    }

    pub fn output_rect(&self) -> OutputRect {
        self.output
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn min_scale(&self) -> f64 {
        MIN_SCALE
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }

    pub fn clamped_scale(&self, scale: f64) -> f64 {
        scale.clamp(MIN_SCALE, self.max_scale)
    }

    /// Adopt a new output rectangle.
    ///
    /// The widest scale is the one that shows the whole plane along the
    /// tighter axis. The viewport keeps its center.
    pub fn resize(&mut self, rect: OutputRect) {
        self.output = rect;
        if rect.is_empty() {
            return;
        }

        let horizontal = self.plane_side / rect.width;
        let vertical = self.plane_side / rect.height;
        self.max_scale = horizontal.max(vertical).max(MIN_SCALE);
        self.scale = self.clamped_scale(self.scale);

        self.resize_viewport(None);
    }

    pub fn set_pixel_ratio(&mut self, ratio: f64) {
        if ratio.is_finite() && ratio > 0.0 && ratio != self.pixel_ratio {
            self.pixel_ratio = ratio;
            self.dirty.set();
        }
    }

    /// Set the scale around the viewport center.
    pub fn set_scale(&mut self, scale: f64) {
        self.scale = self.clamped_scale(scale);
        self.resize_viewport(None);
    }

    /// Pan by a delta in output pixels.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.viewport.move_by(dx * self.scale, dy * self.scale);
        self.dirty.set();
    }

    /// Zoom to `scale`, keeping the plane point under output pixel
    /// (`x`, `y`) fixed.
    pub fn zoom_at(&mut self, scale: f64, x: f64, y: f64) {
        let anchor = self.output_to_plane(x, y);
        self.scale = self.clamped_scale(scale);
        self.resize_viewport(Some(anchor));
    }

    /// Subdivision depth whose tiles, rendered at `tile_resolution` texels,
    /// match one texel per output pixel.
    pub fn optimal_depth(&self, tile_resolution: u32) -> u32 {
        let texels = f64::from(tile_resolution.max(1));
        let depth = (self.plane_side / (self.scale * texels)).log2().ceil();
        if depth.is_nan() || depth <= 0.0 {
            0
        } else {
            (depth as u32).min(MAX_DEPTH)
        }
    }

    pub fn client_to_output(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.output.left) * self.pixel_ratio,
            (y - self.output.top) * self.pixel_ratio,
        )
    }

    pub fn output_to_plane(&self, x: f64, y: f64) -> (f64, f64) {
        let view = self.viewport.bounds();
        (view.min_x + x * self.scale, view.min_y + y * self.scale)
    }

    pub fn plane_to_output(&self, x: f64, y: f64) -> (f64, f64) {
        let view = self.viewport.bounds();
        ((x - view.min_x) / self.scale, (y - view.min_y) / self.scale)
    }

    pub fn client_to_plane(&self, x: f64, y: f64) -> (f64, f64) {
        let (ox, oy) = self.client_to_output(x, y);
        self.output_to_plane(ox, oy)
    }

    pub fn plane_to_client(&self, x: f64, y: f64) -> (f64, f64) {
        let (ox, oy) = self.plane_to_output(x, y);
        (
            ox / self.pixel_ratio + self.output.left,
            oy / self.pixel_ratio + self.output.top,
        )
    }

    /// Where a plane-space rectangle lands on the output surface.
    pub fn plane_bounds_to_output(&self, bounds: &Bounds) -> Bounds {
        let (min_x, min_y) = self.plane_to_output(bounds.min_x, bounds.min_y);
        let (max_x, max_y) = self.plane_to_output(bounds.max_x, bounds.max_y);
        Bounds::new(min_x, min_y, max_x, max_y)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_set()
    }

    pub fn take_dirty(&mut self) -> bool {
        self.dirty.read_and_clear()
    }

    fn resize_viewport(&mut self, anchor: Option<(f64, f64)>) {
        self.viewport.resize(
            self.output.width * self.scale,
            self.output.height * self.scale,
            anchor,
        );
        self.dirty.set();
    }
}
