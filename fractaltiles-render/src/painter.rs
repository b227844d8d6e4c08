use crate::Bitmap;
use fractaltiles_core::Bounds;

/// Display surface the composer paints onto.
pub trait Painter<P> {
    fn clear_canvas(&mut self);

    /// Draw `payload` stretched over `output_bounds`, in output pixels.
    fn paint_tile(&mut self, payload: &P, output_bounds: &Bounds);
}

/// In-memory RGBA framebuffer. Tiles are scaled nearest-neighbour and
/// clipped to the frame.
#[derive(Debug, Clone)]
pub struct FramePainter {
    width: u32,
    height: u32,
    background: [u8; 4],
    pixels: Vec<[u8; 4]>,
}

impl FramePainter {
    pub const BLACK: [u8; 4] = [0, 0, 0, 255];

    pub fn new(width: u32, height: u32) -> Self {
        Self::with_background(width, height, Self::BLACK)
    }

    pub fn with_background(width: u32, height: u32, background: [u8; 4]) -> Self {
        Self {
            width,
            height,
            background,
            pixels: vec![background; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reallocate for a new output size. Contents are lost.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.pixels = vec![self.background; width as usize * height as usize];
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }
}

/// Pixel range `[start, end)` covered by `min..max` on an axis of `len`.
/// Edges round to the nearest pixel so neighbouring tiles meet exactly.
fn span(min: f64, max: f64, len: u32) -> (u32, u32) {
    let clamp = |v: f64| v.round().clamp(0.0, f64::from(len)) as u32;
    (clamp(min), clamp(max))
}

/// Texel under output pixel `p` for a tile spanning `min..min + extent`.
fn source_index(p: u32, min: f64, extent: f64, texels: u32) -> u32 {
    let t = ((f64::from(p) + 0.5 - min) / extent * f64::from(texels)).floor();
    t.clamp(0.0, f64::from(texels - 1)) as u32
}

impl Painter<Bitmap> for FramePainter {
    fn clear_canvas(&mut self) {
        self.pixels.fill(self.background);
    }

    fn paint_tile(&mut self, bitmap: &Bitmap, output_bounds: &Bounds) {
        let extent_x = output_bounds.width();
        let extent_y = output_bounds.height();
        if bitmap.width == 0 || bitmap.height == 0 || extent_x <= 0.0 || extent_y <= 0.0 {
            return;
        }

        let (x0, x1) = span(output_bounds.min_x, output_bounds.max_x, self.width);
        let (y0, y1) = span(output_bounds.min_y, output_bounds.max_y, self.height);
        let row = self.width as usize;

        for py in y0..y1 {
            let ty = source_index(py, output_bounds.min_y, extent_y, bitmap.height);
            for px in x0..x1 {
                let tx = source_index(px, output_bounds.min_x, extent_x, bitmap.width);
                if let Some(texel) = bitmap.texel(tx, ty) {
                    self.pixels[py as usize * row + px as usize] = texel;
                }
            }
        }
    }
}
