use crate::kernel::{texel_centers, Kernel};
use fractaltiles_core::JobAssignment;

/// Escape-time Mandelbrot kernel with f64 arithmetic and grayscale output.
///
/// Escaped points get `255 * iterations / max_iterations`; points that
/// never escape are black. Alpha is always opaque.
#[derive(Clone, Copy, Debug, Default)]
pub struct MandelbrotKernel;

const ESCAPE_RADIUS_SQ: f64 = 4.0;

impl MandelbrotKernel {
    /// Iterations until |z|^2 exceeds 4, or `max_iterations` if it never does.
    pub fn iterations(&self, cx: f64, cy: f64, max_iterations: u32) -> u32 {
        let mut zx = 0.0_f64;
        let mut zy = 0.0_f64;

        for i in 0..max_iterations {
            let zx_sq = zx * zx;
            let zy_sq = zy * zy;
            if zx_sq + zy_sq > ESCAPE_RADIUS_SQ {
                return i;
            }

            zy = 2.0 * zx * zy + cy;
            zx = zx_sq - zy_sq + cx;
        }

        max_iterations
    }

    fn shade(iterations: u32, max_iterations: u32) -> u8 {
        if iterations >= max_iterations {
            0
        } else {
            (255.0 * f64::from(iterations) / f64::from(max_iterations)).floor() as u8
        }
    }
}

impl Kernel for MandelbrotKernel {
    fn id(&self) -> &'static str {
        "mandelbrot"
    }

    fn render(&self, job: &JobAssignment) -> Vec<u8> {
        let section = job.section();
        let resolution = job.resolution();
        let max_iterations = job.max_iterations.max(1);

        let xs: Vec<f64> = texel_centers(section.min_x, section.max_x, resolution.width).collect();
        let mut pixels = Vec::with_capacity(resolution.texel_count() * 4);

        for cy in texel_centers(section.min_y, section.max_y, resolution.height) {
            for &cx in &xs {
                let v = Self::shade(self.iterations(cx, cy, max_iterations), max_iterations);
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }

        pixels
    }
}
