// fractaltiles-compute/src/test_pattern.rs

use crate::Kernel;
use fractaltiles_core::JobAssignment;

/// Texels per checker square.
const CHECKER: u32 = 8;

const EDGE: [u8; 4] = [255, 0, 0, 255];
const LIGHT: [u8; 4] = [200, 200, 200, 255];
const DARK: [u8; 4] = [60, 60, 60, 255];

/// Checkerboard with a red border on every tile. Cheap enough to exercise the
/// pipeline without iterating anything; the checker phase flips with depth
/// so neighbouring depths are distinguishable.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestPatternKernel;

impl TestPatternKernel {
    pub fn texel(&self, px: u32, py: u32, width: u32, height: u32, depth: u32) -> [u8; 4] {
        let on_edge = px == 0 || py == 0 || px + 1 == width || py + 1 == height;
        if on_edge {
            return EDGE;
        }

        if (px / CHECKER + py / CHECKER + depth) % 2 == 0 {
            LIGHT
        } else {
            DARK
        }
    }
}

impl Kernel for TestPatternKernel {
    fn id(&self) -> &'static str {
        "test_pattern"
    }

    fn render(&self, job: &JobAssignment) -> Vec<u8> {
        let resolution = job.resolution();
        let depth = job.tile_id.depth;

        (0..resolution.height)
            .flat_map(|py| (0..resolution.width).map(move |px| (px, py)))
            .flat_map(|(px, py)| self.texel(px, py, resolution.width, resolution.height, depth))
            .collect()
    }
}
