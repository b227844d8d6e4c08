use crate::{MandelbrotKernel, TestPatternKernel};
use fractaltiles_core::{JobAssignment, KernelKind};

// ============================================================================
// Kernel Trait
// ============================================================================

/// Per-texel computation run by a worker.
///
/// A kernel turns a tile's spatial section into `width * height` RGBA
/// texels, row-major, top row first. Kernels are cloned into every worker a
/// supervisor hires.
pub trait Kernel: dyn_clone::DynClone + Send {
    /// Stable identifier, used in logs.
    fn id(&self) -> &'static str;

    fn render(&self, job: &JobAssignment) -> Vec<u8>;
}

dyn_clone::clone_trait_object!(Kernel);

/// Create a kernel by kind for use by workers.
pub fn create_kernel(kind: KernelKind) -> Box<dyn Kernel> {
    match kind {
        KernelKind::Mandelbrot => Box::new(MandelbrotKernel),
        KernelKind::TestPattern => Box::new(TestPatternKernel),
    }
}

/// Plane coordinate of texel centers along one axis.
pub(crate) fn texel_centers(min: f64, max: f64, texels: u32) -> impl Iterator<Item = f64> {
    let step = (max - min) / f64::from(texels.max(1));
    (0..texels).map(move |i| min + (f64::from(i) + 0.5) * step)
}
