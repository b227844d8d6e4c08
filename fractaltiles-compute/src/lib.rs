pub mod kernel;
pub mod mandelbrot;
pub mod test_pattern;
pub mod worker;

pub use kernel::{create_kernel, Kernel};
pub use mandelbrot::MandelbrotKernel;
pub use test_pattern::TestPatternKernel;
pub use worker::{run_worker, spawn_worker};

// Re-export core types for convenience
pub use fractaltiles_core::*;
