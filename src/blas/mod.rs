use std::sync::OnceLock;

pub mod gemm;
pub mod im2col;

pub use gemm::{gemm, Transpose};
pub use im2col::im2col;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GemmBackend {
    Naive,
    // Splits work over output columns (GEMM) or column matrix rows (im2col) on the rayon pool
    Parallel,
}

#[derive(Clone, Copy, Debug)]
pub struct BlasSettings {
    pub backend: GemmBackend,
    pub parallel_threshold: usize,
}

impl Default for BlasSettings {
    fn default() -> Self {
        Self {
            backend: GemmBackend::Parallel,
            parallel_threshold: 10000,
        }
    }
}

static SETTINGS: OnceLock<BlasSettings> = OnceLock::new();

// Returns false if the settings were already fixed, either by an earlier call or by first use
pub fn configure(settings: BlasSettings) -> bool {
    SETTINGS.set(settings).is_ok()
}

pub fn settings() -> BlasSettings {
    *SETTINGS.get_or_init(BlasSettings::default)
}

// Whether `work` elements of work should be spread over the pool
pub(crate) fn use_parallel(work: usize) -> bool {
    let settings = settings();
    settings.backend == GemmBackend::Parallel && work >= settings.parallel_threshold
}
