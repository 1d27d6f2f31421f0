use crate::{blas::{self, BlasSettings, GemmBackend}, error::EngineError};

pub const DEFAULT_MAX_STAGE_DEPTH: usize = 64;

// TODO: Read overrides from environment variables so the CLI is not the only way to tune these
pub struct EngineConfig {
    pub threads: usize,
    pub gemm_backend: GemmBackend,
    // Element count under which GEMM and im2col stay on the calling thread
    pub parallel_threshold: usize,
    // Maximum Sequential nesting the loader will follow
    pub max_stage_depth: usize,
}

impl EngineConfig {
    pub fn build(self) -> Result<Self, EngineError> {
        check_threads(self.threads)?;

        if self.max_stage_depth == 0 {
            return Err(EngineError::Configuration(
                "max_stage_depth must be at least 1".to_string()
            ));
        }

        Ok(self)
    }

    pub fn blas_settings(&self) -> BlasSettings {
        BlasSettings {
            backend: self.gemm_backend,
            parallel_threshold: self.parallel_threshold,
        }
    }

    // Builds the global rayon pool and fixes the BLAS kernel selection.
    // Both are process wide and can only be set once, later calls keep the first values.
    pub fn install(&self) {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build_global()
        {
            log::warn!("Global thread pool already initialised, keeping it: {}", e);
        }

        if !blas::configure(self.blas_settings()) {
            log::warn!("BLAS settings already fixed, ignoring {:?}", self.gemm_backend);
        }

        log::debug!(
            "Engine installed: threads={}, backend={:?}, parallel_threshold={}",
            self.threads, self.gemm_backend, self.parallel_threshold
        );
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            gemm_backend: GemmBackend::Parallel,
            parallel_threshold: 10000,
            max_stage_depth: DEFAULT_MAX_STAGE_DEPTH,
        }
    }
}

fn check_threads(threads: usize) -> Result<(), EngineError> {
    if threads == 0 {
        return Err(EngineError::Configuration(
            "threads must be at least 1".to_string()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_builds() {
        let config = EngineConfig::default().build().unwrap();
        assert!(config.threads >= 1);
        assert_eq!(config.max_stage_depth, 64);
    }

    #[test]
    fn zero_threads_is_rejected() {
        let config = EngineConfig { threads: 0, ..Default::default() };
        assert!(matches!(config.build(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn zero_depth_is_rejected() {
        let config = EngineConfig { max_stage_depth: 0, ..Default::default() };
        assert!(config.build().is_err());
    }
}
