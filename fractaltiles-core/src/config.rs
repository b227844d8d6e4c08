//! Plane and render configuration.
//!
//! The plane is fixed at construction; render settings are runtime-tunable
//! and can be loaded from a JSON document.

use crate::Bounds;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// The square region of the logical plane being visualized.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneConfig {
    pub center: (f64, f64),
    pub side: f64,
}

impl PlaneConfig {
    pub fn new(center: (f64, f64), side: f64) -> Self {
        Self { center, side }
    }

    pub fn bounds(&self) -> Bounds {
        Bounds::square(self.center, self.side)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.side.is_finite() && self.side > 0.0) {
            return Err(ConfigError::Invalid {
                field: "side",
                reason: format!("plane side must be positive, got {}", self.side),
            });
        }
        if !(self.center.0.is_finite() && self.center.1.is_finite()) {
            return Err(ConfigError::Invalid {
                field: "center",
                reason: "plane center must be finite".to_string(),
            });
        }
        Ok(())
    }
}

/// Default plane: the classic Mandelbrot window.
impl Default for PlaneConfig {
    fn default() -> Self {
        Self::new((-0.5, 0.0), 4.0)
    }
}

/// Eviction policy of the tile cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Ticks a tile must survive before capacity pressure may evict it.
    pub min_age: usize,
    /// Age buckets the cache may span. Once it spans this many (the oldest
    /// tile is `max_age - 1` ticks old) the oldest bucket is evicted
    /// regardless of capacity. Ignored unless greater than `min_age`.
    pub max_age: usize,
    /// Resident ready tiles allowed before the oldest eligible ones go.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_age: 5,
            max_age: 0,
            capacity: 5000,
        }
    }
}

impl CacheConfig {
    /// A zero `min_age` would let a tile be evicted in the tick it was
    /// stored.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_age == 0 {
            return Err(ConfigError::Invalid {
                field: "cache.min_age",
                reason: "must be at least 1 tick".to_string(),
            });
        }
        Ok(())
    }
}

/// Which compute kernel the workers run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelKind {
    #[default]
    Mandelbrot,
    TestPattern,
}

impl KernelKind {
    pub fn id(&self) -> &'static str {
        match self {
            KernelKind::Mandelbrot => "mandelbrot",
            KernelKind::TestPattern => "test_pattern",
        }
    }
}

/// Runtime-tunable render parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Texels per tile side.
    pub tile_resolution: u32,
    pub max_iterations: u32,
    pub pool_size: usize,
    pub kernel: KernelKind,
    pub cache: CacheConfig,
    /// Failed attempts tolerated per tile before it is abandoned until the
    /// view changes.
    pub max_retries: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            tile_resolution: 64,
            max_iterations: 500,
            pool_size: default_pool_size(),
            kernel: KernelKind::default(),
            cache: CacheConfig::default(),
            max_retries: 2,
        }
    }
}

impl RenderSettings {
    /// Parse settings from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile_resolution == 0 {
            return Err(ConfigError::Invalid {
                field: "tile_resolution",
                reason: "must be at least 1 texel".to_string(),
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                field: "max_iterations",
                reason: "must be at least 1".to_string(),
            });
        }
        self.cache.validate()
    }
}

/// One worker per core, leaving one for the driver thread.
pub fn default_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(3)
        .max(1)
}
