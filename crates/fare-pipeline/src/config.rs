use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

const DEFAULT_WORKERS: usize = 10;
const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Pool sizes and behaviour switches of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stage 1 workers (monthly availability).
    pub availability_workers: usize,
    /// Stage 2 workers (fee quotes).
    pub price_workers: usize,
    pub archive_workers: usize,
    /// Capacity of each bounded channel between stages.
    pub channel_capacity: usize,
    /// Reuse the first fee quote of a route for every flight of that route.
    pub fee_cache: bool,
    /// Delete the archived record of flights that became unavailable.
    pub prune_unavailable: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            availability_workers: DEFAULT_WORKERS,
            price_workers: DEFAULT_WORKERS,
            archive_workers: DEFAULT_WORKERS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            fee_cache: false,
            prune_unavailable: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, value) in [
            ("availability_workers", self.availability_workers),
            ("price_workers", self.price_workers),
            ("archive_workers", self.archive_workers),
            ("channel_capacity", self.channel_capacity),
        ] {
            if value == 0 {
                return Err(PipelineError::config(format!("{name} must be at least 1")));
            }
        }
        Ok(())
    }
}
