use std::time::Duration;

use crate::core::SimTime;
use crate::error::ConfigError;

/// Upper bound on concurrent jobs.
pub const MAX_SLOTS: usize = 64;

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Total jobs to spawn over the whole run.
    pub max_jobs: u64,
    /// Jobs that may exist at the same time.
    pub slots: usize,
    /// Quantum of level 0; every later level doubles it.
    pub base_quantum: SimTime,
    /// Clock advance per scheduling tick.
    pub timestep: SimTime,
    /// Exclusive bound of the coarse part of the gap between spawns.
    pub spawn_jitter_coarse: u64,
    /// Exclusive bound of the fine part of the gap between spawns.
    pub spawn_jitter_fine: u64,
    /// Exclusive bound, in fine units, of the cost charged per dispatch.
    pub dispatch_overhead: u64,
    /// Stop the loop the first time a spawn is due after the quota is used up,
    /// even if jobs are still running. When false the loop drains instead.
    pub halt_on_spawn_quota: bool,
    /// Wall-clock budget for the whole run.
    pub runtime_budget: Option<Duration>,
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_jobs: 100,
            slots: 18,
            base_quantum: SimTime::from_fine(10_000_000),
            timestep: SimTime::from_fine(100),
            spawn_jitter_coarse: 1,
            spawn_jitter_fine: 500_000,
            dispatch_overhead: 100,
            halt_on_spawn_quota: true,
            runtime_budget: Some(Duration::from_secs(3)),
            seed: None,
        }
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slots == 0 || self.slots > MAX_SLOTS {
            return Err(ConfigError::Slots {
                got: self.slots,
                max: MAX_SLOTS,
            });
        }
        if self.base_quantum.is_zero() {
            return Err(ConfigError::ZeroQuantum);
        }
        if self.timestep.is_zero() {
            return Err(ConfigError::ZeroTimestep);
        }
        Ok(())
    }
}
