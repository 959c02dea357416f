use crate::core::config::ConfigError;
use crate::core::errors::CbproError;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of request timestamps
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds
    fn unix_seconds(&self) -> Result<u64, CbproError>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn unix_seconds(&self) -> Result<u64, CbproError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .map_err(|e| {
                ConfigError::InvalidConfiguration(format!("System clock is before 1970: {}", e))
                    .into()
            })
    }
}

/// Clock frozen at one instant, for reproducible signatures
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn unix_seconds(&self) -> Result<u64, CbproError> {
        Ok(self.0)
    }
}
