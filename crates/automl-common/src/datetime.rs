use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{CommonError, CommonResult};

/// Returns the current wall-clock time as fractional seconds since the Unix epoch.
pub fn unix_epoch_secs() -> CommonResult<f64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .map_err(|e| CommonError::internal(format!("system clock is before the Unix epoch: {e}")))
}
