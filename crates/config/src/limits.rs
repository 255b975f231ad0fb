//! Rate limit capacities

use serde::{Deserialize, Serialize};

/// Token-bucket capacities per key across three overlapping windows.
///
/// All three buckets must hold enough tokens for a request to pass, so
/// the daily cap blocks traffic even with a full per-minute bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per minute
    #[serde(default = "default_per_minute")]
    pub per_minute: f64,
    /// Requests per hour
    #[serde(default = "default_per_hour")]
    pub per_hour: f64,
    /// Requests per day
    #[serde(default = "default_per_day")]
    pub per_day: f64,
}

fn default_per_minute() -> f64 {
    20.0
}

fn default_per_hour() -> f64 {
    200.0
}

fn default_per_day() -> f64 {
    1000.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
            per_day: default_per_day(),
        }
    }
}
