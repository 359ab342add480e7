//! Core types for the component manager
//!
//! Time is modelled as floating-point milliseconds since an arbitrary epoch,
//! supplied by an injected `TimeSource` rather than read from a global.

use core::cmp::Ordering;
use core::fmt;
use core::ops::{Add, Sub};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since an arbitrary epoch
///
/// `Timestamp::ZERO` used as a message due-time means "due now"; the manager
/// replaces it with the current time when the message is received.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timestamp(f64);

impl Timestamp {
    /// The unset due-time
    pub const ZERO: Self = Self(0.0);

    /// Create a new timestamp
    pub fn new(millis: f64) -> Self {
        Self(millis)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> f64 {
        self.0
    }

    /// Whether this is the "due now" sentinel (either signed zero)
    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    /// Neither infinite nor NaN
    pub fn is_finite(&self) -> bool {
        self.0.is_finite()
    }

    /// Milliseconds from `earlier` to `self`, clamped at zero
    pub fn millis_since(&self, earlier: Timestamp) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// Offset this timestamp by a duration
    pub fn after(&self, delay: Duration) -> Self {
        Self(self.0 + delay.as_secs_f64() * 1000.0)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Timestamp {}

impl PartialOrd for Timestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add<f64> for Timestamp {
    type Output = Timestamp;

    fn add(self, millis: f64) -> Timestamp {
        Timestamp(self.0 + millis)
    }
}

impl Sub for Timestamp {
    type Output = f64;

    fn sub(self, other: Timestamp) -> f64 {
        self.0 - other.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ms", self.0)
    }
}

/// Convert a non-negative millisecond count to a `Duration`
///
/// Negative counts and NaN give `Duration::ZERO`; anything too large for a
/// `Duration`, infinity included, saturates at `Duration::MAX`.
pub fn millis_to_duration(millis: f64) -> Duration {
    if millis.is_nan() || millis <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
}

// ----------------------------------------------------------------------------
// Time Source Trait
// ----------------------------------------------------------------------------

/// Clock capability injected into each manager
///
/// Implementations should be monotonic; the manager never compares
/// timestamps from two different sources.
pub trait TimeSource {
    /// Get the current timestamp
    fn now(&self) -> Timestamp;
}

/// Monotonic clock whose epoch is the moment it was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    origin: Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now(&self) -> Timestamp {
        // Offset by one millisecond so a fresh clock never yields the due-now sentinel
        Timestamp::new(1.0 + self.origin.elapsed().as_secs_f64() * 1000.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
