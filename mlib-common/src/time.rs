//! Timestamp and tick utilities
//!
//! Run times are stored as ticks of 100 nanoseconds (10,000,000 per second),
//! the unit catalog providers report durations in.

use std::time::Duration;

/// Ticks per second (1 tick = 100ns)
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Convert ticks to a duration
///
/// Negative tick counts clamp to zero.
pub fn ticks_to_duration(ticks: i64) -> Duration {
    if ticks <= 0 {
        return Duration::ZERO;
    }
    let secs = (ticks / TICKS_PER_SECOND) as u64;
    let nanos = ((ticks % TICKS_PER_SECOND) * 100) as u32;
    Duration::new(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticks_to_duration_zero_and_negative() {
        assert_eq!(ticks_to_duration(0), Duration::ZERO);
        assert_eq!(ticks_to_duration(-5), Duration::ZERO);
    }

    #[test]
    fn test_ticks_to_duration_one_second() {
        assert_eq!(ticks_to_duration(TICKS_PER_SECOND), Duration::from_secs(1));
    }

    #[test]
    fn test_ticks_to_duration_sub_second() {
        // 1.5 seconds
        let duration = ticks_to_duration(15_000_000);
        assert_eq!(duration, Duration::from_millis(1500));
    }

    #[test]
    fn test_ticks_to_duration_two_hours() {
        assert_eq!(ticks_to_duration(72_000_000_000), Duration::from_secs(7200));
    }
}
