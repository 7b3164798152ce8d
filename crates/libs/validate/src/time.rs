//! Monotonic process clock and clock-time formatting

use std::sync::OnceLock;
use std::time::{Duration, Instant};

static PROCESS_START: OnceLock<Instant> = OnceLock::new();

/// Pin the process start instant.
///
/// Called from [`crate::init`] and [`crate::Runner::new`]; calling it again is a no-op.
pub fn mark_process_start() -> Instant {
    *PROCESS_START.get_or_init(Instant::now)
}

/// Monotonic offset since the process start
pub fn since_process_start() -> Duration {
    mark_process_start().elapsed()
}

/// Format a position as `H:MM:SS.NNNNNNNNN`
pub fn format_clock_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!(
        "{}:{:02}:{:02}.{:09}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        time.subsec_nanos()
    )
}

/// Format an optional position, `99:99:99.999999999` standing in for "none"
pub fn format_optional_clock_time(time: Option<Duration>) -> String {
    match time {
        Some(time) => format_clock_time(time),
        None => "99:99:99.999999999".to_string(),
    }
}

/// Convert a script value in seconds to a position.
///
/// Negative, non-finite and out-of-range values are rejected.
pub fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_clock_time() {
        assert_eq!(format_clock_time(Duration::ZERO), "0:00:00.000000000");
        assert_eq!(
            format_clock_time(Duration::from_millis(4900)),
            "0:00:04.900000000"
        );
        assert_eq!(
            format_clock_time(Duration::from_secs(3723) + Duration::from_nanos(5)),
            "1:02:03.000000005"
        );
    }

    #[test]
    fn test_seconds_to_duration() {
        assert_eq!(seconds_to_duration(5.0), Some(Duration::from_secs(5)));
        assert_eq!(seconds_to_duration(-1.0), None);
        assert_eq!(seconds_to_duration(f64::NAN), None);
        assert_eq!(seconds_to_duration(f64::INFINITY), None);
        assert_eq!(seconds_to_duration(1e30), None);
    }

    #[test]
    fn test_process_clock_is_monotonic() {
        let a = since_process_start();
        let b = since_process_start();
        assert!(b >= a);
    }
}
