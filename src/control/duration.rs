//! Human-readable rendering of the engine's execution time.

/// Units from greatest to smallest, with their size in seconds.
const INTERVALS: [(&str, u64); 5] = [
    ("weeks", 604_800),
    ("days", 86_400),
    ("hours", 3_600),
    ("minutes", 60),
    ("seconds", 1),
];

/// Renders `seconds` as a comma-separated breakdown, greatest unit first.
///
/// Units with a zero value are skipped; at most `granularity` units are shown
/// (the least significant are dropped). A unit name is singular when its value
/// is exactly one. Zero seconds renders as an empty string.
///
/// ```
/// use plcvisor::display_time;
///
/// assert_eq!(display_time(3661, 2), "1 hour, 1 minute");
/// assert_eq!(display_time(1_209_600 + 7_200, 4), "2 weeks, 2 hours");
/// ```
pub fn display_time(seconds: u64, granularity: usize) -> String {
    let mut remaining = seconds;
    let mut parts = Vec::with_capacity(INTERVALS.len());

    for (name, count) in INTERVALS {
        let value = remaining / count;
        if value == 0 {
            continue;
        }
        remaining -= value * count;
        let name = if value == 1 {
            name.trim_end_matches('s')
        } else {
            name
        };
        parts.push(format!("{value} {name}"));
    }

    parts.truncate(granularity);
    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity_caps_units() {
        assert_eq!(display_time(3661, 2), "1 hour, 1 minute");
        assert_eq!(display_time(3661, 3), "1 hour, 1 minute, 1 second");
        assert_eq!(display_time(3661, 1), "1 hour");
    }

    #[test]
    fn test_plural_only_when_not_one() {
        assert_eq!(display_time(2, 4), "2 seconds");
        assert_eq!(display_time(60, 4), "1 minute");
        assert_eq!(display_time(120, 4), "2 minutes");
        assert_eq!(display_time(86_400 * 8, 4), "1 week, 1 day");
    }

    #[test]
    fn test_zero_units_are_skipped() {
        // 1 week + 5 seconds: days/hours/minutes are absent, not "0 days".
        assert_eq!(display_time(604_805, 4), "1 week, 5 seconds");
    }

    #[test]
    fn test_zero_seconds_is_empty() {
        assert_eq!(display_time(0, 4), "");
    }

    #[test]
    fn test_zero_granularity_is_empty() {
        assert_eq!(display_time(3661, 0), "");
    }

    #[test]
    fn test_never_exceeds_granularity() {
        for secs in [0u64, 1, 59, 61, 3_599, 3_601, 90_061, 694_861, 10_000_000] {
            for g in 0..6 {
                let shown = display_time(secs, g);
                let units = if shown.is_empty() {
                    0
                } else {
                    shown.split(", ").count()
                };
                assert!(units <= g, "{secs}s g={g} -> {shown:?}");
            }
        }
    }
}
