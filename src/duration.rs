// duration.rs — Free-form duration phrase parsing ("1 hour 20 minutes" → 4800).
// Anki renders studied time as human prose, so this scans for every
// <amount><unit> pair in the text and sums them.

use regex::Regex;

/// Amount + unit token. Unit families: hours (`hours?|hrs?|hr|h`),
/// minutes (`minutes?|mins?|min|m`), seconds (`seconds?|secs?|sec|s`).
const DURATION_PATTERN: &str =
    r"(?i)([0-9]+(?:\.[0-9]+)?)\s*(hours?|hrs?|hr|h|minutes?|mins?|min|m|seconds?|secs?|sec|s)";

/// Parse a free-form duration phrase into total seconds.
///
/// Every match in the input contributes to the total ("2h 5m 10s" = 7510).
/// The unit is classified by its leading character: `h` → hours, `m` →
/// minutes, anything else → seconds. That leading-char rule is intentional
/// and load-bearing: a token like "hz" reads as hours. Unparsable numeric
/// literals are skipped, never fatal. Returns 0.0 when nothing matches.
pub fn parse_duration(input: &str) -> f64 {
    let Ok(re) = Regex::new(DURATION_PATTERN) else {
        return 0.0;
    };

    let mut total = 0.0;

    for caps in re.captures_iter(input) {
        let (Some(amount), Some(unit)) = (caps.get(1), caps.get(2)) else {
            continue;
        };

        let Ok(amount) = amount.as_str().parse::<f64>() else {
            continue;
        };

        let unit = unit.as_str().to_lowercase();
        if unit.starts_with('h') {
            total += amount * 3600.0;
        } else if unit.starts_with('m') {
            total += amount * 60.0;
        } else {
            total += amount;
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours_and_minutes() {
        assert_eq!(parse_duration("1 hour 30 minutes"), 5400.0);
    }

    #[test]
    fn test_minutes_only() {
        assert_eq!(parse_duration("45 min"), 2700.0);
    }

    #[test]
    fn test_compact_seconds() {
        assert_eq!(parse_duration("90s"), 90.0);
    }

    #[test]
    fn test_mixed_compact() {
        assert_eq!(parse_duration("2h 5m 10s"), 7510.0);
    }

    #[test]
    fn test_fractional_amounts() {
        assert_eq!(parse_duration("1.5 hours"), 5400.0);
        assert_eq!(parse_duration("0.5m"), 30.0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(parse_duration(""), 0.0);
    }

    #[test]
    fn test_no_duration() {
        assert_eq!(parse_duration("no duration here"), 0.0);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(parse_duration("1 HOUR 10 Minutes"), 4200.0);
    }

    #[test]
    fn test_leading_char_unit_rule() {
        // Any token starting with 'h' is hours, 'm' is minutes. "hz" is a
        // nonsense unit but still reads as hours under this rule.
        assert_eq!(parse_duration("5 hz"), 18000.0);
        assert_eq!(parse_duration("3 moments"), 180.0);
    }

    #[test]
    fn test_all_matches_contribute() {
        // The scan never stops at the first match.
        assert_eq!(parse_duration("Studied 1 hour before lunch and 30 minutes after"), 5400.0);
    }
}
