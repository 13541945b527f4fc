//! Parsing of human-readable fire times for scheduled posts
//!
//! Accepted forms, tried in order:
//! - relative durations: `30m`, `2h`, `1d 12h`, `in 2 hours`
//! - RFC 3339 timestamps: `2026-11-20T15:00:00Z`
//! - natural language: `tomorrow 10am`, `next monday 9:30`

use chrono::{DateTime, Duration, Utc};

use crate::error::{LinkcastError, Result};

/// Parse a schedule string relative to the current time
///
/// The resulting time must lie in the future.
pub fn parse_schedule(input: &str) -> Result<DateTime<Utc>> {
    parse_schedule_at(input, Utc::now())
}

/// Parse a schedule string relative to `now`
pub fn parse_schedule_at(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(LinkcastError::InvalidInput(
            "Schedule string cannot be empty".to_string(),
        ));
    }

    let fire_at = if let Some(duration) = parse_duration(input) {
        now.checked_add_signed(duration).ok_or_else(|| {
            LinkcastError::InvalidInput("Scheduled time is out of range".to_string())
        })?
    } else if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        dt.with_timezone(&Utc)
    } else {
        chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(
            |e| LinkcastError::InvalidInput(format!("Could not parse schedule '{}': {}", input, e)),
        )?
    };

    if fire_at <= now {
        return Err(LinkcastError::InvalidInput(format!(
            "Scheduled time must be in the future: {}",
            fire_at.to_rfc3339()
        )));
    }

    Ok(fire_at)
}

fn parse_duration(input: &str) -> Option<Duration> {
    let text = input.strip_prefix("in ").unwrap_or(input).trim();
    let std_duration = humantime::parse_duration(text).ok()?;
    Duration::from_std(std_duration).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_minutes() {
        let fire_at = parse_schedule_at("30m", fixed_now()).unwrap();
        assert_eq!(fire_at - fixed_now(), Duration::minutes(30));
    }

    #[test]
    fn test_parse_compound_duration() {
        let fire_at = parse_schedule_at("1d 12h", fixed_now()).unwrap();
        assert_eq!(fire_at - fixed_now(), Duration::hours(36));
    }

    #[test]
    fn test_parse_in_prefix() {
        let fire_at = parse_schedule_at("in 2 hours", fixed_now()).unwrap();
        assert_eq!(fire_at - fixed_now(), Duration::hours(2));
    }

    #[test]
    fn test_parse_huge_duration_is_rejected() {
        let result = parse_schedule_at("200000000 years", fixed_now());
        let err = result.unwrap_err();
        assert!(matches!(err, LinkcastError::InvalidInput(_)));
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_parse_rfc3339() {
        let fire_at = parse_schedule_at("2026-03-11T08:15:00Z", fixed_now()).unwrap();
        assert_eq!(fire_at, Utc.with_ymd_and_hms(2026, 3, 11, 8, 15, 0).unwrap());
    }

    #[test]
    fn test_parse_tomorrow() {
        let fire_at = parse_schedule_at("tomorrow", fixed_now()).unwrap();
        let diff = (fire_at - fixed_now()).num_hours();
        assert!((12..=36).contains(&diff), "Expected about a day, got {}h", diff);
    }

    #[test]
    fn test_parse_relative_to_wall_clock() {
        let fire_at = parse_schedule("2h").unwrap();
        let diff = (fire_at - Utc::now()).num_minutes();
        assert!((119..=120).contains(&diff), "Expected ~120 minutes, got {}", diff);
    }

    #[test]
    fn test_parse_empty_string() {
        assert!(matches!(
            parse_schedule_at("  ", fixed_now()),
            Err(LinkcastError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_schedule_at("not a time", fixed_now()).is_err());
    }

    #[test]
    fn test_past_time_is_rejected() {
        let result = parse_schedule_at("2020-01-01T00:00:00Z", fixed_now());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("must be in the future"));
    }
}
