//! Relative time formatting ("3 minutes ago", "in about 2 hours")

use chrono::{DateTime, Utc};

const MINUTES_IN_DAY: i64 = 1440;
const MINUTES_IN_MONTH: i64 = 43_200;
const MINUTES_IN_TWO_MONTHS: i64 = 86_400;

/// Distance between two instants in words, without suffix
pub fn format_distance(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let seconds = (to - from).num_seconds().abs();
    let minutes = (seconds as f64 / 60.0).round() as i64;

    if minutes < 2 {
        return if seconds < 30 {
            "less than a minute".to_string()
        } else {
            "1 minute".to_string()
        };
    }

    if minutes < 45 {
        return format!("{} minutes", minutes);
    }

    if minutes < 90 {
        return "about 1 hour".to_string();
    }

    if minutes < MINUTES_IN_DAY {
        let hours = (minutes as f64 / 60.0).round() as i64;
        return format!("about {} hours", hours);
    }

    if minutes < 2520 {
        return "1 day".to_string();
    }

    if minutes < MINUTES_IN_MONTH {
        let days = (minutes as f64 / MINUTES_IN_DAY as f64).round() as i64;
        return format!("{} days", days);
    }

    if minutes < MINUTES_IN_TWO_MONTHS {
        let months = (minutes as f64 / MINUTES_IN_MONTH as f64).round() as i64;
        return format!("about {} month{}", months, if months == 1 { "" } else { "s" });
    }

    let months = minutes / MINUTES_IN_MONTH;
    if months < 12 {
        return format!("{} months", months);
    }

    let years = months / 12;
    let remainder = months % 12;
    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if remainder < 3 {
        format!("about {} year{}", years, plural(years))
    } else if remainder < 9 {
        format!("over {} year{}", years, plural(years))
    } else {
        format!("almost {} years", years + 1)
    }
}

/// Distance from `now` to `instant` with direction, e.g. "5 minutes ago"
pub fn format_relative(instant: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let distance = format_distance(instant, now);
    if instant > now {
        format!("in {}", distance)
    } else {
        format!("{} ago", distance)
    }
}
