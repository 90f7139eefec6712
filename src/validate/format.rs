//! Date formats
//!
//! `dateFormat` keywords are written with .NET custom date tokens
//! (`yyyy-MM-dd`, `MM/dd/yyyy HH:mm`); they are translated once at schema
//! load into chrono format strings. Relative window bounds use the .NET
//! TimeSpan text form `[-][d.]hh:mm:ss[.fff]`.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

/// Translate a .NET custom date format into a chrono format string.
/// Strings already containing `%` are taken to be chrono formats.
pub(crate) fn translate_date_format(format: &str) -> String {
    if format.contains('%') {
        return format.to_string();
    }

    let chars: Vec<char> = format.chars().collect();
    let mut out = String::with_capacity(format.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // quoted literal text
        if c == '\'' || c == '"' {
            i += 1;
            while i < chars.len() && chars[i] != c {
                out.push(chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }
        if c == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        let token = match (c, run) {
            ('y', 1..=2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', 2) => Some("%d"),
            ('d', 3) => Some("%a"),
            ('d', _) => Some("%A"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', 1) => Some("%-M"),
            ('m', _) => Some("%M"),
            ('s', 1) => Some("%-S"),
            ('s', _) => Some("%S"),
            ('t', _) => Some("%p"),
            _ => None,
        };

        match token {
            Some(token) => out.push_str(token),
            None => {
                for _ in 0..run {
                    out.push(c);
                }
            }
        }
        i += run;
    }

    out
}

/// Parse a date against a chrono format. Date-only formats yield midnight.
pub(crate) fn parse_date(text: &str, format: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
        NaiveDate::parse_from_str(text, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })?;
    Some(naive.and_utc())
}

/// RFC 3339 date-time, the only named `format` checked
pub(crate) fn is_date_time(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
}

/// Parse a TimeSpan: `30` (days), `-30.00:00:00`, `01:30:00`, `1.12:00:00.5`
pub(crate) fn parse_relative_date(text: &str) -> Option<Duration> {
    let text = text.trim();
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let span = if !body.contains(':') {
        Duration::days(body.parse::<u32>().ok()?.into())
    } else {
        let mut parts = body.split(':');
        let head = parts.next()?;
        let (days, hours) = match head.split_once('.') {
            Some((days, hours)) => (days.parse::<u32>().ok()?, hours.parse::<u32>().ok()?),
            None => (0, head.parse::<u32>().ok()?),
        };
        let minutes = parts.next()?.parse::<u32>().ok()?;
        let seconds = match parts.next() {
            Some(seconds) => seconds.parse::<f64>().ok()?,
            None => 0.0,
        };
        if parts.next().is_some() || hours > 23 || minutes > 59 || !(0.0..60.0).contains(&seconds) {
            return None;
        }

        Duration::days(days.into())
            + Duration::hours(hours.into())
            + Duration::minutes(minutes.into())
            + Duration::milliseconds((seconds * 1000.0).round() as i64)
    };

    Some(if negative { -span } else { span })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_translate_common_formats() {
        assert_eq!(translate_date_format("yyyy-MM-dd"), "%Y-%m-%d");
        assert_eq!(translate_date_format("MM/dd/yyyy HH:mm"), "%m/%d/%Y %H:%M");
        assert_eq!(translate_date_format("M/d/yy h:mm tt"), "%-m/%-d/%y %-I:%M %p");
        assert_eq!(translate_date_format("dd MMMM yyyy"), "%d %B %Y");
        assert_eq!(translate_date_format("yyyy'T'HH"), "%YT%H");
        assert_eq!(translate_date_format("%Y-%m-%d"), "%Y-%m-%d");
    }

    #[test]
    fn test_parse_date_only_and_date_time() {
        let date = parse_date("2024-03-05", "%Y-%m-%d").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());

        let format = translate_date_format("MM/dd/yyyy HH:mm");
        let date = parse_date("03/05/2024 14:30", &format).unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap());

        assert!(parse_date("2024-13-40", "%Y-%m-%d").is_none());
        assert!(parse_date("yesterday", "%Y-%m-%d").is_none());
    }

    #[test]
    fn test_date_time_format() {
        assert!(is_date_time("2024-03-05T14:30:00Z"));
        assert!(is_date_time("2024-03-05T14:30:00.123+02:00"));
        assert!(!is_date_time("2024-03-05"));
    }

    #[test]
    fn test_parse_relative_date() {
        assert_eq!(parse_relative_date("30"), Some(Duration::days(30)));
        assert_eq!(parse_relative_date("-30.00:00:00"), Some(-Duration::days(30)));
        assert_eq!(
            parse_relative_date("01:30:00"),
            Some(Duration::minutes(90))
        );
        assert_eq!(
            parse_relative_date("1.12:00:00.5"),
            Some(Duration::hours(36) + Duration::milliseconds(500))
        );
        assert_eq!(parse_relative_date("25:00:00"), None);
        assert_eq!(parse_relative_date("soon"), None);
        assert_eq!(parse_relative_date("1:2:3:4"), None);
    }
}
