//! Whole-number rendering

use crate::model::RawRecord;
use crate::model::TimeZoneDefinition;

const MINUTES_PER_HOUR: i64 = 60;
const MINUTES_PER_DAY: i64 = 24 * MINUTES_PER_HOUR;

/// Integer attribute formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WholeNumberFormat {
    /// Plain number.
    None,
    /// Minutes, rendered as minutes, hours or days.
    Duration,
    /// Time zone code.
    TimeZone,
    /// Language code.
    Language,
    /// Locale code.
    Locale,
}

impl WholeNumberFormat {
    /// Reads a metadata format name; unknown names are plain numbers.
    pub fn parse(format: Option<&str>) -> Self {
        match format.map(str::to_ascii_lowercase).as_deref() {
            Some("duration") => Self::Duration,
            Some("timezone") => Self::TimeZone,
            Some("language") => Self::Language,
            Some("locale") => Self::Locale,
            _ => Self::None,
        }
    }
}

/// Renders the whole-number value stored under `key`.
///
/// Durations and time zones are rendered here; everything else uses the
/// platform's formatted value, then the raw number. A null or missing value
/// renders as an empty string.
pub fn render_whole_number(
    format: Option<&str>,
    record: &RawRecord,
    key: &str,
    timezones: &[TimeZoneDefinition],
) -> String {
    let Some(value) = record.raw_value(key).filter(|v| !v.is_null()) else {
        return String::new();
    };

    let rendered = match WholeNumberFormat::parse(format) {
        WholeNumberFormat::Duration => value.as_i64().map(format_duration),
        WholeNumberFormat::TimeZone => value.as_i64().and_then(|code| {
            timezones
                .iter()
                .find(|tz| i64::from(tz.code) == code)
                .map(|tz| tz.user_interface_name.clone())
        }),
        WholeNumberFormat::Language | WholeNumberFormat::Locale | WholeNumberFormat::None => None,
    };

    rendered
        .or_else(|| record.formatted_value(key).map(str::to_string))
        .or_else(|| record.raw_text(key))
        .unwrap_or_default()
}

/// Formats a number of minutes the way duration fields display.
pub fn format_duration(minutes: i64) -> String {
    let (amount, unit) = match minutes.unsigned_abs() {
        m if m < MINUTES_PER_HOUR as u64 => (minutes as f64, "minute"),
        m if m < MINUTES_PER_DAY as u64 => (minutes as f64 / MINUTES_PER_HOUR as f64, "hour"),
        _ => (minutes as f64 / MINUTES_PER_DAY as f64, "day"),
    };

    let text = trim_decimals(amount);
    let plural = if amount.abs() == 1.0 { "" } else { "s" };
    format!("{} {}{}", text, unit, plural)
}

fn trim_decimals(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0 minutes");
        assert_eq!(format_duration(1), "1 minute");
        assert_eq!(format_duration(45), "45 minutes");
        assert_eq!(format_duration(60), "1 hour");
        assert_eq!(format_duration(90), "1.5 hours");
        assert_eq!(format_duration(600), "10 hours");
        assert_eq!(format_duration(1440), "1 day");
        assert_eq!(format_duration(2000), "1.39 days");
    }

    #[test]
    fn test_format_duration_negative_and_extreme() {
        assert_eq!(format_duration(-90), "-1.5 hours");
        assert_eq!(format_duration(-1), "-1 minute");
        assert!(format_duration(i64::MIN).ends_with(" days"));
        assert!(format_duration(i64::MAX).ends_with(" days"));
    }

    #[test]
    fn test_time_zone_lookup() {
        let timezones = vec![
            TimeZoneDefinition::new(4, "(GMT-08:00) Pacific Time (US & Canada)"),
            TimeZoneDefinition::new(85, "(GMT+00:00) Dublin, Edinburgh, Lisbon, London"),
        ];
        let record = RawRecord::new().set("timezoneruleversionnumber", 85).set("unknown", 999);

        assert_eq!(
            render_whole_number(Some("TimeZone"), &record, "timezoneruleversionnumber", &timezones),
            "(GMT+00:00) Dublin, Edinburgh, Lisbon, London"
        );
        assert_eq!(render_whole_number(Some("TimeZone"), &record, "unknown", &timezones), "999");
    }

    #[test]
    fn test_plain_numbers_prefer_formatted_value() {
        let record = RawRecord::new()
            .set("numberofemployees", 1200)
            .set_formatted("numberofemployees", "1,200")
            .set("plain", 7)
            .set("nothing", serde_json::Value::Null);

        assert_eq!(render_whole_number(None, &record, "numberofemployees", &[]), "1,200");
        assert_eq!(render_whole_number(Some("None"), &record, "plain", &[]), "7");
        assert_eq!(render_whole_number(Some("Duration"), &record, "nothing", &[]), "");
        assert_eq!(render_whole_number(None, &record, "missing", &[]), "");
    }
}
