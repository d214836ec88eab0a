// Display helpers for legend rows and chart labels
use chrono::DateTime;
use rust_decimal::Decimal;

/// Signed percentage, e.g. `+12.35%`
pub fn format_percent(value: f64, decimals: usize) -> String {
    let sign = if value >= 0.0 { "+" } else { "" };
    format!("{}{:.*}%", sign, decimals, value)
}

/// Compact magnitude with B/M/K suffix
pub fn format_compact(value: f64, decimals: usize) -> String {
    let abs = value.abs();
    if abs >= 1e9 {
        format!("{:.*}B", decimals, value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.*}M", decimals, value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.*}K", decimals, value / 1e3)
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// US dollar amount with thousands separators, e.g. `$1,234.57`
pub fn format_currency(value: Decimal) -> String {
    let rounded = value.round_dp(2);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let digits = format!("{:.2}", rounded.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));

    format!("{}${}.{}", sign, group_thousands(whole), cents)
}

fn group_thousands(whole: &str) -> String {
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Human label for a chart window: `30 Days`, `3 Months`, `1 Year`
pub fn format_time_period(days: u32) -> String {
    if days >= 365 {
        plural(days / 365, "Year")
    } else if days >= 60 {
        plural(days / 30, "Month")
    } else {
        plural(days, "Day")
    }
}

fn plural(count: u32, unit: &str) -> String {
    if count == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", count, unit)
    }
}

/// Axis tick label (`Jan 5`), in UTC
pub fn format_date(timestamp_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.format("%b %-d").to_string())
}

/// Legend text colour for a total performance value
pub fn performance_color(percent: f64) -> &'static str {
    if percent > 10.0 {
        "#00ff00"
    } else if percent > 0.0 {
        "#66ff66"
    } else if percent < -10.0 {
        "#ff0000"
    } else if percent < 0.0 {
        "#ff6666"
    } else {
        "#ffff00"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(12.345, 2), "+12.35%");
        assert_eq!(format_percent(-3.1, 2), "-3.10%");
        assert_eq!(format_percent(0.0, 1), "+0.0%");
    }

    #[test]
    fn test_format_compact() {
        assert_eq!(format_compact(1_234_000_000.0, 2), "1.23B");
        assert_eq!(format_compact(4_500_000.0, 2), "4.50M");
        assert_eq!(format_compact(7_000.0, 2), "7.00K");
        assert_eq!(format_compact(12.0, 2), "12.00");
        assert_eq!(format_compact(-2_500_000.0, 1), "-2.5M");
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(Decimal::from_str("1234.567").unwrap()), "$1,234.57");
        assert_eq!(format_currency(Decimal::from_str("0.5").unwrap()), "$0.50");
        assert_eq!(format_currency(Decimal::from(1_000_000)), "$1,000,000.00");
        assert_eq!(format_currency(Decimal::from_str("-42.1").unwrap()), "-$42.10");
        assert_eq!(format_currency(Decimal::from(999)), "$999.00");
    }

    #[test]
    fn test_format_time_period() {
        assert_eq!(format_time_period(30), "30 Days");
        assert_eq!(format_time_period(1), "1 Day");
        assert_eq!(format_time_period(90), "3 Months");
        assert_eq!(format_time_period(180), "6 Months");
        assert_eq!(format_time_period(365), "1 Year");
        assert_eq!(format_time_period(730), "2 Years");
    }

    #[test]
    fn test_format_date() {
        // 2024-01-05T12:00:00Z
        assert_eq!(format_date(1_704_456_000_000).as_deref(), Some("Jan 5"));
        assert_eq!(format_date(i64::MAX), None);
    }

    #[test]
    fn test_performance_color() {
        assert_eq!(performance_color(25.0), "#00ff00");
        assert_eq!(performance_color(3.0), "#66ff66");
        assert_eq!(performance_color(0.0), "#ffff00");
        assert_eq!(performance_color(-4.0), "#ff6666");
        assert_eq!(performance_color(-40.0), "#ff0000");
    }
}
