// src/readers/time.rs

use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

use super::{FnReader, TypeReaderRegistry};

/// `[d.]hh:mm[:ss[.fffffff]]`
static CANONICAL_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d+)\.)?(\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,7}))?)?$")
        .expect("canonical duration pattern is valid")
});

/// One `(number)(unit)` pair of a human duration such as `5 minutes`.
static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+(?:\.\d+)?)\s*([a-z]+)").expect("duration part pattern is valid")
});

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

fn unit_seconds(unit: &str) -> Option<f64> {
    let seconds = match unit.to_ascii_lowercase().as_str() {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 0.001,
        "s" | "sec" | "secs" | "second" | "seconds" => 1.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600.0,
        "d" | "day" | "days" => 86_400.0,
        "w" | "week" | "weeks" => 604_800.0,
        _ => return None,
    };
    Some(seconds)
}

/// Parses a canonical `00:05:30` duration or a human one like `5 minutes and 30 seconds`.
pub fn parse_duration(raw: &str) -> Result<Duration, String> {
    let trimmed = raw.trim();
    if let Some(duration) = parse_canonical(trimmed)? {
        return Ok(duration);
    }
    parse_human(trimmed)
}

fn parse_canonical(raw: &str) -> Result<Option<Duration>, String> {
    let Some(caps) = CANONICAL_DURATION.captures(raw) else {
        return Ok(None);
    };
    let number = |index: usize| -> Result<u64, String> {
        caps.get(index)
            .map(|m| {
                m.as_str()
                    .parse::<u64>()
                    .map_err(|_| format!("'{}' is out of range in '{}'", m.as_str(), raw))
            })
            .unwrap_or(Ok(0))
    };
    let (days, hours, minutes, seconds) = (number(1)?, number(2)?, number(3)?, number(4)?);
    if hours > 23 || minutes > 59 || seconds > 59 {
        return Err(format!("'{}' is not a valid time of day component", raw));
    }
    // Fractions carry up to seven digits (100ns ticks).
    let nanos = caps
        .get(5)
        .map(|m| {
            let digits = format!("{:0<9}", m.as_str());
            digits.parse::<u32>().unwrap_or(0)
        })
        .unwrap_or(0);
    let total = days
        .checked_mul(86_400)
        .and_then(|secs| secs.checked_add(hours * 3_600 + minutes * 60 + seconds))
        .ok_or_else(|| format!("'{}' is too long a duration", raw))?;
    Ok(Some(Duration::new(total, nanos)))
}

fn parse_human(raw: &str) -> Result<Duration, String> {
    let mut total_nanos = 0.0_f64;
    let mut matched = false;
    let mut last_end = 0;

    for caps in DURATION_PART.captures_iter(raw) {
        let (Some(whole), Some(amount), Some(unit)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        check_separator(&raw[last_end..whole.start()])?;
        last_end = whole.end();

        let amount: f64 = amount
            .as_str()
            .parse()
            .map_err(|_| format!("'{}' is not a number", amount.as_str()))?;
        let seconds = unit_seconds(unit.as_str())
            .ok_or_else(|| format!("unknown time unit '{}'", unit.as_str()))?;
        total_nanos += amount * seconds * NANOS_PER_SECOND;
        matched = true;
    }
    check_separator(&raw[last_end..])?;

    if !matched {
        return Err("expected a duration like '00:05:30' or '5 minutes'".to_string());
    }
    let total_nanos = total_nanos.round();
    if !total_nanos.is_finite() || total_nanos >= u64::MAX as f64 {
        return Err(format!("'{}' is too long a duration", raw));
    }
    Ok(Duration::from_nanos(total_nanos as u64))
}

fn check_separator(gap: &str) -> Result<(), String> {
    let gap = gap.trim().trim_start_matches(',').trim();
    if gap.is_empty() || gap.eq_ignore_ascii_case("and") {
        Ok(())
    } else {
        Err(format!("unexpected '{}' in duration", gap))
    }
}

pub fn parse_datetime_utc(raw: &str) -> Result<DateTime<Utc>, String> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc());
        }
    }
    parse_date(raw)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| "expected an RFC 3339 timestamp or 'YYYY-MM-DD[ HH:MM[:SS]]'".to_string())
}

pub fn parse_datetime_offset(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S %z"))
        .map_err(|e| format!("expected a timestamp with an offset ({})", e))
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| e.to_string())
}

pub(crate) fn install(registry: &TypeReaderRegistry) {
    registry.register(FnReader::new(parse_duration));
    registry.register(FnReader::new(parse_datetime_utc));
    registry.register(FnReader::new(parse_datetime_offset));
    registry.register(FnReader::new(parse_date));
}
