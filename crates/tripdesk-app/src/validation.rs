// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime, PrimitiveDateTime};

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";

/// Parses a delivery date. Accepts ISO dates and the day-first layouts
/// spreadsheets export in Spanish locales.
pub fn parse_required_date(input: &str) -> Option<Date> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = Date::parse(trimmed, &format_description!("[year]-[month]-[day]")) {
        return Some(value);
    }
    if let Ok(value) = Date::parse(trimmed, &format_description!("[day]/[month]/[year]")) {
        return Some(value);
    }
    if let Ok(value) = Date::parse(trimmed, &format_description!("[day]-[month]-[year]")) {
        return Some(value);
    }
    None
}

pub fn format_date(value: Date) -> String {
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "1970-01-01".to_owned())
}

pub fn format_datetime(value: OffsetDateTime) -> String {
    value
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_owned())
}

pub fn parse_datetime(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    if let Ok(value) = OffsetDateTime::parse(
        raw,
        &format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ) {
        return Ok(value);
    }

    if let Ok(value) = OffsetDateTime::parse(
        raw,
        &format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second][offset_hour sign:mandatory]:[offset_minute]"
        ),
    ) {
        return Ok(value);
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    ) {
        return Ok(value.assume_utc());
    }

    bail!("unsupported datetime format {raw:?}")
}

/// Human label for the time elapsed since `then`.
pub fn format_elapsed(now: OffsetDateTime, then: OffsetDateTime) -> String {
    let elapsed = now - then;
    if elapsed < Duration::minutes(1) {
        return "just now".to_owned();
    }
    if elapsed < Duration::hours(1) {
        return format!("{}m ago", elapsed.whole_minutes());
    }
    if elapsed < Duration::days(1) {
        return format!("{}h ago", elapsed.whole_hours());
    }
    format!("{}d ago", elapsed.whole_days())
}
