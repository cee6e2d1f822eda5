//! Post timestamps: the feed speaks `YYYY-MM-DD HH:MM:SS` in a fixed UTC+8
//! offset, users speak `/DD`.

use chrono::{Datelike, NaiveDateTime};
use serde::Deserializer;

use super::*;

const PTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NEWS_UTC_OFFSET_SECS: i32 = 8 * 60 * 60;
const NULL_PTIME: &str = "null";
const UNKNOWN_DAY: &str = "/--";

#[derive(Debug, thiserror::Error)]
pub(crate) enum TimeError {
    #[error("invalid post time {text:?}: {source}")]
    Timestamp {
        text: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("invalid post time {0:?}: expected YYYY-MM-DD HH:MM:SS")]
    Layout(String),
    #[error("post time {0:?} does not exist in UTC+8")]
    Ambiguous(String),
    #[error("invalid day token {0:?}")]
    DayToken(String),
    #[error("invalid UTC offset {0}s")]
    Offset(i32),
}

pub(crate) fn news_offset() -> Result<FixedOffset, TimeError> {
    FixedOffset::east_opt(NEWS_UTC_OFFSET_SECS).ok_or(TimeError::Offset(NEWS_UTC_OFFSET_SECS))
}

/// A literal `null` is not an error, it just means the post has no time.
pub(crate) fn parse_ptime(text: &str) -> Result<Option<DateTime<FixedOffset>>, TimeError> {
    if text == NULL_PTIME {
        return Ok(None);
    }
    if !matches_ptime_layout(text) {
        return Err(TimeError::Layout(text.to_string()));
    }
    let naive = NaiveDateTime::parse_from_str(text, PTIME_FORMAT).map_err(|source| {
        TimeError::Timestamp {
            text: text.to_string(),
            source,
        }
    })?;
    let local = naive
        .and_local_timezone(news_offset()?)
        .single()
        .ok_or_else(|| TimeError::Ambiguous(text.to_string()))?;
    Ok(Some(local))
}

/// chrono accepts unpadded fields and leading spaces; the feed never sends
/// them, so anything but the exact zero-padded layout is rejected up front.
fn matches_ptime_layout(text: &str) -> bool {
    const LAYOUT: &[u8; 19] = b"dddd-dd-dd dd:dd:dd";
    text.len() == LAYOUT.len()
        && text.bytes().zip(LAYOUT.iter()).all(|(b, &l)| match l {
            b'd' => b.is_ascii_digit(),
            sep => b == sep,
        })
}

/// Renders the day-of-month token users type back to request a post.
pub(crate) fn format_day(created_at: Option<&DateTime<FixedOffset>>) -> String {
    match created_at {
        Some(t) => t.format("/%d").to_string(),
        None => UNKNOWN_DAY.to_string(),
    }
}

/// Accepts exactly `/DD` for days 1 through 31.
pub(crate) fn parse_day_token(text: &str) -> Result<u32, TimeError> {
    let invalid = || TimeError::DayToken(text.to_string());
    let digits = text.strip_prefix('/').ok_or_else(invalid)?;
    if digits.len() != 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let day: u32 = digits.parse().map_err(|_| invalid())?;
    if !(1..=31).contains(&day) {
        return Err(invalid());
    }
    Ok(day)
}

pub(crate) fn day_of_month(created_at: Option<&DateTime<FixedOffset>>) -> Option<u32> {
    created_at.map(|t| t.day())
}

pub(crate) fn deserialize_ptime<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(text) => parse_ptime(&text).map_err(serde::de::Error::custom),
        None => Ok(None),
    }
}
