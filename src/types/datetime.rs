use chrono::{Datelike, Timelike};
use serde::Serialize;

use crate::{EncodingResult, Error};

/// 100 ns ticks since 1601-01-01T00:00:00 UTC, signed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct DateTime(pub i64);

/// Offset of the unix epoch from the 1601 epoch, in ticks.
pub const UNIX_EPOCH_TICKS: i64 = 11_644_473_600 * TICKS_PER_SEC;
pub const TICKS_PER_SEC: i64 = 10_000_000;
pub const TICKS_PER_MSEC: i64 = 10_000;

impl DateTime {
    pub fn from_unix_parts(unix_secs: i64, millis: u32) -> DateTime {
        DateTime(unix_secs * TICKS_PER_SEC + UNIX_EPOCH_TICKS + millis as i64 * TICKS_PER_MSEC)
    }

    fn to_civil(self) -> Option<chrono::DateTime<chrono::Utc>> {
        let unix_ticks = self.0 - UNIX_EPOCH_TICKS;
        let secs = unix_ticks.div_euclid(TICKS_PER_SEC);
        let nanos = (unix_ticks.rem_euclid(TICKS_PER_SEC) * 100) as u32;
        chrono::DateTime::from_timestamp(secs, nanos)
    }

    /// `YYYY-MM-DDTHH:MM:SS.mmmZ`, millisecond precision, always 24 chars.
    pub fn to_iso8601(self) -> EncodingResult<String> {
        let t = self.to_civil().ok_or(Error::Encoding)?;
        Ok(format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second(),
            t.nanosecond() / 1_000_000,
        ))
    }

    /// Accepts the millisecond form (24 chars) and the bare-seconds form
    /// (20 chars, trailing `Z`).
    pub fn parse_iso8601(input: &str) -> EncodingResult<DateTime> {
        let b = input.as_bytes();
        if b.len() != 20 && b.len() != 24 {
            return Err(Error::Decoding);
        }
        if b[4] != b'-'
            || b[7] != b'-'
            || b[10] != b'T'
            || b[13] != b':'
            || b[16] != b':'
            || !(b[19] == b'Z' || b[19] == b'.')
        {
            return Err(Error::Decoding);
        }
        if b.len() == 24 && b[23] != b'Z' {
            return Err(Error::Decoding);
        }
        let field = |range: std::ops::Range<usize>| -> EncodingResult<u32> {
            let text = &input[range];
            if !text.bytes().all(|c| c.is_ascii_digit()) {
                return Err(Error::Decoding);
            }
            text.parse().map_err(|_| Error::Decoding)
        };
        let year = field(0..4)?;
        let month = field(5..7)?;
        let day = field(8..10)?;
        let hour = field(11..13)?;
        let min = field(14..16)?;
        let sec = field(17..19)?;
        let millis = if b.len() == 24 { field(20..23)? } else { 0 };

        let date = chrono::NaiveDate::from_ymd_opt(year as i32, month, day)
            .ok_or(Error::Decoding)?;
        let time = date
            .and_hms_milli_opt(hour, min, sec, millis)
            .ok_or(Error::Decoding)?;
        Ok(DateTime::from_unix_parts(time.and_utc().timestamp(), millis))
    }
}
