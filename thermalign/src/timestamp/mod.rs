//! Capture timestamps encoded in sensor file names.
//!
//! Both sensors name their files `<tag><yy><MM><dd><hh><mm>...`, e.g.
//! `m201017020400594_336x252_14bit.thermal.celsius.csv` was captured on
//! 2020-10-17 02:04. The layout is described by [`TimestampFormat`] so that a
//! different tag length or field order only needs a configuration change.
//!
//! The two-digit year is expanded with a fixed century (`20` by default). Names
//! written after 2099 will decode into the wrong century; this is a limitation
//! of the naming scheme, not something the decoder tries to guess around.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};


/// Layout of the timestamp embedded in a file name.
///
/// Field offsets are relative to the end of the sensor tag and every field is
/// exactly two ASCII digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampFormat {
    /// Length of the sensor-type prefix preceding the date fields.
    pub tag_len: usize,
    /// Century prepended to the two-digit year (20 => 20yy).
    pub century: u32,
    pub year_offset: usize,
    pub month_offset: usize,
    pub day_offset: usize,
    pub hour_offset: usize,
    pub minute_offset: usize,
    /// Minimum length of the base name (extension stripped).
    pub min_base_len: usize,
    /// Number of characters after the tag used to group candidate files.
    pub group_key_len: usize,
}

impl Default for TimestampFormat {
    fn default() -> Self {
        Self {
            tag_len: 1,
            century: 20,
            year_offset: 0,
            month_offset: 2,
            day_offset: 4,
            hour_offset: 6,
            minute_offset: 8,
            min_base_len: 12,
            group_key_len: 4,
        }
    }
}

/// A capture time with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureTimestamp(NaiveDateTime);

impl CaptureTimestamp {
    pub fn new(datetime: NaiveDateTime) -> Self {
        Self(datetime)
    }

    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// Absolute distance between two capture times.
    pub fn abs_delta(&self, other: &CaptureTimestamp) -> TimeDelta {
        (self.0 - other.0).abs()
    }
}

impl std::fmt::Display for CaptureTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

/// Strips everything from the first `.` on.
pub fn base_name(file_name: &str) -> &str {
    match file_name.find('.') {
        Some(pos) => &file_name[..pos],
        None => file_name,
    }
}

impl TimestampFormat {
    /// Decodes the capture time from a file name.
    ///
    /// Returns `None` for names that are too short, contain non-digit
    /// characters in a date field, or encode an impossible calendar value.
    pub fn parse(&self, file_name: &str) -> Option<CaptureTimestamp> {
        let base = base_name(file_name);
        if base.len() < self.min_base_len {
            return None;
        }

        let year = self
            .century
            .checked_mul(100)?
            .checked_add(self.field(base, self.year_offset)?)?;
        let month = self.field(base, self.month_offset)?;
        let day = self.field(base, self.day_offset)?;
        let hour = self.field(base, self.hour_offset)?;
        let minute = self.field(base, self.minute_offset)?;

        let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
        let datetime = date.and_hms_opt(hour, minute, 0)?;
        Some(CaptureTimestamp(datetime))
    }

    /// Grouping key shared by files captured in the same period, independent of
    /// the sensor tag (year and month digits with the default layout).
    pub fn group_key<'a>(&self, file_name: &'a str) -> Option<&'a str> {
        let base = base_name(file_name);
        let key = base.get(self.tag_len..self.tag_len + self.group_key_len)?;
        if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(key)
    }

    fn field(&self, base: &str, offset: usize) -> Option<u32> {
        let start = self.tag_len + offset;
        let digits = base.as_bytes().get(start..start + 2)?;
        if !digits.iter().all(u8::is_ascii_digit) {
            return None;
        }
        Some(u32::from(digits[0] - b'0') * 10 + u32::from(digits[1] - b'0'))
    }
}

/// Decodes a file name with the default layout.
pub fn parse(file_name: &str) -> Option<CaptureTimestamp> {
    TimestampFormat::default().parse(file_name)
}
