use std::fmt;

/// Seconds since the epoch plus a nanosecond remainder. The remainder must
/// carry the same sign as `seconds` (spec §4.1) -- `Timestamp{-1, -500}`
/// means "500ns before -1s", not "500ns after -1s".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("nanoseconds {nanos} must have the same sign as seconds {seconds}")]
    SignMismatch { seconds: i64, nanos: i32 },
    #[error("nanoseconds {0} is out of the [-999999999, 999999999] range")]
    NanosOutOfRange(i32),
}

impl Timestamp {
    pub fn new(seconds: i64, nanos: i32) -> Result<Timestamp, TimestampError> {
        if nanos.abs() > 999_999_999 {
            return Err(TimestampError::NanosOutOfRange(nanos));
        }
        let signs_conflict = (seconds > 0 && nanos < 0) || (seconds < 0 && nanos > 0);
        if signs_conflict {
            return Err(TimestampError::SignMismatch { seconds, nanos });
        }
        Ok(Timestamp { seconds, nanos })
    }

    /// Parses `YYYY-MM-DD@HH:MM:SS[:NANOS]` or `T<sec>:<nanos>` (spec §4.1).
    pub fn parse(text: &str) -> Option<Timestamp> {
        if let Some(rest) = text.strip_prefix('T') {
            let (sec, nanos) = rest.split_once(':')?;
            let seconds: i64 = sec.parse().ok()?;
            let nanos: i32 = nanos.parse().ok()?;
            return Timestamp::new(seconds, nanos).ok();
        }

        let (date, time) = text.split_once('@')?;
        let mut date_parts = date.split('-');
        let year: i32 = date_parts.next()?.parse().ok()?;
        let month: u32 = date_parts.next()?.parse().ok()?;
        let day: u32 = date_parts.next()?.parse().ok()?;
        if date_parts.next().is_some() {
            return None;
        }

        let mut time_parts = time.split(':');
        let hour: u32 = time_parts.next()?.parse().ok()?;
        let minute: u32 = time_parts.next()?.parse().ok()?;
        let second: u32 = time_parts.next()?.parse().ok()?;
        let nanos: i64 = match time_parts.next() {
            Some(n) => n.parse().ok()?,
            None => 0,
        };
        if time_parts.next().is_some() {
            return None;
        }

        let date = time::Date::from_calendar_date(year, month_from_u32(month)?, day as u8).ok()?;
        let time = time::Time::from_hms(hour as u8, minute as u8, second as u8).ok()?;
        let datetime = time::PrimitiveDateTime::new(date, time).assume_utc();
        let seconds = datetime.unix_timestamp();

        Timestamp::new(seconds, nanos as i32).ok()
    }
}

fn month_from_u32(month: u32) -> Option<time::Month> {
    time::Month::try_from(month as u8).ok()
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}:{}", self.seconds, self.nanos)
    }
}
