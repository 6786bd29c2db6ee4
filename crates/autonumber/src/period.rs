use core::{fmt, str::FromStr};

use chrono::{Datelike, Days, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use serde::{Deserialize, Serialize};

use crate::Error;

/// The calendar unit a sequence restarts on.
///
/// A field configured with `period: "year"` gets an independent counter for
/// every calendar year, `"month"` for every calendar month, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Year,
    Month,
    Day,
    Hour,
    Minute,
}

impl Granularity {
    /// Truncates `date` to the start of the bucket that contains it.
    ///
    /// Every calendar field finer than `self` is reset to its minimum: month
    /// to January, day to the 1st, hour, minute and second to zero. The input
    /// is interpreted as local calendar fields, never as an absolute instant.
    ///
    /// # Example
    ///
    /// ```
    /// use autonumber::Granularity;
    /// use chrono::NaiveDate;
    ///
    /// let date = NaiveDate::from_ymd_opt(2019, 1, 15)
    ///     .unwrap()
    ///     .and_hms_opt(10, 30, 0)
    ///     .unwrap();
    /// let start = NaiveDate::from_ymd_opt(2019, 1, 1)
    ///     .unwrap()
    ///     .and_hms_opt(0, 0, 0)
    ///     .unwrap();
    /// assert_eq!(Granularity::Year.bucket_start(date), start);
    /// ```
    pub fn bucket_start(self, date: NaiveDateTime) -> NaiveDateTime {
        let day = date.date();
        let seconds = date.time().num_seconds_from_midnight();

        match self {
            Self::Year => (day - Days::new(u64::from(day.ordinal0()))).and_time(NaiveTime::MIN),
            Self::Month => (day - Days::new(u64::from(day.day0()))).and_time(NaiveTime::MIN),
            Self::Day => day.and_time(NaiveTime::MIN),
            Self::Hour => day.and_time(since_midnight(seconds - seconds % 3_600)),
            Self::Minute => day.and_time(since_midnight(seconds - seconds % 60)),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Year => "year",
            Self::Month => "month",
            Self::Day => "day",
            Self::Hour => "hour",
            Self::Minute => "minute",
        }
    }
}

#[inline]
fn since_midnight(seconds: u32) -> NaiveTime {
    NaiveTime::MIN + TimeDelta::seconds(i64::from(seconds))
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "year" => Ok(Self::Year),
            "month" => Ok(Self::Month),
            "day" => Ok(Self::Day),
            "hour" => Ok(Self::Hour),
            "minute" => Ok(Self::Minute),
            other => Err(Error::config(format!(
                "unsupported period `{other}` (expected year, month, day, hour or minute)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn year_truncates_to_january_first() {
        assert_eq!(
            Granularity::Year.bucket_start(at(2019, 1, 15, 10, 30, 0)),
            at(2019, 1, 1, 0, 0, 0)
        );
        assert_eq!(
            Granularity::Year.bucket_start(at(2020, 12, 31, 23, 59, 59)),
            at(2020, 1, 1, 0, 0, 0)
        );
    }

    #[test]
    fn month_truncates_to_first_of_month() {
        assert_eq!(
            Granularity::Month.bucket_start(at(2019, 6, 1, 0, 0, 0)),
            at(2019, 6, 1, 0, 0, 0)
        );
        assert_eq!(
            Granularity::Month.bucket_start(at(2024, 2, 29, 13, 1, 2)),
            at(2024, 2, 1, 0, 0, 0)
        );
    }

    #[test]
    fn finer_granularities_keep_coarser_fields() {
        let date = at(2021, 7, 9, 17, 42, 31);
        assert_eq!(Granularity::Day.bucket_start(date), at(2021, 7, 9, 0, 0, 0));
        assert_eq!(Granularity::Hour.bucket_start(date), at(2021, 7, 9, 17, 0, 0));
        assert_eq!(
            Granularity::Minute.bucket_start(date),
            at(2021, 7, 9, 17, 42, 0)
        );
    }

    #[test]
    fn sub_second_precision_is_dropped() {
        let date = at(2021, 7, 9, 17, 42, 31) + TimeDelta::milliseconds(250);
        assert_eq!(
            Granularity::Minute.bucket_start(date),
            at(2021, 7, 9, 17, 42, 0)
        );
    }

    #[test]
    fn different_years_land_in_different_buckets() {
        let a = Granularity::Year.bucket_start(at(2019, 1, 1, 0, 0, 0));
        let b = Granularity::Year.bucket_start(at(2020, 1, 1, 0, 0, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn parses_known_names_only() {
        assert_eq!("hour".parse::<Granularity>().unwrap(), Granularity::Hour);
        assert!(matches!(
            "week".parse::<Granularity>(),
            Err(Error::Config { .. })
        ));
    }
}
