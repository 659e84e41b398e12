//! Timezone in which date serials are read when they are converted to or
//! from Unix timestamps.

use std::{fmt, str::FromStr};

use chrono::Utc;
use gridcalc_common::{Calendar, excel_to_unix_in, unix_to_excel_in};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported timezone `{0}`")]
pub struct TimeZoneParseError(pub String);

/// `Utc` unless configured otherwise. Named zones are IANA `Area/Location`
/// identifiers; the `Etc/` offset aliases are not accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum TimeZoneSpec {
    #[default]
    Utc,
    #[cfg(feature = "chrono-tz")]
    Named(chrono_tz::Tz),
}

impl TimeZoneSpec {
    pub fn name(&self) -> &str {
        match self {
            TimeZoneSpec::Utc => "UTC",
            #[cfg(feature = "chrono-tz")]
            TimeZoneSpec::Named(tz) => tz.name(),
        }
    }

    /// Unix seconds of a serial read as wall-clock time in this zone.
    pub fn serial_to_unix(&self, serial: f64, calendar: Calendar) -> i64 {
        match self {
            TimeZoneSpec::Utc => excel_to_unix_in(serial, calendar, &Utc),
            #[cfg(feature = "chrono-tz")]
            TimeZoneSpec::Named(tz) => excel_to_unix_in(serial, calendar, tz),
        }
    }

    /// Serial of the wall-clock time in this zone at a Unix instant.
    pub fn unix_to_serial(&self, timestamp: i64, calendar: Calendar) -> f64 {
        match self {
            TimeZoneSpec::Utc => unix_to_excel_in(timestamp, calendar, &Utc),
            #[cfg(feature = "chrono-tz")]
            TimeZoneSpec::Named(tz) => unix_to_excel_in(timestamp, calendar, tz),
        }
    }
}

impl FromStr for TimeZoneSpec {
    type Err = TimeZoneParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        if name.eq_ignore_ascii_case("UTC") {
            return Ok(TimeZoneSpec::Utc);
        }
        #[cfg(feature = "chrono-tz")]
        if name.contains('/')
            && !name.starts_with("Etc/")
            && let Ok(tz) = name.parse::<chrono_tz::Tz>()
        {
            return Ok(TimeZoneSpec::Named(tz));
        }
        Err(TimeZoneParseError(s.to_string()))
    }
}

impl fmt::Display for TimeZoneSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for TimeZoneSpec {
    type Error = TimeZoneParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeZoneSpec> for String {
    fn from(value: TimeZoneSpec) -> Self {
        value.name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_is_the_default_and_leaves_serials_alone() {
        let utc = TimeZoneSpec::default();
        assert_eq!(utc.to_string(), "UTC");
        assert_eq!("utc".parse::<TimeZoneSpec>(), Ok(TimeZoneSpec::Utc));
        assert_eq!(utc.serial_to_unix(40939.0, Calendar::Windows1900), 1_327_968_000);
        assert_eq!(utc.unix_to_serial(1_327_968_000, Calendar::Windows1900), 40939.0);
    }

    #[test]
    fn offset_aliases_and_junk_are_rejected() {
        for name in ["Etc/GMT+10", "Etc/UTC", "Mars/Olympus_Mons", "", "EST"] {
            assert!(name.parse::<TimeZoneSpec>().is_err(), "{name}");
        }
    }

    #[cfg(feature = "chrono-tz")]
    #[test]
    fn iana_zones_are_accepted() {
        for name in [
            "Europe/Prague",
            "Asia/Tokyo",
            "America/Indiana/Indianapolis",
            "Pacific/Honolulu",
            "Atlantic/St_Helena",
        ] {
            let tz: TimeZoneSpec = name.parse().unwrap();
            assert_eq!(tz.name(), name);
        }
    }

    #[cfg(feature = "chrono-tz")]
    #[test]
    fn named_zones_shift_by_the_offset_in_force() {
        let cal = Calendar::Windows1900;
        let tokyo: TimeZoneSpec = "Asia/Tokyo".parse().unwrap();
        // 2012-01-31 00:00 in Tokyo is 15:00 UTC the day before
        assert_eq!(tokyo.serial_to_unix(40939.0, cal), 1_327_968_000 - 9 * 3600);
        assert_eq!(tokyo.unix_to_serial(1_327_968_000 - 9 * 3600, cal), 40939.0);

        let prague: TimeZoneSpec = "Europe/Prague".parse().unwrap();
        // winter is UTC+1, summer UTC+2: 2012-01-31 and 2012-07-31
        assert_eq!(prague.serial_to_unix(40939.0, cal), 1_327_968_000 - 3600);
        assert_eq!(prague.serial_to_unix(41121.0, cal), 1_343_692_800 - 7200);
        // a time of day is never shifted
        assert_eq!(prague.serial_to_unix(0.5, cal), 43_200);
    }
}
