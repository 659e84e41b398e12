//! Evaluation configuration threaded through every pass.
//!
//! A pass takes a snapshot of the [`EvalConfig`] when it starts, so changing
//! the configuration never affects an evaluation already in flight.

use std::{fmt, str::FromStr};

use gridcalc_common::Calendar;
use thiserror::Error;

use crate::locale::Locale;
use crate::timezone::TimeZoneSpec;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which spreadsheet's comparison rules the engine follows.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompatibilityMode {
    #[default]
    Excel,
    OpenOffice,
}

/// Shape of the value returned by date-producing functions.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnDateType {
    /// Serial number under the active calendar.
    #[default]
    ExcelSerial,
    /// Seconds since the Unix epoch.
    NumericSerial,
    /// `LiteralValue::DateTime`.
    NativeDateObject,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognised {what} `{value}`")]
pub struct ConfigParseError {
    what: &'static str,
    value: String,
}

impl FromStr for CompatibilityMode {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excel" => Ok(CompatibilityMode::Excel),
            "openoffice" | "open_office" | "libreoffice" => Ok(CompatibilityMode::OpenOffice),
            _ => Err(ConfigParseError {
                what: "compatibility mode",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for CompatibilityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompatibilityMode::Excel => write!(f, "Excel"),
            CompatibilityMode::OpenOffice => write!(f, "OpenOffice"),
        }
    }
}

impl FromStr for ReturnDateType {
    type Err = ConfigParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "e" | "excel" | "excelserial" | "serial" => Ok(ReturnDateType::ExcelSerial),
            "p" | "numeric" | "numericserial" | "unix" => Ok(ReturnDateType::NumericSerial),
            "o" | "object" | "native" | "nativedateobject" => Ok(ReturnDateType::NativeDateObject),
            _ => Err(ConfigParseError {
                what: "return date type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ReturnDateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnDateType::ExcelSerial => write!(f, "ExcelSerial"),
            ReturnDateType::NumericSerial => write!(f, "NumericSerial"),
            ReturnDateType::NativeDateObject => write!(f, "NativeDateObject"),
        }
    }
}

/// Configuration for the evaluation engine
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EvalConfig {
    pub compatibility: CompatibilityMode,
    pub calendar: Calendar,
    pub return_date_type: ReturnDateType,
    pub locale: Locale,
    /// Zone that `NumericSerial` results are computed in.
    pub timezone: TimeZoneSpec,
    pub enable_parallel: bool,
    pub max_threads: Option<usize>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            compatibility: CompatibilityMode::Excel,
            calendar: Calendar::Windows1900,
            return_date_type: ReturnDateType::ExcelSerial,
            locale: Locale::from_env(),
            timezone: TimeZoneSpec::Utc,
            enable_parallel: true,
            max_threads: None,
        }
    }
}

impl EvalConfig {
    pub fn with_compatibility(mut self, mode: CompatibilityMode) -> Self {
        self.compatibility = mode;
        self
    }

    pub fn with_calendar(mut self, calendar: Calendar) -> Self {
        self.calendar = calendar;
        self
    }

    pub fn with_return_date_type(mut self, kind: ReturnDateType) -> Self {
        self.return_date_type = kind;
        self
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_timezone(mut self, timezone: TimeZoneSpec) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_parallel(mut self, enable: bool) -> Self {
        self.enable_parallel = enable;
        self
    }

    pub fn with_max_threads(mut self, threads: Option<usize>) -> Self {
        self.max_threads = threads;
        self
    }

    /// Returns `false` and leaves the mode untouched when `mode` is not a
    /// known compatibility mode.
    pub fn set_compatibility_mode(&mut self, mode: &str) -> bool {
        match mode.parse() {
            Ok(mode) => {
                self.compatibility = mode;
                true
            }
            Err(_) => false,
        }
    }

    /// Accepts `1900`, `1904`, `Windows1900` or `Mac1904`.
    pub fn set_calendar(&mut self, calendar: &str) -> bool {
        match calendar.parse() {
            Ok(calendar) => {
                self.calendar = calendar;
                true
            }
            Err(_) => false,
        }
    }

    pub fn set_return_date_type(&mut self, kind: &str) -> bool {
        match kind.parse() {
            Ok(kind) => {
                self.return_date_type = kind;
                true
            }
            Err(_) => false,
        }
    }

    /// Accepts `UTC` or an IANA `Area/Location` name such as
    /// `Europe/Prague`.
    pub fn set_timezone(&mut self, name: &str) -> bool {
        match name.parse() {
            Ok(timezone) => {
                self.timezone = timezone;
                true
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_setters_reject_unknown_values() {
        let mut cfg = EvalConfig::default();
        assert!(!cfg.set_calendar("1901"));
        assert_eq!(cfg.calendar, Calendar::Windows1900);
        assert!(cfg.set_calendar("mac1904"));
        assert_eq!(cfg.calendar, Calendar::Mac1904);

        assert!(!cfg.set_compatibility_mode("gnumeric"));
        assert_eq!(cfg.compatibility, CompatibilityMode::Excel);
        assert!(cfg.set_compatibility_mode("OpenOffice"));
        assert_eq!(cfg.compatibility, CompatibilityMode::OpenOffice);

        assert!(!cfg.set_return_date_type("Z"));
        assert_eq!(cfg.return_date_type, ReturnDateType::ExcelSerial);
        assert!(cfg.set_return_date_type("P"));
        assert_eq!(cfg.return_date_type, ReturnDateType::NumericSerial);

        assert!(!cfg.set_timezone("Etc/GMT+10"));
        assert_eq!(cfg.timezone, TimeZoneSpec::Utc);
    }

    #[cfg(feature = "chrono-tz")]
    #[test]
    fn timezone_setter_takes_iana_names() {
        let mut cfg = EvalConfig::default();
        for name in [
            "Europe/Prague",
            "Asia/Tokyo",
            "America/Indiana/Indianapolis",
            "Pacific/Honolulu",
            "Atlantic/St_Helena",
        ] {
            assert!(cfg.set_timezone(name), "{name}");
            assert_eq!(cfg.timezone.name(), name);
        }
        assert!(!cfg.set_timezone("Etc/GMT+10"));
        assert_eq!(cfg.timezone.name(), "Atlantic/St_Helena");
        assert!(cfg.set_timezone("UTC"));
        assert_eq!(cfg.timezone, TimeZoneSpec::Utc);
    }

    #[test]
    fn builders_chain() {
        let cfg = EvalConfig::default()
            .with_calendar(Calendar::Mac1904)
            .with_return_date_type(ReturnDateType::NativeDateObject)
            .with_parallel(false)
            .with_max_threads(Some(2));
        assert_eq!(cfg.calendar, Calendar::Mac1904);
        assert_eq!(cfg.return_date_type, ReturnDateType::NativeDateObject);
        assert!(!cfg.enable_parallel);
        assert_eq!(cfg.max_threads, Some(2));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn missing_fields_take_defaults() {
        let cfg: EvalConfig = serde_json::from_str(
            r#"{ "compatibility": "OpenOffice", "calendar": "Mac1904", "enable_parallel": false }"#,
        )
        .unwrap();
        assert_eq!(cfg.compatibility, CompatibilityMode::OpenOffice);
        assert_eq!(cfg.calendar, Calendar::Mac1904);
        assert_eq!(cfg.return_date_type, ReturnDateType::ExcelSerial);
        assert!(!cfg.enable_parallel);
        assert_eq!(cfg.max_threads, None);
        assert_eq!(cfg.timezone, TimeZoneSpec::Utc);
    }

    #[cfg(all(feature = "serde", feature = "chrono-tz"))]
    #[test]
    fn timezone_serializes_by_name() {
        let cfg: EvalConfig = serde_json::from_str(r#"{ "timezone": "Asia/Tokyo" }"#).unwrap();
        assert_eq!(cfg.timezone.name(), "Asia/Tokyo");
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["timezone"], "Asia/Tokyo");
        assert!(serde_json::from_str::<EvalConfig>(r#"{ "timezone": "Etc/GMT+10" }"#).is_err());
    }
}
