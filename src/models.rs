//! Data models for the chart API.
//!
//! This module contains the core data structures shared by the aspect
//! detector, the chart service client and the HTTP handlers.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A named point on the ecliptic, as consumed by the aspect detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CelestialBody {
    /// Canonical (non-localized) body name, e.g. `Sun` or `True_Node`.
    pub name: String,
    /// Absolute ecliptic longitude in degrees.
    pub angle: f64,
}

impl CelestialBody {
    pub fn new(name: impl Into<String>, angle: f64) -> Self {
        Self {
            name: name.into(),
            angle,
        }
    }
}

/// Recognized angular relationship between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectKind {
    Conjunction,
    Sextile,
    Square,
    Trine,
    Opposition,
}

impl AspectKind {
    /// Order in which target angles are tested. The first match wins.
    pub const PRIORITY: [AspectKind; 5] = [
        AspectKind::Conjunction,
        AspectKind::Opposition,
        AspectKind::Trine,
        AspectKind::Square,
        AspectKind::Sextile,
    ];

    /// The exact separation, in degrees, that defines this aspect.
    pub fn exact_angle(&self) -> f64 {
        match self {
            AspectKind::Conjunction => 0.0,
            AspectKind::Sextile => 60.0,
            AspectKind::Square => 90.0,
            AspectKind::Trine => 120.0,
            AspectKind::Opposition => 180.0,
        }
    }
}

impl fmt::Display for AspectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AspectKind::Conjunction => write!(f, "conjunction"),
            AspectKind::Sextile => write!(f, "sextile"),
            AspectKind::Square => write!(f, "square"),
            AspectKind::Trine => write!(f, "trine"),
            AspectKind::Opposition => write!(f, "opposition"),
        }
    }
}

/// A detected aspect between two bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aspect {
    /// First-encountered body of the pair.
    #[serde(rename = "p1")]
    pub body_a: String,
    /// Second body of the pair.
    #[serde(rename = "p2")]
    pub body_b: String,
    #[serde(rename = "aspect")]
    pub kind: AspectKind,
    /// Deviation from the exact aspect angle, rounded to 2 decimals.
    pub orb: f64,
}

/// One placement returned by the chart service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub name: String,
    /// Zodiac sign name, as spelled by the chart service (e.g. `Aries`).
    pub sign: String,
    /// Absolute ecliptic longitude in degrees.
    #[serde(alias = "abs_pos")]
    pub angle: f64,
    /// House index (1-12), absent for points that are themselves cusps.
    #[serde(default)]
    pub house: Option<u8>,
}

impl ChartPoint {
    pub fn as_body(&self) -> CelestialBody {
        CelestialBody::new(self.name.clone(), self.angle)
    }
}

/// A house cusp as returned by the chart service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuspPosition {
    pub sign: String,
    #[serde(alias = "abs_pos")]
    pub angle: f64,
}

/// A house cusp as reported to API clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseCusp {
    /// 1-based house number.
    pub id: usize,
    pub angle: f64,
    #[serde(rename = "chinese_name")]
    pub local_name: String,
}

/// Sign names of the three headline placements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BigThree {
    pub sun: String,
    pub moon: String,
    pub rising: String,
}

/// Errors raised while turning raw request fields into a birth moment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BirthDataError {
    #[error("missing required field '{0}'")]
    Missing(&'static str),

    #[error("field '{field}' is not an integer: {value}")]
    NotAnInteger { field: &'static str, value: String },

    #[error("field '{field}' is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },

    #[error("{0} is not a valid calendar date and time")]
    InvalidMoment(String),
}

/// Integer that may arrive as a JSON number or as a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlexibleInt {
    Number(i64),
    Float(f64),
    Text(String),
}

impl FlexibleInt {
    fn value(&self, field: &'static str) -> Result<i64, BirthDataError> {
        match self {
            FlexibleInt::Number(n) => Ok(*n),
            // Whole floats such as 1990.0 only
            FlexibleInt::Float(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i64),
            FlexibleInt::Float(f) => Err(BirthDataError::NotAnInteger {
                field,
                value: f.to_string(),
            }),
            FlexibleInt::Text(s) => {
                s.trim()
                    .parse::<i64>()
                    .map_err(|_| BirthDataError::NotAnInteger {
                        field,
                        value: s.clone(),
                    })
            }
        }
    }
}

/// Birth data as posted by API clients. Every field is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BirthData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub year: Option<FlexibleInt>,
    #[serde(default)]
    pub month: Option<FlexibleInt>,
    #[serde(default)]
    pub day: Option<FlexibleInt>,
    #[serde(default)]
    pub hour: Option<FlexibleInt>,
    #[serde(default)]
    pub minute: Option<FlexibleInt>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Fallback values for the optional descriptive fields of [`BirthData`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthDefaults {
    pub name: String,
    pub city: String,
    pub country: String,
}

/// A validated birth moment and place, as sent to the chart service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthDetails {
    pub name: String,
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub city: String,
    pub country: String,
}

impl BirthData {
    /// Resolve the raw request into validated birth details.
    pub fn resolve(&self, defaults: &BirthDefaults) -> Result<BirthDetails, BirthDataError> {
        let year = required(&self.year, "year")?;
        let details = BirthDetails {
            name: non_empty_or(&self.name, &defaults.name),
            year: i32::try_from(year).map_err(|_| BirthDataError::OutOfRange {
                field: "year",
                value: year,
            })?,
            month: unsigned(&self.month, "month")?,
            day: unsigned(&self.day, "day")?,
            hour: unsigned(&self.hour, "hour")?,
            minute: unsigned(&self.minute, "minute")?,
            city: non_empty_or(&self.city, &defaults.city),
            country: non_empty_or(&self.country, &defaults.country),
        };

        details.local_datetime()?;
        Ok(details)
    }
}

impl BirthDetails {
    /// The local civil date and time of birth.
    pub fn local_datetime(&self) -> Result<NaiveDateTime, BirthDataError> {
        let date = NaiveDate::from_ymd_opt(self.year, self.month, self.day);
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0);

        match (date, time) {
            (Some(date), Some(time)) => Ok(date.and_time(time)),
            _ => Err(BirthDataError::InvalidMoment(format!(
                "{:04}-{:02}-{:02} {:02}:{:02}",
                self.year, self.month, self.day, self.hour, self.minute
            ))),
        }
    }
}

fn required(field: &Option<FlexibleInt>, name: &'static str) -> Result<i64, BirthDataError> {
    field
        .as_ref()
        .ok_or(BirthDataError::Missing(name))?
        .value(name)
}

fn unsigned(field: &Option<FlexibleInt>, name: &'static str) -> Result<u32, BirthDataError> {
    let value = required(field, name)?;
    u32::try_from(value).map_err(|_| BirthDataError::OutOfRange { field: name, value })
}

fn non_empty_or(value: &Option<String>, fallback: &str) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> BirthDefaults {
        BirthDefaults {
            name: "Guest".to_string(),
            city: "Hong Kong".to_string(),
            country: "HK".to_string(),
        }
    }

    #[test]
    fn test_aspect_priority_order() {
        let angles: Vec<f64> = AspectKind::PRIORITY
            .iter()
            .map(|k| k.exact_angle())
            .collect();
        assert_eq!(angles, vec![0.0, 180.0, 120.0, 90.0, 60.0]);
    }

    #[test]
    fn test_aspect_kind_display_matches_wire_name() {
        for kind in AspectKind::PRIORITY {
            let wire = serde_json::to_value(kind).unwrap();
            assert_eq!(wire, kind.to_string());
        }
    }

    #[test]
    fn test_aspect_wire_format() {
        let aspect = Aspect {
            body_a: "Sun".to_string(),
            body_b: "Moon".to_string(),
            kind: AspectKind::Square,
            orb: 1.25,
        };
        let json = serde_json::to_value(&aspect).unwrap();
        assert_eq!(json["p1"], "Sun");
        assert_eq!(json["p2"], "Moon");
        assert_eq!(json["aspect"], "square");
        assert_eq!(json["orb"], 1.25);
    }

    #[test]
    fn test_chart_point_accepts_abs_pos() {
        let point: ChartPoint =
            serde_json::from_str(r#"{"name":"Sun","sign":"Leo","abs_pos":130.5,"house":5}"#)
                .unwrap();
        assert_eq!(point.angle, 130.5);
        assert_eq!(point.house, Some(5));

        let json = serde_json::to_value(&point).unwrap();
        assert_eq!(json["angle"], 130.5);
    }

    #[test]
    fn test_birth_data_numbers_and_strings() {
        let raw: BirthData = serde_json::from_str(
            r#"{"year":"1990","month":7,"day":"15","hour":8,"minute":"30","city":"Taipei"}"#,
        )
        .unwrap();
        let details = raw.resolve(&defaults()).unwrap();
        assert_eq!(details.year, 1990);
        assert_eq!(details.month, 7);
        assert_eq!(details.minute, 30);
        assert_eq!(details.name, "Guest");
        assert_eq!(details.city, "Taipei");
        assert_eq!(details.country, "HK");
    }

    #[test]
    fn test_birth_data_whole_floats() {
        let raw: BirthData = serde_json::from_str(
            r#"{"year":1990.0,"month":7.0,"day":15,"hour":"8","minute":30.0}"#,
        )
        .unwrap();
        let details = raw.resolve(&defaults()).unwrap();
        assert_eq!(details.year, 1990);
        assert_eq!(details.month, 7);
        assert_eq!(details.minute, 30);

        let raw: BirthData = serde_json::from_str(
            r#"{"year":1990,"month":7,"day":15,"hour":7.5,"minute":30}"#,
        )
        .unwrap();
        assert!(matches!(
            raw.resolve(&defaults()),
            Err(BirthDataError::NotAnInteger { field: "hour", .. })
        ));
    }

    #[test]
    fn test_birth_data_missing_field() {
        let raw: BirthData =
            serde_json::from_str(r#"{"year":1990,"month":7,"day":15,"hour":8}"#).unwrap();
        assert_eq!(
            raw.resolve(&defaults()),
            Err(BirthDataError::Missing("minute"))
        );
    }

    #[test]
    fn test_birth_data_rejects_garbage() {
        let raw: BirthData = serde_json::from_str(
            r#"{"year":"nineteen","month":7,"day":15,"hour":8,"minute":0}"#,
        )
        .unwrap();
        assert!(matches!(
            raw.resolve(&defaults()),
            Err(BirthDataError::NotAnInteger { field: "year", .. })
        ));

        let negative: BirthData =
            serde_json::from_str(r#"{"year":1990,"month":-1,"day":15,"hour":8,"minute":0}"#)
                .unwrap();
        assert!(matches!(
            negative.resolve(&defaults()),
            Err(BirthDataError::OutOfRange { field: "month", .. })
        ));
    }

    #[test]
    fn test_birth_data_invalid_calendar_moment() {
        let raw: BirthData =
            serde_json::from_str(r#"{"year":2023,"month":2,"day":29,"hour":8,"minute":0}"#)
                .unwrap();
        assert!(matches!(
            raw.resolve(&defaults()),
            Err(BirthDataError::InvalidMoment(_))
        ));

        let late: BirthData =
            serde_json::from_str(r#"{"year":2024,"month":2,"day":29,"hour":24,"minute":0}"#)
                .unwrap();
        assert!(late.resolve(&defaults()).is_err());
    }

    #[test]
    fn test_blank_name_uses_default() {
        let raw = BirthData {
            name: Some("   ".to_string()),
            year: Some(FlexibleInt::Number(2000)),
            month: Some(FlexibleInt::Number(1)),
            day: Some(FlexibleInt::Number(1)),
            hour: Some(FlexibleInt::Number(0)),
            minute: Some(FlexibleInt::Number(0)),
            city: None,
            country: Some("TW".to_string()),
        };
        let details = raw.resolve(&defaults()).unwrap();
        assert_eq!(details.name, "Guest");
        assert_eq!(details.country, "TW");
    }
}
