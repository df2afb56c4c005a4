//! Text forms of the GTFS values
//!
//! Each module is used with `#[serde(with = "...")]` on the record fields. They read the
//! CSV cells, the JSON written for the databases, and the values given to
//! [Entity::set_column](crate::Entity::set_column), so they accept what they write.
use crate::error::EntityError;
use rgb::RGB8;
use serde::de::{Deserialize, Deserializer};

/// Trimmed content of a cell, `None` when empty
fn cell<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty()))
}

/// Seconds from the start of the service day, `H:MM:SS`, past 24:00:00 after midnight
pub fn parse_time(s: &str) -> Result<u32, EntityError> {
    let invalid = || EntityError::invalid_field("time", s, "HH:MM:SS expected");
    let mut parts = s.split(':');
    let (Some(h), Some(m), Some(sec), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(invalid());
    };
    if h.is_empty() || m.len() != 2 || sec.len() != 2 {
        return Err(invalid());
    }
    let number = |v: &str| v.parse::<u32>().map_err(|_| invalid());
    let (h, m, sec) = (number(h)?, number(m)?, number(sec)?);
    if m >= 60 || sec >= 60 {
        return Err(invalid());
    }
    Ok(h * 3600 + m * 60 + sec)
}

pub fn format_time(time: u32) -> String {
    format!("{:02}:{:02}:{:02}", time / 3600, time % 3600 / 60, time % 60)
}

/// `RRGGBB`, without a leading `#`
pub fn parse_color(s: &str) -> Result<RGB8, EntityError> {
    let invalid = || EntityError::invalid_field("color", s, "RRGGBB expected");
    if s.len() != 6 || !s.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| invalid());
    Ok(RGB8::new(channel(0)?, channel(2)?, channel(4)?))
}

pub fn format_color(color: &RGB8) -> String {
    format!("{:02X}{:02X}{:02X}", color.r, color.g, color.b)
}

pub mod date {
    use chrono::NaiveDate;
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub(crate) const FORMAT: &str = "%Y%m%d";

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = super::cell(deserializer)?
            .ok_or_else(|| <D::Error as de::Error>::custom("date is required"))?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(de::Error::custom)
    }

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }
}

pub mod option_date {
    use chrono::NaiveDate;
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDate>, D::Error> {
        super::cell(deserializer)?
            .map(|s| NaiveDate::parse_from_str(&s, super::date::FORMAT).map_err(de::Error::custom))
            .transpose()
    }

    pub fn serialize<S: Serializer>(
        date: &Option<NaiveDate>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => serializer.collect_str(&d.format(super::date::FORMAT)),
            None => serializer.serialize_none(),
        }
    }
}

pub mod time {
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        let s = super::cell(deserializer)?
            .ok_or_else(|| <D::Error as de::Error>::custom("time is required"))?;
        super::parse_time(&s).map_err(de::Error::custom)
    }

    pub fn serialize<S: Serializer>(time: &u32, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_time(*time))
    }
}

pub mod option_time {
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
        super::cell(deserializer)?
            .map(|s| super::parse_time(&s).map_err(de::Error::custom))
            .transpose()
    }

    pub fn serialize<S: Serializer>(time: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&super::format_time(*t)),
            None => serializer.serialize_none(),
        }
    }
}

/// Coordinates, written as text so that an empty cell stays empty
pub mod coordinate {
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        super::cell(deserializer)?
            .map(|s| s.parse().map_err(de::Error::custom))
            .transpose()
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.collect_str(v),
            None => serializer.serialize_str(""),
        }
    }
}

/// Days of a calendar, `0` or `1`
pub mod flag {
    use serde::de::{self, Deserializer, Visitor};
    use serde::ser::Serializer;
    use std::fmt;

    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("0 or 1")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            match v {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Unsigned(v), &self)),
            }
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                _ => Err(E::invalid_value(de::Unexpected::Str(v), &self)),
            }
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(FlagVisitor)
    }

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }
}

/// `route_color`, white when empty
pub mod route_color {
    use rgb::RGB8;
    use serde::de::{self, Deserializer};
    use serde::ser::Serializer;

    pub fn default() -> RGB8 {
        RGB8::new(255, 255, 255)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RGB8, D::Error> {
        match super::cell(deserializer)? {
            Some(s) => super::parse_color(&s).map_err(de::Error::custom),
            None => Ok(default()),
        }
    }

    pub fn serialize<S: Serializer>(color: &RGB8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_color(color))
    }
}

/// `route_text_color`, black when empty
pub mod text_color {
    use rgb::RGB8;
    use serde::de::{self, Deserializer};

    pub use super::route_color::serialize;

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<RGB8, D::Error> {
        match super::cell(deserializer)? {
            Some(s) => super::parse_color(&s).map_err(de::Error::custom),
            None => Ok(RGB8::default()),
        }
    }
}
