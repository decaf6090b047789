//! Timestamps on the wire are ISO 8601 in UTC, without an offset.
//!
//! Clients may also send an RFC 3339 string with an offset (converted to UTC),
//! a space instead of `T`, or a bare date (midnight).
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{self, de, Deserialize, Deserializer, Serializer};

const FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_str(&date.format(FORMAT))
}

pub fn parse(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).ok_or_else(|| de::Error::custom(format!("invalid date time: {}", text)))
}

pub mod option {
    use chrono::NaiveDateTime;
    use serde::{self, de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if let Some(date) = date {
            super::serialize(date, serializer)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = Option::<String>::deserialize(deserializer)?;
        if let Some(text) = text {
            super::parse(&text)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid date time: {}", text)))
        } else {
            Ok(None)
        }
    }
}

#[test]
fn test_parse() {
    let expected = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(18, 30, 0).unwrap();
    assert_eq!(parse("2025-03-01T18:30:00"), Some(expected));
    assert_eq!(parse("2025-03-01 18:30:00"), Some(expected));
    assert_eq!(parse("2025-03-01T18:30"), Some(expected));
    assert_eq!(parse("2025-03-01T20:30:00+02:00"), Some(expected));
    assert_eq!(parse("2025-03-01T18:30:00Z"), Some(expected));
    assert_eq!(
        parse("2025-03-01"),
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(0, 0, 0)
    );
    assert_eq!(parse("yesterday"), None);
    assert_eq!(parse(""), None);
}

#[test]
fn test_serde() {
    #[derive(serde::Serialize, serde::Deserialize, Debug, PartialEq)]
    struct Form {
        #[serde(with = "crate::date_format")]
        start: NaiveDateTime,
        #[serde(default, with = "crate::date_format::option")]
        end: Option<NaiveDateTime>,
    }

    let form: Form = serde_json::from_str(r#"{"start": "2025-03-01 18:30:00"}"#).unwrap();
    assert_eq!(form.end, None);
    assert_eq!(
        serde_json::to_string(&form).unwrap(),
        r#"{"start":"2025-03-01T18:30:00","end":null}"#
    );
    assert!(serde_json::from_str::<Form>(r#"{"start": 1700000000}"#).is_err());
}
