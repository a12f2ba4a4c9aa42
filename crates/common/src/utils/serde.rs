//! Serialization helpers for configuration types
//!
//! Durations in configuration files are plain millisecond integers.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde adapter for `Duration` as milliseconds (u64)
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use apiq_common::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    /// Serde serialization result type
    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Serialize a Duration as milliseconds, saturating at `u64::MAX`
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Deserialize milliseconds (u64) into a Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serde adapter for `Option<Duration>` as optional milliseconds
///
/// Pair with `#[serde(default)]` so a missing field reads as `None`.
pub mod option_duration_millis {
    use super::*;

    /// Serialize `Some(duration)` as milliseconds and `None` as null
    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(duration) => super::duration_millis::serialize(duration, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize optional milliseconds into an optional Duration
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Timeouts {
        #[serde(with = "duration_millis")]
        period: Duration,
        #[serde(with = "option_duration_millis", default)]
        timeout: Option<Duration>,
    }

    #[test]
    fn test_duration_millis_reads_integers() {
        let parsed: Timeouts =
            serde_json::from_str(r#"{"period":1500,"timeout":250}"#).expect("valid JSON");

        assert_eq!(parsed.period, Duration::from_millis(1500));
        assert_eq!(parsed.timeout, Some(Duration::from_millis(250)));
    }

    #[test]
    fn test_missing_optional_duration_is_none() {
        let parsed: Timeouts = serde_json::from_str(r#"{"period":10}"#).expect("valid JSON");
        assert_eq!(parsed.timeout, None);

        let json = serde_json::to_string(&parsed).expect("serialize");
        assert!(json.contains("\"timeout\":null"));
    }

    #[test]
    fn test_duration_millis_rejects_negative_and_text() {
        assert!(serde_json::from_str::<Timeouts>(r#"{"period":-5}"#).is_err());
        assert!(serde_json::from_str::<Timeouts>(r#"{"period":"soon"}"#).is_err());
    }

    #[test]
    fn test_duration_millis_reads_toml() {
        let parsed: Timeouts = toml::from_str("period = 1000\ntimeout = 30000\n").expect("TOML");

        assert_eq!(parsed.period, Duration::from_secs(1));
        assert_eq!(parsed.timeout, Some(Duration::from_secs(30)));
    }
}
