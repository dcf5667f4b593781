//! Serde helpers for configuration durations
//!
//! Durations are written as whole seconds, which reads naturally in TOML.

/// `Duration` as a u64 number of seconds
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// `Option<Duration>` as an optional number of seconds
///
/// A missing key or a value of zero both mean "no duration".
pub mod option_duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.filter(|s| *s > 0).map(Duration::from_secs))
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Timeouts {
        #[serde(with = "super::duration_secs")]
        dial: Duration,
        #[serde(default, with = "super::option_duration_secs")]
        idle: Option<Duration>,
    }

    #[test]
    fn test_durations_as_seconds() {
        let timeouts = Timeouts {
            dial: Duration::from_secs(5),
            idle: Some(Duration::from_secs(600)),
        };
        let json = serde_json::to_string(&timeouts).unwrap();
        assert_eq!(json, r#"{"dial":5,"idle":600}"#);
    }

    #[test]
    fn test_missing_or_zero_idle_is_none() {
        let missing: Timeouts = serde_json::from_str(r#"{"dial":5}"#).unwrap();
        assert_eq!(missing.idle, None);

        let zero: Timeouts = serde_json::from_str(r#"{"dial":5,"idle":0}"#).unwrap();
        assert_eq!(zero.idle, None);
    }
}
