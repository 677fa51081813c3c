use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize, Serializer};

use crate::error::ModelError;

/// How the shared stream reaches this instance.
///
/// Determines what "release" means when a message is not for this instance:
/// - `SharedQueue`: every instance competes on one queue; a skipped message
///   must be made visible again so another instance can claim it.
/// - `FanOut`: every instance receives its own copy through a topic or
///   exchange binding; a skipped copy is acknowledged and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Competing consumers on a single queue (default).
    #[default]
    SharedQueue,
    /// One copy per instance via topic/exchange subscription.
    FanOut,
}

impl FromStr for DeliveryMode {
    type Err = ModelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shared-queue" | "queue" => Ok(Self::SharedQueue),
            "fan-out" | "fanout" | "topic" => Ok(Self::FanOut),
            _ => Err(ModelError::UnknownDeliveryMode(s.to_string())),
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeliveryMode::SharedQueue => "shared-queue",
            DeliveryMode::FanOut => "fan-out",
        };
        f.write_str(s)
    }
}

impl Serialize for DeliveryMode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for DeliveryMode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aliases_case_insensitive() {
        assert_eq!("queue".parse::<DeliveryMode>().unwrap(), DeliveryMode::SharedQueue);
        assert_eq!("Shared-Queue".parse::<DeliveryMode>().unwrap(), DeliveryMode::SharedQueue);
        assert_eq!("TOPIC".parse::<DeliveryMode>().unwrap(), DeliveryMode::FanOut);
        assert_eq!("fanout".parse::<DeliveryMode>().unwrap(), DeliveryMode::FanOut);
    }

    #[test]
    fn rejects_unknown_mode() {
        for input in ["", "broadcast", "queue-ish"] {
            assert!(
                input.parse::<DeliveryMode>().is_err(),
                "expected error for {input:?}"
            );
        }
    }

    #[test]
    fn serde_uses_canonical_names() {
        let json = serde_json::to_string(&DeliveryMode::FanOut).unwrap();
        assert_eq!(json, r#""fan-out""#);
        let back: DeliveryMode = serde_json::from_str(r#""queue""#).unwrap();
        assert_eq!(back, DeliveryMode::SharedQueue);
    }
}
