//! Serde helpers shared by the policy documents.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

pub(crate) fn default_true() -> bool {
    true
}

pub(crate) fn default_version() -> String {
    "1.0.0".to_string()
}

pub(crate) fn default_name() -> String {
    "default".to_string()
}

/// `HashMap<String, Duration>` written as humantime strings
pub(crate) mod duration_map {
    use super::{BTreeMap, Deserialize, Deserializer, Duration, HashMap, Serialize, Serializer};

    pub fn serialize<S>(map: &HashMap<String, Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let sorted: BTreeMap<&str, humantime_serde::Serde<Duration>> = map
            .iter()
            .map(|(key, value)| (key.as_str(), humantime_serde::Serde::from(*value)))
            .collect();
        sorted.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashMap<String, Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = HashMap::<String, humantime_serde::Serde<Duration>>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(key, value)| (key, value.into_inner()))
            .collect())
    }
}

/// Optional scalar read as a string, so `threshold: 500` and
/// `threshold: "rate_limit"` both parse
pub(crate) mod scalar_string {
    use super::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Flag(bool),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Scalar>::deserialize(deserializer)?;
        Ok(raw.map(|scalar| match scalar {
            Scalar::Text(text) => text,
            Scalar::Integer(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Flag(value) => value.to_string(),
        }))
    }
}
