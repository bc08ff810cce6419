// Extension settings snapshot handed from the content realm to the injected realm
use crate::{BtdError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings read once at content-realm startup.
///
/// The messaging core never interprets them; they travel to the injected
/// realm as a JSON string attached to the injected script.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub Map<String, Value>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Serialized form stored on the injected script element
    pub fn to_dataset(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse the serialized form back; anything but a JSON object is rejected.
    pub fn from_dataset(raw: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(BtdError::SettingsError(format!(
                "expected an object, got {}",
                other
            ))),
            Err(e) => Err(BtdError::SettingsError(format!(
                "invalid settings json: {}",
                e
            ))),
        }
    }
}

impl From<Map<String, Value>> for Settings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
