//! Flag override document understood by [`LocalClient`](crate::LocalClient).
use std::collections::HashMap;

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::{
    client::{SettingType, SettingValue},
    local::rules::Condition,
    Result,
};

/// A set of settings keyed by flag key.
///
/// ```json
/// {
///   "settings": {
///     "enabledFeature": { "type": "boolean", "value": true, "variationId": "v-enabled" }
///   }
/// }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub(crate) settings: HashMap<String, TryParse<Setting>>,
}

impl Document {
    /// Parse a document from JSON text.
    pub fn from_json(json: &str) -> Result<Document> {
        Ok(serde_json::from_str(json)?)
    }

    /// Keys of all settings, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = self.settings.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }
}

/// `TryParse` allows the subfield to fail parsing without failing the parsing of the whole
/// structure.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum TryParse<T> {
    Parsed(T),
    ParseFailed(serde_json::Value),
}

impl<'a, T> From<&'a TryParse<T>> for Option<&'a T> {
    fn from(value: &TryParse<T>) -> Option<&T> {
        match value {
            TryParse::Parsed(v) => Some(v),
            TryParse::ParseFailed(_) => None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Setting {
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub value: RawValue,
    #[serde(default)]
    pub variation_id: Option<String>,
    #[serde(default)]
    pub targeting_rules: Vec<TargetingRule>,
    #[serde(default)]
    pub percentage_options: Vec<PercentageOption>,
}

/// Subset of [`serde_json::Value`] a setting may serve.
///
/// `RawValue` is untagged, so we don't know the exact type until we combine it with the
/// [`SettingType`] of the setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub(crate) enum RawValue {
    Boolean(bool),
    /// Number maps to either [`SettingValue::Int`] or [`SettingValue::Double`].
    Number(f64),
    String(String),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl RawValue {
    /// Interpret the value as `setting_type`. Returns `None` if the value does not fit the type.
    pub fn to_setting_value(&self, setting_type: SettingType) -> Option<SettingValue> {
        Some(match (setting_type, self) {
            (SettingType::Boolean, RawValue::Boolean(b)) => SettingValue::Bool(*b),
            (SettingType::String, RawValue::String(s)) => SettingValue::String(s.clone()),
            (SettingType::Double, RawValue::Number(n)) => SettingValue::Double(*n),
            (SettingType::Int, RawValue::Number(n)) => {
                let fits = n.fract() == 0.0 && *n >= i32::MIN as f64 && *n <= i32::MAX as f64;
                if !fits {
                    return None;
                }
                SettingValue::Int(*n as i32)
            }
            _ => return None,
        })
    }
}

/// Serves `value` when all conditions match the user.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TargetingRule {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub value: RawValue,
    #[serde(default)]
    pub variation_id: Option<String>,
}

/// Serves `value` to `percentage` percent of identifiers.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PercentageOption {
    pub percentage: u32,
    pub value: RawValue,
    #[serde(default)]
    pub variation_id: Option<String>,
}
