//! Provider-facing evaluation results and their derivation from engine
//! [`EvaluationDetails`].
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    client::{EngineErrorCode, EvaluationDetails, SettingValue},
    Value,
};

/// Why an evaluation produced its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    /// The setting's own value was served.
    Default,
    /// A targeting rule or percentage option matched.
    TargetingMatch,
    /// Evaluation failed and the caller's default was served.
    Error,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reason::Default => "DEFAULT",
            Reason::TargetingMatch => "TARGETING_MATCH",
            Reason::Error => "ERROR",
        };
        f.write_str(name)
    }
}

/// Category of a failed evaluation.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The flag does not exist in the configuration.
    #[error("flag not found")]
    FlagNotFound,
    /// The flag value has a different type than requested.
    #[error("type mismatch")]
    TypeMismatch,
    /// The configuration (or a flag value) could not be parsed.
    #[error("parse error")]
    ParseError,
    /// Any other failure.
    #[error("general error")]
    General,
}

impl From<EngineErrorCode> for Option<ErrorCode> {
    fn from(value: EngineErrorCode) -> Self {
        match value {
            EngineErrorCode::None => None,
            EngineErrorCode::InvalidUserInput | EngineErrorCode::UnexpectedError => {
                Some(ErrorCode::General)
            }
            EngineErrorCode::InvalidConfigModel | EngineErrorCode::ConfigJsonNotAvailable => {
                Some(ErrorCode::ParseError)
            }
            EngineErrorCode::SettingValueTypeMismatch => Some(ErrorCode::TypeMismatch),
            EngineErrorCode::SettingKeyMissing => Some(ErrorCode::FlagNotFound),
        }
    }
}

/// Result of a provider evaluation.
///
/// `error_code` is `Some` exactly when `reason` is [`Reason::Error`]; `value` then holds the
/// default value passed by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEvaluation<T> {
    /// Evaluated value, or the caller's default on error.
    pub value: T,
    /// Variation id of the served value.
    pub variant: Option<String>,
    /// Why the value was served.
    pub reason: Reason,
    /// Set when evaluation failed.
    pub error_code: Option<ErrorCode>,
    /// Details of the failure.
    pub error_message: Option<String>,
}

impl<T> ProviderEvaluation<T> {
    /// A failed evaluation serving `default`.
    pub fn error(default: T, error_code: ErrorCode, error_message: Option<String>) -> Self {
        ProviderEvaluation {
            value: default,
            variant: None,
            reason: Reason::Error,
            error_code: Some(error_code),
            error_message,
        }
    }

    /// Rewrap around `value`, keeping variant, reason and error fields.
    pub fn with<V>(self, value: V) -> ProviderEvaluation<V> {
        ProviderEvaluation {
            value,
            variant: self.variant,
            reason: self.reason,
            error_code: self.error_code,
            error_message: self.error_message,
        }
    }

    /// Map the value with `f`, keeping all other fields.
    pub fn map<V, F: FnOnce(T) -> V>(self, f: F) -> ProviderEvaluation<V> {
        let value = f(self.value);
        ProviderEvaluation {
            value,
            variant: self.variant,
            reason: self.reason,
            error_code: self.error_code,
            error_message: self.error_message,
        }
    }

    /// Return `true` if evaluation failed.
    pub fn is_error(&self) -> bool {
        self.error_code.is_some()
    }
}

impl EvaluationDetails {
    fn reason(&self) -> Reason {
        if self.error_code != EngineErrorCode::None {
            Reason::Error
        } else if self.matched_targeting_rule.is_some() || self.matched_percentage_option.is_some()
        {
            Reason::TargetingMatch
        } else {
            Reason::Default
        }
    }

    /// Normalize engine details into a [`ProviderEvaluation`] of the raw setting value.
    pub fn to_provider_evaluation(self) -> ProviderEvaluation<SettingValue> {
        let reason = self.reason();
        ProviderEvaluation {
            value: self.value,
            variant: self.variation_id,
            reason,
            error_code: self.error_code.into(),
            error_message: self.error,
        }
    }
}

/// A type that can be served by a typed evaluation call from an engine [`SettingValue`].
pub(crate) trait FromSettingValue: Sized {
    fn from_setting_value(value: SettingValue) -> Option<Self>;
}

impl FromSettingValue for bool {
    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl FromSettingValue for String {
    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl FromSettingValue for i32 {
    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::Int(i) => Some(i),
            _ => None,
        }
    }
}

impl FromSettingValue for f64 {
    fn from_setting_value(value: SettingValue) -> Option<Self> {
        match value {
            SettingValue::Double(d) => Some(d),
            _ => None,
        }
    }
}

impl ProviderEvaluation<SettingValue> {
    /// Narrow to the requested type. An engine value of an unexpected type is reported as a
    /// type mismatch serving `default`.
    pub(crate) fn typed<T: FromSettingValue>(self, default: T) -> ProviderEvaluation<T> {
        if self.error_code.is_some() {
            return ProviderEvaluation {
                value: default,
                variant: self.variant,
                reason: self.reason,
                error_code: self.error_code,
                error_message: self.error_message,
            };
        }

        let found = self.value.setting_type();
        match T::from_setting_value(self.value.clone()) {
            Some(value) => self.with(value),
            None => ProviderEvaluation::error(
                default,
                ErrorCode::TypeMismatch,
                Some(format!(
                    "engine returned a value of type {found} for a differently typed request"
                )),
            ),
        }
    }
}

impl ProviderEvaluation<i32> {
    /// Widen the engine integer. If evaluation failed, serve `default` with the original reason
    /// and error fields instead of converting the engine's placeholder value.
    pub(crate) fn widen(self, default: i64) -> ProviderEvaluation<i64> {
        if let Some(error_code) = self.error_code {
            return ProviderEvaluation {
                value: default,
                variant: None,
                reason: self.reason,
                error_code: Some(error_code),
                error_message: self.error_message,
            };
        }
        self.map(i64::from)
    }
}

impl ProviderEvaluation<String> {
    /// Decode the string as a JSON document. If evaluation failed or the text is not valid JSON,
    /// serve `default`.
    pub(crate) fn decode_json(self, default: Value) -> ProviderEvaluation<Value> {
        if let Some(error_code) = self.error_code {
            return ProviderEvaluation {
                value: default,
                variant: None,
                reason: self.reason,
                error_code: Some(error_code),
                error_message: self.error_message,
            };
        }

        match serde_json::from_str::<serde_json::Value>(&self.value) {
            Ok(json) => self.with(Value::from(json)),
            Err(err) => {
                log::warn!(target: "configcat", text:display = self.value, err:display = err; "flag value is not valid JSON");
                ProviderEvaluation::error(
                    default,
                    ErrorCode::TypeMismatch,
                    Some(format!("Could not parse '{}' as JSON", self.value)),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        client::{EngineErrorCode, EvaluationDetails, SettingValue},
        ErrorCode, ProviderEvaluation, Reason, Value,
    };

    fn details(value: SettingValue) -> EvaluationDetails {
        EvaluationDetails {
            key: "key".to_owned(),
            value,
            variation_id: Some("v-1".to_owned()),
            matched_targeting_rule: None,
            matched_percentage_option: None,
            error_code: EngineErrorCode::None,
            error: None,
        }
    }

    #[test]
    fn maps_every_engine_error() {
        let cases = [
            (EngineErrorCode::None, None),
            (EngineErrorCode::InvalidUserInput, Some(ErrorCode::General)),
            (EngineErrorCode::UnexpectedError, Some(ErrorCode::General)),
            (EngineErrorCode::InvalidConfigModel, Some(ErrorCode::ParseError)),
            (
                EngineErrorCode::SettingValueTypeMismatch,
                Some(ErrorCode::TypeMismatch),
            ),
            (
                EngineErrorCode::ConfigJsonNotAvailable,
                Some(ErrorCode::ParseError),
            ),
            (EngineErrorCode::SettingKeyMissing, Some(ErrorCode::FlagNotFound)),
        ];
        for (engine, expected) in cases {
            assert_eq!(Option::<ErrorCode>::from(engine), expected, "{engine:?}");
        }
    }

    #[test]
    fn reason_is_error_whenever_engine_reports_error() {
        let mut d = details(SettingValue::Bool(false));
        d.error_code = EngineErrorCode::SettingKeyMissing;
        d.matched_targeting_rule = Some(0);

        let evaluation = d.to_provider_evaluation();
        assert_eq!(evaluation.reason, Reason::Error);
        assert_eq!(evaluation.error_code, Some(ErrorCode::FlagNotFound));
    }

    #[test]
    fn reason_is_targeting_match_for_rule_or_percentage() {
        let mut by_rule = details(SettingValue::Bool(true));
        by_rule.matched_targeting_rule = Some(1);
        assert_eq!(
            by_rule.to_provider_evaluation().reason,
            Reason::TargetingMatch
        );

        let mut by_percentage = details(SettingValue::Bool(true));
        by_percentage.matched_percentage_option = Some(0);
        assert_eq!(
            by_percentage.to_provider_evaluation().reason,
            Reason::TargetingMatch
        );
    }

    #[test]
    fn reason_is_default_otherwise() {
        let evaluation = details(SettingValue::Bool(true)).to_provider_evaluation();
        assert_eq!(evaluation.reason, Reason::Default);
        assert_eq!(evaluation.error_code, None);
        assert_eq!(evaluation.variant.as_deref(), Some("v-1"));
    }

    #[test]
    fn with_preserves_metadata() {
        let evaluation = ProviderEvaluation {
            value: 1,
            variant: Some("v".to_owned()),
            reason: Reason::TargetingMatch,
            error_code: None,
            error_message: None,
        };
        let rewrapped = evaluation.with("one");
        assert_eq!(rewrapped.value, "one");
        assert_eq!(rewrapped.variant.as_deref(), Some("v"));
        assert_eq!(rewrapped.reason, Reason::TargetingMatch);
    }

    #[test]
    fn widen_converts_engine_integer() {
        let evaluation = details(SettingValue::Int(5))
            .to_provider_evaluation()
            .typed(0i32)
            .widen(-1);
        assert_eq!(evaluation.value, 5i64);
        assert_eq!(evaluation.variant.as_deref(), Some("v-1"));
    }

    #[test]
    fn widen_short_circuits_on_error() {
        let mut d = details(SettingValue::Int(0));
        d.error_code = EngineErrorCode::SettingValueTypeMismatch;
        d.error = Some("mismatch".to_owned());

        let evaluation = d.to_provider_evaluation().typed(0i32).widen(i64::MAX);
        assert_eq!(evaluation.value, i64::MAX);
        assert_eq!(evaluation.reason, Reason::Error);
        assert_eq!(evaluation.error_code, Some(ErrorCode::TypeMismatch));
        assert_eq!(evaluation.error_message.as_deref(), Some("mismatch"));
    }

    #[test]
    fn typed_reports_unexpected_engine_type() {
        let evaluation = details(SettingValue::from("text"))
            .to_provider_evaluation()
            .typed(true);
        assert!(evaluation.value);
        assert_eq!(evaluation.reason, Reason::Error);
        assert_eq!(evaluation.error_code, Some(ErrorCode::TypeMismatch));
    }

    #[test]
    fn decode_json_builds_structure() {
        let evaluation = details(SettingValue::from(
            r#"{"bool_field":true,"text_field":"value"}"#,
        ))
        .to_provider_evaluation()
        .typed(String::new())
        .decode_json(Value::Null);

        let structure = evaluation.value.as_structure().unwrap();
        assert_eq!(structure["bool_field"], Value::Boolean(true));
        assert_eq!(structure["text_field"], Value::from("value"));
        assert_eq!(evaluation.reason, Reason::Default);
        assert_eq!(evaluation.variant.as_deref(), Some("v-1"));
    }

    #[test]
    fn decode_json_rejects_malformed_text() {
        let evaluation = details(SettingValue::from("{not json"))
            .to_provider_evaluation()
            .typed(String::new())
            .decode_json(Value::from("fallback"));

        assert_eq!(evaluation.value, Value::from("fallback"));
        assert_eq!(evaluation.reason, Reason::Error);
        assert_eq!(evaluation.error_code, Some(ErrorCode::TypeMismatch));
        assert_eq!(
            evaluation.error_message.as_deref(),
            Some("Could not parse '{not json' as JSON")
        );
        assert_eq!(evaluation.variant, None);
    }

    #[test]
    fn decode_json_propagates_engine_error() {
        let mut d = details(SettingValue::from(""));
        d.error_code = EngineErrorCode::SettingKeyMissing;
        d.error = Some("missing".to_owned());

        let evaluation = d
            .to_provider_evaluation()
            .typed(String::new())
            .decode_json(Value::Integer(3));

        assert_eq!(evaluation.value, Value::Integer(3));
        assert_eq!(evaluation.error_code, Some(ErrorCode::FlagNotFound));
        assert_eq!(evaluation.error_message.as_deref(), Some("missing"));
    }
}
