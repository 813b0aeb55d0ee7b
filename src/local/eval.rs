use crate::{
    client::{EngineErrorCode, EvaluationDetails, SettingValue},
    local::{
        document::{Document, PercentageOption, RawValue, Setting, TargetingRule},
        sharder::Sharder,
    },
    User,
};

const TOTAL_PERCENTAGE: u64 = 100;

fn returning_default(default: &SettingValue) -> String {
    format!(
        "Returning the `defaultValue` parameter that you specified in your application: '{default}'."
    )
}

impl Document {
    /// Evaluate `key` for `user`. Any failure is reported in the returned details together with
    /// `default`.
    pub(crate) fn eval(
        &self,
        key: &str,
        default: SettingValue,
        user: Option<&User>,
        sharder: &impl Sharder,
    ) -> EvaluationDetails {
        if key.is_empty() {
            return EvaluationDetails::from_error(
                key,
                default,
                EngineErrorCode::InvalidUserInput,
                "The key parameter cannot be empty.",
            );
        }

        let Some(setting) = self.settings.get(key) else {
            let message = format!(
                "Failed to evaluate setting '{key}' (the key was not found in config JSON). {} Available keys: [{}].",
                returning_default(&default),
                self.keys()
                    .iter()
                    .map(|key| format!("'{key}'"))
                    .collect::<Vec<_>>()
                    .join(", "),
            );
            return EvaluationDetails::from_error(
                key,
                default,
                EngineErrorCode::SettingKeyMissing,
                message,
            );
        };

        let Some(setting) = Option::<&Setting>::from(setting) else {
            log::warn!(target: "configcat", flag_key = key; "setting failed to parse");
            let message = format!(
                "Failed to evaluate setting '{key}' (the setting could not be parsed). {}",
                returning_default(&default)
            );
            return EvaluationDetails::from_error(
                key,
                default,
                EngineErrorCode::InvalidConfigModel,
                message,
            );
        };

        if setting.setting_type != default.setting_type() {
            let message = format!(
                "The type of a setting must match the type of the specified default value. Setting's type was {} but the default value's type was {}. Please use a default value which corresponds to the setting type {}. {}",
                setting.setting_type,
                default.setting_type(),
                setting.setting_type,
                returning_default(&default)
            );
            return EvaluationDetails::from_error(
                key,
                default,
                EngineErrorCode::SettingValueTypeMismatch,
                message,
            );
        }

        let served = setting.eval(key, user, sharder);
        let Some(value) = served.value.to_setting_value(setting.setting_type) else {
            log::warn!(target: "configcat",
                       flag_key = key,
                       variation_id:? = served.variation_id;
                       "internal: served value does not match the setting type");
            let message = format!(
                "Failed to evaluate setting '{key}' (the served value does not match the setting type {}). {}",
                setting.setting_type,
                returning_default(&default)
            );
            return EvaluationDetails::from_error(
                key,
                default,
                EngineErrorCode::InvalidConfigModel,
                message,
            );
        };

        EvaluationDetails {
            key: key.to_owned(),
            value,
            variation_id: served.variation_id.clone(),
            matched_targeting_rule: served.targeting_rule,
            matched_percentage_option: served.percentage_option,
            error_code: EngineErrorCode::None,
            error: None,
        }
    }
}

/// The value a setting resolved to, and where it came from.
struct Served<'a> {
    value: &'a RawValue,
    variation_id: &'a Option<String>,
    targeting_rule: Option<usize>,
    percentage_option: Option<usize>,
}

impl Setting {
    fn eval<'a>(&'a self, key: &str, user: Option<&User>, sharder: &impl Sharder) -> Served<'a> {
        let fallback = Served {
            value: &self.value,
            variation_id: &self.variation_id,
            targeting_rule: None,
            percentage_option: None,
        };

        let Some(user) = user else {
            if !self.targeting_rules.is_empty() || !self.percentage_options.is_empty() {
                log::warn!(target: "configcat", flag_key = key;
                           "cannot evaluate targeting rules and percentage options without a user, serving the setting value");
            }
            return fallback;
        };

        if let Some((index, rule)) = self
            .targeting_rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.matches(user))
        {
            return Served {
                value: &rule.value,
                variation_id: &rule.variation_id,
                targeting_rule: Some(index),
                percentage_option: None,
            };
        }

        if let Some((index, option)) =
            PercentageOption::select(&self.percentage_options, key, user, sharder)
        {
            return Served {
                value: &option.value,
                variation_id: &option.variation_id,
                targeting_rule: None,
                percentage_option: Some(index),
            };
        }

        fallback
    }
}

impl TargetingRule {
    /// A rule matches when all of its conditions match.
    fn matches(&self, user: &User) -> bool {
        self.conditions.iter().all(|condition| condition.eval(user))
    }
}

impl PercentageOption {
    /// Pick the option whose cumulative percentage range contains the user's bucket.
    fn select<'a>(
        options: &'a [PercentageOption],
        key: &str,
        user: &User,
        sharder: &impl Sharder,
    ) -> Option<(usize, &'a PercentageOption)> {
        if options.is_empty() {
            return None;
        }
        let bucket = sharder.get_shard(&format!("{key}{}", user.identifier), TOTAL_PERCENTAGE);
        let mut upper = 0u64;
        options.iter().enumerate().find(|(_, option)| {
            upper += u64::from(option.percentage);
            bucket < upper
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        client::{EngineErrorCode, SettingValue},
        local::{
            document::Document,
            sharder::{DeterministicSharder, Md5Sharder},
        },
        EvaluationContext,
    };

    fn document() -> Document {
        Document::from_json(
            r#"{
              "settings": {
                "rollout": {
                  "type": "string",
                  "value": "off",
                  "variationId": "v-off",
                  "targetingRules": [
                    {
                      "conditions": [
                        { "attribute": "Email", "operator": "MATCHES", "value": "@beta\\.com$" }
                      ],
                      "value": "beta",
                      "variationId": "v-beta"
                    }
                  ],
                  "percentageOptions": [
                    { "percentage": 30, "value": "a", "variationId": "v-a" },
                    { "percentage": 70, "value": "b", "variationId": "v-b" }
                  ]
                },
                "broken": { "type": "int", "value": "not a number" },
                "unknown": { "type": "NEW_TYPE", "value": 1 }
              }
            }"#,
        )
        .unwrap()
    }

    fn sharder(identifier: &str, bucket: u64) -> DeterministicSharder {
        DeterministicSharder(HashMap::from([(format!("rollout{identifier}"), bucket)]))
    }

    #[test]
    fn targeting_rule_wins_over_percentage_options() {
        let user = EvaluationContext::with_targeting_key("u1")
            .with_attribute("Email", "me@beta.com")
            .to_user();

        let details = document().eval("rollout", "".into(), Some(&user), &sharder("u1", 10));

        assert_eq!(details.value, SettingValue::from("beta"));
        assert_eq!(details.variation_id.as_deref(), Some("v-beta"));
        assert_eq!(details.matched_targeting_rule, Some(0));
        assert_eq!(details.matched_percentage_option, None);
    }

    #[test]
    fn percentage_options_split_by_bucket() {
        let user = EvaluationContext::with_targeting_key("u1").to_user();

        let low = document().eval("rollout", "".into(), Some(&user), &sharder("u1", 29));
        assert_eq!(low.value, SettingValue::from("a"));
        assert_eq!(low.matched_percentage_option, Some(0));

        let high = document().eval("rollout", "".into(), Some(&user), &sharder("u1", 30));
        assert_eq!(high.value, SettingValue::from("b"));
        assert_eq!(high.variation_id.as_deref(), Some("v-b"));
        assert_eq!(high.matched_percentage_option, Some(1));
    }

    #[test]
    fn no_user_serves_setting_value() {
        let details = document().eval("rollout", "".into(), None, &Md5Sharder);
        assert_eq!(details.value, SettingValue::from("off"));
        assert_eq!(details.variation_id.as_deref(), Some("v-off"));
        assert_eq!(details.matched_targeting_rule, None);
        assert_eq!(details.matched_percentage_option, None);
        assert_eq!(details.error_code, EngineErrorCode::None);
    }

    #[test]
    fn missing_key_lists_available_keys() {
        let details = document().eval("nope", false.into(), None, &Md5Sharder);
        assert_eq!(details.error_code, EngineErrorCode::SettingKeyMissing);
        assert_eq!(details.value, SettingValue::Bool(false));
        let message = details.error.unwrap();
        assert!(message.contains("Failed to evaluate setting 'nope' (the key was not found in config JSON)"));
        assert!(message.contains("Available keys: ['broken', 'rollout', 'unknown']"));
    }

    #[test]
    fn type_mismatch_serves_default() {
        let details = document().eval("rollout", 3.5.into(), None, &Md5Sharder);
        assert_eq!(details.error_code, EngineErrorCode::SettingValueTypeMismatch);
        assert_eq!(details.value, SettingValue::Double(3.5));
        assert!(details.error.unwrap().contains("Setting's type was String"));
    }

    #[test]
    fn invalid_settings_are_config_errors() {
        let broken = document().eval("broken", SettingValue::Int(1), None, &Md5Sharder);
        assert_eq!(broken.error_code, EngineErrorCode::InvalidConfigModel);
        assert_eq!(broken.value, SettingValue::Int(1));

        let unknown = document().eval("unknown", SettingValue::Int(1), None, &Md5Sharder);
        assert_eq!(unknown.error_code, EngineErrorCode::InvalidConfigModel);
    }

    #[test]
    fn empty_key_is_invalid_input() {
        let details = document().eval("", false.into(), None, &Md5Sharder);
        assert_eq!(details.error_code, EngineErrorCode::InvalidUserInput);
    }
}
