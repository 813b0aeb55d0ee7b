use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Value;

/// Attribute name whose string value is projected into [`User::email`].
pub const EMAIL_ATTRIBUTE: &str = "Email";
/// Attribute name whose string value is projected into [`User::country`].
pub const COUNTRY_ATTRIBUTE: &str = "Country";

/// Evaluation context supplied by the host application.
///
/// # Examples
/// ```
/// # use configcat_openfeature::{EvaluationContext, Value};
/// let context = EvaluationContext::with_targeting_key("user-42")
///     .with_attribute("Email", "user@example.com")
///     .with_attribute("beta", true);
/// assert_eq!(context.targeting_key(), "user-42");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
    targeting_key: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, Value>,
}

impl EvaluationContext {
    /// Create an empty context without a targeting key.
    pub fn new() -> Self {
        EvaluationContext::default()
    }

    /// Create a context identified by `targeting_key`.
    pub fn with_targeting_key(targeting_key: impl Into<String>) -> Self {
        EvaluationContext {
            targeting_key: Some(targeting_key.into()),
            attributes: HashMap::new(),
        }
    }

    /// Add (or replace) an attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Targeting key of the context. Empty if the context has none.
    pub fn targeting_key(&self) -> &str {
        self.targeting_key.as_deref().unwrap_or_default()
    }

    /// Attribute stored under `key`.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// All attributes of the context.
    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Project this context into the [`User`] shape understood by the evaluation engine.
    ///
    /// [`EMAIL_ATTRIBUTE`] and [`COUNTRY_ATTRIBUTE`] become the dedicated user fields when they
    /// hold strings; a non-string value under those names is left in the custom map. Null
    /// attributes are dropped.
    pub fn to_user(&self) -> User {
        let email = self.string_attribute(EMAIL_ATTRIBUTE);
        let country = self.string_attribute(COUNTRY_ATTRIBUTE);

        let custom = self
            .attributes
            .iter()
            .filter(|(key, value)| {
                !value.is_null()
                    && !(key.as_str() == EMAIL_ATTRIBUTE && email.is_some())
                    && !(key.as_str() == COUNTRY_ATTRIBUTE && country.is_some())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        User {
            identifier: self.targeting_key().to_owned(),
            email,
            country,
            custom,
        }
    }

    fn string_attribute(&self, key: &str) -> Option<String> {
        self.attribute(key)
            .and_then(Value::as_str)
            .map(str::to_owned)
    }
}

/// User object passed to the evaluation engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier, taken from the targeting key.
    pub identifier: String,
    /// Email address, from a string `Email` attribute.
    pub email: Option<String>,
    /// Country, from a string `Country` attribute.
    pub country: Option<String>,
    /// Every other non-null attribute.
    pub custom: HashMap<String, Value>,
}

impl User {
    /// Look up an attribute the way targeting conditions address it.
    ///
    /// `Identifier`, `Email` and `Country` resolve to the dedicated fields, everything else to the
    /// custom map. An unset `Email` or `Country` falls back to a non-string value kept in the
    /// custom map under the same name.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let dedicated = match name {
            "Identifier" => return Some(Value::String(self.identifier.clone())),
            EMAIL_ATTRIBUTE => self.email.as_ref(),
            COUNTRY_ATTRIBUTE => self.country.as_ref(),
            _ => None,
        };
        match dedicated {
            Some(value) => Some(Value::String(value.clone())),
            None => self.custom.get(name).cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use crate::{EvaluationContext, Value};

    #[test]
    fn projects_targeting_key_and_custom_attributes() {
        let date = Utc.with_ymd_and_hms(2025, 5, 30, 10, 15, 30).unwrap();
        let context = EvaluationContext::with_targeting_key("example@matching.com")
            .with_attribute("custom1", "something")
            .with_attribute("custom2", true)
            .with_attribute("custom3", 5i64)
            .with_attribute("custom4", 1.2)
            .with_attribute(
                "custom5",
                vec![Value::Integer(1), Value::Integer(2)],
            )
            .with_attribute("custom6", date);

        let user = context.to_user();

        assert_eq!(user.identifier, "example@matching.com");
        assert_eq!(user.attribute("custom1"), Some(Value::from("something")));
        assert_eq!(user.attribute("custom2"), Some(Value::Boolean(true)));
        assert_eq!(user.attribute("custom3"), Some(Value::Integer(5)));
        assert_eq!(user.attribute("custom4"), Some(Value::Double(1.2)));
        assert_eq!(
            user.attribute("custom5"),
            Some(Value::List(vec![Value::Integer(1), Value::Integer(2)]))
        );
        assert_eq!(user.attribute("custom6"), Some(Value::Date(date)));
    }

    #[test]
    fn projects_email_and_country() {
        let context = EvaluationContext::with_targeting_key("example@matching.com")
            .with_attribute("Email", "x")
            .with_attribute("Country", "Hungary");

        let user = context.to_user();

        assert_eq!(user.identifier, "example@matching.com");
        assert_eq!(user.email.as_deref(), Some("x"));
        assert_eq!(user.country.as_deref(), Some("Hungary"));
        assert!(user.custom.is_empty());
        assert_eq!(user.attribute("Email"), Some(Value::from("x")));
    }

    #[test]
    fn non_string_email_is_not_an_email() {
        let context =
            EvaluationContext::with_targeting_key("id").with_attribute("Email", 42i64);

        let user = context.to_user();

        assert_eq!(user.email, None);
        assert_eq!(user.custom.get("Email"), Some(&Value::Integer(42)));
        assert_eq!(user.attribute("Email"), Some(Value::Integer(42)));
    }

    #[test]
    fn dedicated_fields_win_attribute_lookup() {
        let user = EvaluationContext::with_targeting_key("id")
            .with_attribute("Country", "HU")
            .to_user();

        assert_eq!(user.attribute("Identifier"), Some(Value::from("id")));
        assert_eq!(user.attribute("Country"), Some(Value::from("HU")));
        assert_eq!(user.attribute("Email"), None);
    }

    #[test]
    fn drops_null_attributes() {
        let context = EvaluationContext::with_targeting_key("id")
            .with_attribute("present", "yes")
            .with_attribute("missing", Value::Null)
            .with_attribute("Country", Value::Null);

        let user = context.to_user();

        assert_eq!(user.custom.len(), 1);
        assert!(user.custom.contains_key("present"));
        assert_eq!(user.country, None);
    }

    #[test]
    fn missing_targeting_key_maps_to_empty_identifier() {
        let user = EvaluationContext::new().to_user();
        assert_eq!(user.identifier, "");
        assert_eq!(user.attribute("Identifier"), Some(Value::from("")));
    }
}
