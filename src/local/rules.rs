use chrono::{DateTime, Utc};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::{local::document::RawValue, User, Value};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Condition {
    pub operator: Operator,
    pub attribute: String,
    pub value: ConditionValue,
}

impl Condition {
    pub fn eval(&self, user: &User) -> bool {
        self.operator
            .eval(user.attribute(&self.attribute).as_ref(), &self.value)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub(crate) enum ConditionValue {
    Multiple(Vec<RawValue>),
    Single(RawValue),
}

impl<T: Into<RawValue>> From<T> for ConditionValue {
    fn from(value: T) -> Self {
        Self::Single(value.into())
    }
}
impl<T: Into<RawValue>> From<Vec<T>> for ConditionValue {
    fn from(value: Vec<T>) -> Self {
        Self::Multiple(value.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Operator {
    Matches,
    NotMatches,
    Gte,
    Gt,
    Lte,
    Lt,
    OneOf,
    NotOneOf,
    IsNull,
    Before,
    After,
}

impl Operator {
    /// Applying `Operator` to the values. Returns `false` if the operator cannot be applied or
    /// there's a misconfiguration.
    pub fn eval(&self, attribute: Option<&Value>, condition_value: &ConditionValue) -> bool {
        self.try_eval(attribute, condition_value).unwrap_or(false)
    }

    /// Try applying `Operator` to the values, returning `None` if the operator cannot be applied.
    fn try_eval(&self, attribute: Option<&Value>, condition_value: &ConditionValue) -> Option<bool> {
        match self {
            Self::Matches | Self::NotMatches => {
                let s = attribute?.as_str()?;
                let regex = match condition_value {
                    ConditionValue::Single(RawValue::String(s)) => Regex::new(s).ok()?,
                    _ => return None,
                };
                let matches = regex.is_match(s);
                Some(if *self == Self::Matches {
                    matches
                } else {
                    !matches
                })
            }

            Self::OneOf | Self::NotOneOf => {
                let s = match attribute? {
                    Value::String(s) => s.clone(),
                    Value::Integer(i) => i.to_string(),
                    Value::Double(n) => n.to_string(),
                    Value::Boolean(b) => b.to_string(),
                    _ => return None,
                };
                let values = match condition_value {
                    ConditionValue::Multiple(v) => v,
                    _ => return None,
                };
                let is_one_of = values
                    .iter()
                    .any(|v| matches!(v, RawValue::String(v) if v == &s));
                Some(if *self == Self::OneOf {
                    is_one_of
                } else {
                    !is_one_of
                })
            }

            Self::IsNull => {
                let is_null = attribute.map_or(true, Value::is_null);
                match condition_value {
                    ConditionValue::Single(RawValue::Boolean(true)) => Some(is_null),
                    ConditionValue::Single(RawValue::Boolean(false)) => Some(!is_null),
                    _ => None,
                }
            }

            Self::Gte | Self::Gt | Self::Lte | Self::Lt => {
                let condition_version = match condition_value {
                    ConditionValue::Single(RawValue::String(s)) => Version::parse(s).ok(),
                    _ => None,
                };

                if let Some(condition_version) = condition_version {
                    // semver comparison
                    let attribute_version = Version::parse(attribute?.as_str()?).ok()?;
                    Some(self.compare(&attribute_version, &condition_version))
                } else {
                    // numeric comparison
                    let condition_value = match condition_value {
                        ConditionValue::Single(RawValue::Number(n)) => *n,
                        ConditionValue::Single(RawValue::String(s)) => s.parse().ok()?,
                        _ => return None,
                    };
                    let attribute_value = match attribute? {
                        Value::Double(n) => *n,
                        Value::Integer(i) => *i as f64,
                        Value::String(s) => s.parse().ok()?,
                        _ => return None,
                    };
                    Some(self.compare(&attribute_value, &condition_value))
                }
            }

            Self::Before | Self::After => {
                let condition_date = match condition_value {
                    ConditionValue::Single(RawValue::String(s)) => parse_date(s)?,
                    ConditionValue::Single(RawValue::Number(seconds)) => {
                        DateTime::from_timestamp(*seconds as i64, 0)?
                    }
                    _ => return None,
                };
                let attribute_date = match attribute? {
                    Value::Date(d) => *d,
                    Value::String(s) => parse_date(s)?,
                    _ => return None,
                };
                Some(if *self == Self::Before {
                    attribute_date < condition_date
                } else {
                    attribute_date > condition_date
                })
            }
        }
    }

    fn compare<T: PartialOrd>(&self, attribute: &T, condition: &T) -> bool {
        match self {
            Self::Gt => attribute > condition,
            Self::Gte => attribute >= condition,
            Self::Lt => attribute < condition,
            Self::Lte => attribute <= condition,
            _ => false,
        }
    }
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}
