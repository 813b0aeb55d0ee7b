//! Interfaces of the flag configuration client that [`ConfigCatProvider`](crate::ConfigCatProvider)
//! builds on.
//!
//! The client owns fetching, caching and polling of configuration; the snapshot it hands out owns
//! flag evaluation. The provider only pulls snapshots, registers a change hook and waits for the
//! client's readiness barrier. [`LocalClient`](crate::LocalClient) is an in-process
//! implementation.
use std::{fmt, future::Future};

use derive_more::From;
use serde::{Deserialize, Serialize};

use crate::User;

/// How much flag data a client currently has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CacheState {
    /// No configuration has been loaded yet.
    NoFlagData,
    /// Only locally supplied overrides are available.
    HasLocalOverrideFlagDataOnly,
    /// Configuration came from a cache and may be stale.
    HasCachedFlagDataOnly,
    /// Configuration is up to date.
    HasUpToDateFlagData,
}

impl CacheState {
    /// Return `true` if flags can be evaluated against real data.
    pub fn has_data(self) -> bool {
        self != CacheState::NoFlagData
    }
}

/// Error reported by the evaluation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineErrorCode {
    /// Evaluation succeeded.
    None,
    /// The caller passed an invalid key or user.
    InvalidUserInput,
    /// An unexpected failure inside the engine.
    UnexpectedError,
    /// The configuration is malformed for this setting.
    InvalidConfigModel,
    /// The setting's type differs from the type of the default value.
    SettingValueTypeMismatch,
    /// No configuration is available.
    ConfigJsonNotAvailable,
    /// The key is not present in the configuration.
    SettingKeyMissing,
}

/// Type tag of a [`SettingValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    /// On/off flag.
    Boolean,
    /// Text setting.
    String,
    /// Whole number setting.
    Int,
    /// Decimal number setting.
    Double,
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettingType::Boolean => "Boolean",
            SettingType::String => "String",
            SettingType::Int => "Int",
            SettingType::Double => "Double",
        };
        f.write_str(name)
    }
}

/// A value as the evaluation engine represents it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, From)]
#[serde(untagged)]
pub enum SettingValue {
    /// Value of a [`SettingType::Boolean`] setting.
    Bool(bool),
    /// Value of a [`SettingType::String`] setting.
    String(String),
    /// The engine's native integer is 32 bits wide.
    Int(i32),
    /// Value of a [`SettingType::Double`] setting.
    Double(f64),
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl SettingValue {
    /// The [`SettingType`] this value belongs to.
    pub fn setting_type(&self) -> SettingType {
        match self {
            SettingValue::Bool(_) => SettingType::Boolean,
            SettingValue::String(_) => SettingType::String,
            SettingValue::Int(_) => SettingType::Int,
            SettingValue::Double(_) => SettingType::Double,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::String(s) => f.write_str(s),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Double(d) => write!(f, "{d}"),
        }
    }
}

/// Result of a single evaluation, as reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationDetails {
    /// Key of the evaluated setting.
    pub key: String,
    /// Evaluated value. Holds the default value passed to the engine when `error_code` is not
    /// [`EngineErrorCode::None`].
    pub value: SettingValue,
    /// Variation that produced the value. `None` on error.
    pub variation_id: Option<String>,
    /// Index of the targeting rule that produced the value.
    pub matched_targeting_rule: Option<usize>,
    /// Index of the percentage option that produced the value.
    pub matched_percentage_option: Option<usize>,
    /// [`EngineErrorCode::None`] unless evaluation failed.
    pub error_code: EngineErrorCode,
    /// Human readable description of the failure.
    pub error: Option<String>,
}

impl EvaluationDetails {
    /// Details of a failed evaluation that falls back to `default`.
    pub fn from_error(
        key: impl Into<String>,
        default: SettingValue,
        error_code: EngineErrorCode,
        error: impl Into<String>,
    ) -> Self {
        EvaluationDetails {
            key: key.into(),
            value: default,
            variation_id: None,
            matched_targeting_rule: None,
            matched_percentage_option: None,
            error_code,
            error: Some(error.into()),
        }
    }
}

/// An immutable view of the configuration loaded at some point in time.
pub trait ConfigSnapshot: Send + Sync {
    /// How much flag data this snapshot holds.
    fn cache_state(&self) -> CacheState;

    /// Evaluate `key` for `user`. Never fails; errors are reported in the returned details along
    /// with `default`.
    fn get_value_details(
        &self,
        key: &str,
        default: SettingValue,
        user: Option<&User>,
    ) -> EvaluationDetails;
}

/// Returned by a [`ConfigChangedHook`] to tell the client whether to keep calling it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookStatus {
    /// Keep the hook registered.
    Keep,
    /// The hook has no receiver left. The client may unregister it.
    Remove,
}

/// Hook invoked with the new snapshot whenever a client's configuration changes.
pub type ConfigChangedHook<S> = Box<dyn Fn(S) -> HookStatus + Send + Sync>;

/// The configuration client a provider delegates to.
pub trait ConfigClient: Send + Sync + 'static {
    /// Snapshot type handed out by the client.
    type Snapshot: ConfigSnapshot + Clone + Send + Sync + 'static;

    /// Get a snapshot of the current configuration without waiting.
    fn snapshot(&self) -> Self::Snapshot;

    /// Register `hook` to be called, possibly from a background thread, with every new
    /// configuration snapshot. Hooks are called in the order the client stored the snapshots,
    /// and a hook returning [`HookStatus::Remove`] may be dropped.
    fn on_config_changed(&self, hook: ConfigChangedHook<Self::Snapshot>);

    /// Resolve once the client finished its initial load, with the resulting cache state.
    fn wait_for_ready(&self) -> impl Future<Output = CacheState> + Send;
}
