//! A ConfigCat provider for OpenFeature-style feature flag evaluation.
//!
//! # Overview
//!
//! [`ConfigCatProvider`] adapts a configuration client ([`client::ConfigClient`]) to the provider
//! contract: typed evaluation methods that never fail, a one-time [`ProviderEvent::Ready`]
//! notification and evaluation-context handling. An [`EvaluationContext`] is projected into the
//! client's native [`User`], and every engine result is normalized into a
//! [`ProviderEvaluation`] carrying a [`Reason`], an optional [`ErrorCode`] and the variant.
//!
//! [`LocalClient`] is the bundled client. It evaluates an override [`Document`] set in process
//! or polled from a [`ConfigSource`].
//!
//! # Error Handling
//!
//! Flag evaluation never returns an error: failures are reported in the returned
//! [`ProviderEvaluation`] together with the caller's default value. The [`Error`] enum is only
//! returned when loading documents or managing a [`LocalClient`].
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate with the `configcat`
//! target. Consider integrating a `log`-compatible logger implementation for better visibility
//! into provider operations.
//!
//! # Examples
//!
//! A runnable example lives in `demos/simple/main.rs` (`cargo run --example simple`).

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

pub mod client;
mod config;
mod context;
mod error;
mod evaluation;
mod events;
mod local;
mod provider;
mod synced;
mod value;

pub use config::LocalClientConfig;
pub use context::{EvaluationContext, User, COUNTRY_ATTRIBUTE, EMAIL_ATTRIBUTE};
pub use error::{Error, Result};
pub use evaluation::{ErrorCode, ProviderEvaluation, Reason};
pub use events::{EventStream, ProviderEvent, EVENT_CHANNEL_CAPACITY};
pub use local::{ConfigSource, Document, LocalClient, LocalSnapshot, SingleValueCache};
pub use provider::{ConfigCatProvider, ProviderMetadata};
pub use value::Value;
