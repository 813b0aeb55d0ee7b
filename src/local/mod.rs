//! An in-process [`ConfigClient`] serving flags from an override [`Document`].
//!
//! The document is either set directly ([`LocalClient::from_json`], [`LocalClient::set_json`]) or
//! polled from a [`ConfigSource`] by a background thread ([`LocalClient::with_source`]).
use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use tokio::sync::watch;

use crate::{
    client::{
        CacheState, ConfigChangedHook, ConfigClient, ConfigSnapshot, EngineErrorCode,
        EvaluationDetails, HookStatus, SettingValue,
    },
    LocalClientConfig, Result, User,
};

mod configuration_store;
mod document;
mod eval;
mod poller;
mod rules;
mod sharder;

pub use document::Document;

use configuration_store::ConfigurationStore;
use poller::PollerThread;
use sharder::Md5Sharder;

/// Configuration loaded by a [`LocalClient`] at some point in time.
#[derive(Debug, Clone)]
pub struct LocalSnapshot {
    document: Option<Arc<Document>>,
    cache_state: CacheState,
}

impl LocalSnapshot {
    /// The loaded document, if any.
    pub fn document(&self) -> Option<&Document> {
        self.document.as_deref()
    }
}

impl ConfigSnapshot for LocalSnapshot {
    fn cache_state(&self) -> CacheState {
        self.cache_state
    }

    fn get_value_details(
        &self,
        key: &str,
        default: SettingValue,
        user: Option<&User>,
    ) -> EvaluationDetails {
        let Some(document) = &self.document else {
            log::debug!(target: "configcat", flag_key = key; "no configuration loaded");
            let message = format!(
                "Config JSON is not present when evaluating setting '{key}'. Returning the `defaultValue` parameter that you specified in your application: '{default}'."
            );
            return EvaluationDetails::from_error(
                key,
                default,
                EngineErrorCode::ConfigJsonNotAvailable,
                message,
            );
        };
        document.eval(key, default, user, &Md5Sharder)
    }
}

/// Where a polling [`LocalClient`] reads override JSON from.
///
/// `None` or blank text means there is no configuration yet. Any `Fn() -> Option<String>` closure
/// is a source.
pub trait ConfigSource: Send + Sync {
    /// Read the current override JSON.
    fn read(&self) -> Option<String>;
}

impl<F> ConfigSource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn read(&self) -> Option<String> {
        self()
    }
}

/// A [`ConfigSource`] holding a single JSON text that can be overwritten at any time.
#[derive(Debug, Default)]
pub struct SingleValueCache {
    value: Mutex<String>,
}

impl SingleValueCache {
    /// Create a cache holding `value`.
    pub fn new(value: impl Into<String>) -> SingleValueCache {
        SingleValueCache {
            value: Mutex::new(value.into()),
        }
    }

    /// Replace the stored text. A polling client picks it up on its next poll.
    pub fn write(&self, value: impl Into<String>) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = value.into();
    }
}

impl ConfigSource for SingleValueCache {
    fn read(&self) -> Option<String> {
        let value = self.value.lock().unwrap_or_else(PoisonError::into_inner);
        Some(value.clone())
    }
}

type SharedHook = Arc<dyn Fn(LocalSnapshot) -> HookStatus + Send + Sync>;

/// State shared between a [`LocalClient`] and its poller thread.
pub(crate) struct ClientShared {
    store: ConfigurationStore,
    hooks: RwLock<Vec<SharedHook>>,
    /// Serializes publishes from the poller and `set_*` callers.
    publishing: Mutex<()>,
    /// Becomes `true` after the first load attempt.
    loaded: watch::Sender<bool>,
}

impl ClientShared {
    fn new() -> ClientShared {
        let (loaded, _) = watch::channel(false);
        ClientShared {
            store: ConfigurationStore::new(),
            hooks: RwLock::new(Vec::new()),
            publishing: Mutex::new(()),
            loaded,
        }
    }

    /// Store `document` and notify every registered hook.
    ///
    /// The store write and the hook calls happen under one lock, so hooks observe snapshots in
    /// the order they were stored. Hooks may read from the client but must not publish.
    pub(crate) fn publish(&self, document: Document, cache_state: CacheState) {
        let _publishing = self
            .publishing
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let snapshot = LocalSnapshot::loaded(Arc::new(document), cache_state);
        self.store.set_snapshot(snapshot.clone());
        self.mark_loaded();

        // The hook list lock is released before calling so hooks may register new hooks.
        let hooks = self
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        log::trace!(target: "configcat", hooks = hooks.len(); "configuration changed");
        let mut removed = Vec::new();
        for hook in hooks {
            if hook(snapshot.clone()) == HookStatus::Remove {
                removed.push(hook);
            }
        }

        if !removed.is_empty() {
            log::debug!(target: "configcat", removed = removed.len(); "unregistering change hooks");
            self.hooks
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|hook| !removed.iter().any(|dead| Arc::ptr_eq(hook, dead)));
        }
    }

    pub(crate) fn mark_loaded(&self) {
        self.loaded.send_if_modified(|loaded| !std::mem::replace(loaded, true));
    }
}

/// A [`ConfigClient`] evaluating a locally supplied [`Document`].
///
/// Documents set directly report [`CacheState::HasLocalOverrideFlagDataOnly`]; documents read by
/// the poller report [`CacheState::HasCachedFlagDataOnly`]. Only the settings, targeting rules and
/// percentage options of the document are supported.
///
/// # Examples
/// ```
/// # use configcat_openfeature::{client::{CacheState, ConfigClient, ConfigSnapshot}, LocalClient};
/// let client = LocalClient::new();
/// assert_eq!(client.snapshot().cache_state(), CacheState::NoFlagData);
///
/// client.set_json(r#"{"settings": {"flag": {"type": "boolean", "value": true}}}"#).unwrap();
/// assert_eq!(client.snapshot().cache_state(), CacheState::HasLocalOverrideFlagDataOnly);
/// ```
pub struct LocalClient {
    shared: Arc<ClientShared>,
    poller: Mutex<Option<PollerThread>>,
}

impl LocalClient {
    /// Create a client with no configuration. [`ConfigClient::wait_for_ready`] resolves once a
    /// document is set.
    pub fn new() -> LocalClient {
        LocalClient {
            shared: Arc::new(ClientShared::new()),
            poller: Mutex::new(None),
        }
    }

    /// Create a client serving the document parsed from `json`.
    pub fn from_json(json: &str) -> Result<LocalClient> {
        let client = LocalClient::new();
        client.set_json(json)?;
        Ok(client)
    }

    /// Create a client and start polling `config.source` in a background thread.
    pub fn with_source(config: LocalClientConfig) -> Result<LocalClient> {
        log::debug!(target: "configcat",
                    interval:? = config.interval,
                    jitter:? = config.jitter;
                    "starting configuration poller");
        let shared = Arc::new(ClientShared::new());
        let poller = PollerThread::start(config, shared.clone())?;
        Ok(LocalClient {
            shared,
            poller: Mutex::new(Some(poller)),
        })
    }

    /// Replace the current configuration and notify change hooks.
    pub fn set_configuration(&self, document: Document) {
        self.shared
            .publish(document, CacheState::HasLocalOverrideFlagDataOnly);
    }

    /// Parse `json` and replace the current configuration with it. On error the current
    /// configuration is kept.
    pub fn set_json(&self, json: &str) -> Result<()> {
        let document = Document::from_json(json).map_err(|err| {
            log::warn!(target: "configcat", err:display = err; "failed to parse configuration");
            err
        })?;
        self.set_configuration(document);
        Ok(())
    }

    /// Stop the poller thread, if any, and wait for it to exit.
    pub fn shutdown(&self) -> Result<()> {
        let poller = self
            .poller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match poller {
            Some(poller) => poller.shutdown(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
impl LocalClient {
    pub(crate) fn hook_count(&self) -> usize {
        self.shared
            .hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LocalClient {
    fn default() -> Self {
        LocalClient::new()
    }
}

impl Drop for LocalClient {
    fn drop(&mut self) {
        if let Some(poller) = self
            .poller
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
        {
            poller.stop();
        }
    }
}

impl ConfigClient for LocalClient {
    type Snapshot = LocalSnapshot;

    fn snapshot(&self) -> LocalSnapshot {
        self.shared.store.get_snapshot()
    }

    fn on_config_changed(&self, hook: ConfigChangedHook<LocalSnapshot>) {
        self.shared
            .hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::from(hook));
    }

    fn wait_for_ready(&self) -> impl Future<Output = CacheState> + Send {
        let mut loaded = self.shared.loaded.subscribe();
        let shared = self.shared.clone();
        async move {
            // The sender lives in `shared`, so the channel cannot close while we wait.
            let _ = loaded.wait_for(|loaded| *loaded).await;
            shared.store.get_snapshot().cache_state
        }
    }
}
