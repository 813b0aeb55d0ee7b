//! A thread-safe in-memory storage for the currently active override document.
use std::sync::{Arc, RwLock};

use crate::{client::CacheState, local::LocalSnapshot};

/// `ConfigurationStore` provides a thread-safe (`Sync`) storage for the current
/// [`LocalSnapshot`] that allows concurrent access for readers and writers.
///
/// Snapshots are immutable and can only be replaced completely.
#[derive(Debug)]
pub(crate) struct ConfigurationStore {
    snapshot: RwLock<LocalSnapshot>,
}

impl ConfigurationStore {
    pub fn new() -> Self {
        ConfigurationStore {
            snapshot: RwLock::new(LocalSnapshot {
                document: None,
                cache_state: CacheState::NoFlagData,
            }),
        }
    }

    pub fn get_snapshot(&self) -> LocalSnapshot {
        // A writer never panics while holding the lock (it only swaps an Arc), so recovering from
        // poison is safe.
        let snapshot = self
            .snapshot
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        snapshot.clone()
    }

    /// Set new snapshot, returning the previous one.
    pub fn set_snapshot(&self, snapshot: LocalSnapshot) -> LocalSnapshot {
        let mut slot = self
            .snapshot
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::mem::replace(&mut slot, snapshot)
    }
}

impl LocalSnapshot {
    pub(crate) fn loaded(document: Arc<crate::local::Document>, cache_state: CacheState) -> Self {
        LocalSnapshot {
            document: Some(document),
            cache_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::ConfigurationStore;
    use crate::{
        client::{CacheState, ConfigSnapshot},
        local::{Document, LocalSnapshot},
    };

    #[test]
    fn can_set_snapshot_from_another_thread() {
        let store = Arc::new(ConfigurationStore::new());

        assert_eq!(store.get_snapshot().cache_state(), CacheState::NoFlagData);

        {
            let store = store.clone();
            let _ = std::thread::spawn(move || {
                store.set_snapshot(LocalSnapshot::loaded(
                    Arc::new(Document::default()),
                    CacheState::HasLocalOverrideFlagDataOnly,
                ))
            })
            .join();
        }

        assert_eq!(
            store.get_snapshot().cache_state(),
            CacheState::HasLocalOverrideFlagDataOnly
        );
    }

    #[test]
    fn set_returns_previous_snapshot() {
        let store = ConfigurationStore::new();
        let previous = store.set_snapshot(LocalSnapshot::loaded(
            Arc::new(Document::default()),
            CacheState::HasCachedFlagDataOnly,
        ));
        assert!(previous.document().is_none());
    }
}
