//! A background thread that periodically re-reads a [`ConfigSource`] and publishes changed
//! documents to a [`LocalClient`](crate::LocalClient).
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::RecvTimeoutError,
        Arc,
    },
    time::Duration,
};

use rand::{thread_rng, Rng};

use crate::{
    client::CacheState,
    local::{ClientShared, ConfigSource, Document},
    Error, LocalClientConfig, Result,
};

pub(crate) struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::SyncSender<()>,

    panicked: Arc<AtomicBool>,
}

impl PollerThread {
    pub fn start(config: LocalClientConfig, shared: Arc<ClientShared>) -> Result<PollerThread> {
        // Buffer size of 1 is enough: a second stop command can be dropped with `try_send()`.
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);
        let panicked = Arc::new(AtomicBool::new(false));

        let join_handle = {
            let panicked = panicked.clone();
            std::thread::Builder::new()
                .name("configcat-poller".to_owned())
                .spawn(move || {
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        let mut last_read: Option<String> = None;
                        loop {
                            log::debug!(target: "configcat", "reading configuration source");
                            poll_once(config.source.as_ref(), &shared, &mut last_read);

                            let timeout = jitter(config.interval, config.jitter);
                            match stop_receiver.recv_timeout(timeout) {
                                Err(RecvTimeoutError::Timeout) => {
                                    // Timed out. Loop back to read the source again.
                                }
                                Ok(()) => {
                                    log::debug!(target: "configcat", "poller thread received stop command");
                                    return;
                                }
                                Err(RecvTimeoutError::Disconnected) => {
                                    log::debug!(target: "configcat", "poller thread received disconnected");
                                    return;
                                }
                            }
                        }
                    }));

                    if result.is_err() {
                        log::error!(target: "configcat", "poller thread panicked");
                        panicked.store(true, Ordering::SeqCst);
                        // Waiters must not hang on a poller that is gone.
                        shared.mark_loaded();
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            panicked,
        })
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the thread already exited or another stop command is pending. Either
        // way the thread stops.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    pub fn shutdown(self) -> Result<()> {
        self.stop();

        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        if self.panicked.load(Ordering::SeqCst) {
            return Err(Error::PollerThreadPanicked);
        }
        Ok(())
    }
}

/// Read the source once and publish the document if it changed since `last_read`.
fn poll_once(source: &dyn ConfigSource, shared: &ClientShared, last_read: &mut Option<String>) {
    let text = source.read().filter(|text| !text.trim().is_empty());

    if text != *last_read {
        match &text {
            Some(json) => match Document::from_json(json) {
                Ok(document) => {
                    log::debug!(target: "configcat", "source changed, publishing new configuration");
                    shared.publish(document, CacheState::HasCachedFlagDataOnly);
                }
                Err(err) => {
                    log::warn!(target: "configcat", err:display = err; "failed to parse configuration from source");
                }
            },
            None => {
                log::debug!(target: "configcat", "configuration source is empty");
            }
        }
        *last_read = text;
    }

    shared.mark_loaded();
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}

#[cfg(test)]
mod jitter_tests {
    use std::time::Duration;

    #[test]
    fn jitter_is_subtractive() {
        let interval = Duration::from_secs(30);
        let jitter = Duration::from_secs(30);

        let result = super::jitter(interval, jitter);

        assert!(result <= interval, "{result:?} must be <= {interval:?}");
    }

    #[test]
    fn jitter_truncates_to_zero() {
        let result = super::jitter(Duration::ZERO, Duration::from_secs(30));

        assert_eq!(result, Duration::ZERO);
    }

    #[test]
    fn jitter_works_with_zero_jitter() {
        let interval = Duration::from_secs(30);

        let result = super::jitter(interval, Duration::ZERO);

        assert_eq!(result, Duration::from_secs(30));
    }
}
