//! A lock-protected cell for state shared between caller threads and client callbacks.
use std::sync::{Mutex, MutexGuard, PoisonError};

/// `Synced` holds a single value behind its own mutex.
///
/// Each operation takes the lock for the duration of the operation only. Values are cloned out
/// before the lock is released, so a guard is never held while calling user code or the
/// configuration client.
#[derive(Debug, Default)]
pub(crate) struct Synced<T> {
    value: Mutex<T>,
}

impl<T> Synced<T> {
    pub fn new(value: T) -> Self {
        Synced {
            value: Mutex::new(value),
        }
    }

    fn lock(&self) -> MutexGuard<'_, T> {
        // The stored value is always replaced whole, so a panic in another thread cannot leave it
        // half-written. Recover the guard instead of propagating the poison.
        self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.lock().clone()
    }

    pub fn set(&self, value: T) {
        // Dropping the previous value after unlocking keeps the critical section short.
        let _previous = self.get_and_set(value);
    }

    /// Replace the stored value with `new` iff it currently equals `expect`. Returns `true` if
    /// the swap happened.
    pub fn test_and_set(&self, expect: &T, new: T) -> bool
    where
        T: PartialEq,
    {
        let mut slot = self.lock();
        if *slot == *expect {
            *slot = new;
            true
        } else {
            false
        }
    }

    /// Store `new`, returning the previous value.
    pub fn get_and_set(&self, new: T) -> T {
        let mut slot = self.lock();
        std::mem::replace(&mut *slot, new)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    };

    use super::Synced;

    #[test]
    fn get_returns_last_set_value() {
        let cell = Synced::new(Some("a".to_owned()));
        cell.set(Some("b".to_owned()));
        assert_eq!(cell.get(), Some("b".to_owned()));
        cell.set(None);
        assert_eq!(cell.get(), None);
    }

    #[test]
    fn test_and_set_swaps_only_on_expected_value() {
        let cell = Synced::new(false);
        assert!(cell.test_and_set(&false, true));
        assert!(cell.get());
        assert!(!cell.test_and_set(&false, true));
        assert!(cell.get());
    }

    #[test]
    fn get_and_set_returns_previous_value() {
        let cell = Synced::new(1);
        assert_eq!(cell.get_and_set(2), 1);
        assert_eq!(cell.get_and_set(3), 2);
        assert_eq!(cell.get(), 3);
    }

    #[test]
    fn test_and_set_has_single_winner_across_threads() {
        const THREADS: usize = 16;

        let cell = Arc::new(Synced::new(false));
        let winners = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles = (0..THREADS)
            .map(|_| {
                let cell = cell.clone();
                let winners = winners.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    if cell.test_and_set(&false, true) {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect::<Vec<_>>();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(winners.load(Ordering::SeqCst), 1);
        assert!(cell.get());
    }

    #[test]
    fn survives_panic_in_another_thread() {
        let cell = Arc::new(Synced::new(7));
        {
            let cell = cell.clone();
            let _ = std::thread::spawn(move || {
                let _guard = cell.lock();
                panic!("poison the lock");
            })
            .join();
        }
        assert_eq!(cell.get(), 7);
        cell.set(8);
        assert_eq!(cell.get(), 8);
    }
}
