use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::{OnceError, OnceInitializer, OncePolicy, OnceState, SyncLock};

/// Keyed collection of [`OnceInitializer`]s.
///
/// Collaborators that need lazy, race-free setup (opening a log sink,
/// loading a table) call [`OnceRegistry::run_once`] with a stable key instead
/// of carrying their own once-flag around. The registry lock is only held
/// while looking up the entry, never while an initializer runs, so one slow
/// initializer does not block unrelated keys.
#[derive(Default)]
pub struct OnceRegistry {
    policy: OncePolicy,
    entries: SyncLock<HashMap<String, Arc<OnceInitializer>>>,
}

impl OnceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(OncePolicy::Retry)
    }

    #[must_use]
    pub fn with_policy(policy: OncePolicy) -> Self {
        Self {
            policy,
            entries: SyncLock::new(HashMap::new()),
        }
    }

    /// Runs `init` once for `key`; see [`OnceInitializer::run`].
    ///
    /// # Errors
    ///
    /// Propagates the [`OnceError`] from the key's initializer.
    pub fn run_once<F, E>(&self, key: &str, init: F) -> Result<(), OnceError<E>>
    where
        F: FnOnce() -> Result<(), E>,
        E: fmt::Display,
    {
        let initializer = self.entry(key);
        initializer.run(init)
    }

    /// Current state for `key`; unknown keys report `NotStarted`.
    #[must_use]
    pub fn state(&self, key: &str) -> OnceState {
        self.entries.with(|entries| {
            entries
                .get(key)
                .map_or(OnceState::NotStarted, |initializer| initializer.state())
        })
    }

    #[must_use]
    pub fn is_done(&self, key: &str) -> bool {
        self.state(key) == OnceState::Done
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.with(|entries| entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, key: &str) -> Arc<OnceInitializer> {
        let mut entries = self.entries.lock();
        Arc::clone(
            entries
                .entry(key.to_owned())
                .or_insert_with(|| Arc::new(OnceInitializer::with_policy(self.policy))),
        )
    }
}

impl fmt::Debug for OnceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceRegistry")
            .field("policy", &self.policy)
            .field("keys", &self.len())
            .finish()
    }
}
