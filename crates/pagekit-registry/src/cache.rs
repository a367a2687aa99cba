//! Single-flight cache controller
//!
//! The controller owns the `Empty -> Loading -> Warm` state machine. A load
//! in progress is represented by a shared future; every caller that arrives
//! while it runs awaits that same handle, so one reload serves all of them.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use time::{Duration, OffsetDateTime};
use tracing::debug;

use crate::clock::Clock;
use crate::error::RegistryError;

/// Why a shared load failed.
///
/// Every caller joined on the load receives a copy.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{source_name}: {reason}")]
pub struct LoadFailure {
    pub source_name: String,
    pub reason: String,
}

impl LoadFailure {
    pub fn new(source_name: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<LoadFailure> for RegistryError {
    fn from(failure: LoadFailure) -> Self {
        RegistryError::Load {
            source_name: failure.source_name,
            reason: failure.reason,
        }
    }
}

/// Handle to a load that callers can join
pub type LoadHandle<T> = Shared<BoxFuture<'static, Result<T, LoadFailure>>>;

enum CacheState<T: Clone> {
    Empty,
    Loading(LoadHandle<T>),
    Warm { loaded_at: OffsetDateTime },
}

/// Observable cache state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Empty,
    Loading,
    Warm {
        loaded_at: OffsetDateTime,
        expired: bool,
    },
}

pub struct CacheController<T: Clone> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<T>>,
}

impl<T> CacheController<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            state: Mutex::new(CacheState::Empty),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub(crate) fn set_clock(&mut self, clock: Arc<dyn Clock>) {
        self.clock = clock;
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, loaded_at: OffsetDateTime) -> bool {
        self.clock.now() - loaded_at >= self.ttl
    }

    /// Make sure the cache is warm.
    ///
    /// Returns `Ok(None)` on a fresh cache hit without calling `start`.
    /// Otherwise joins the in-flight load, or begins one with `start`, and
    /// returns its result. `install` runs at most once per load, under the
    /// state lock, and only if the cache was not cleared while loading.
    pub async fn load<S, I>(&self, force: bool, start: S, install: I) -> Result<Option<T>, LoadFailure>
    where
        S: FnOnce() -> BoxFuture<'static, Result<T, LoadFailure>>,
        I: FnOnce(T),
    {
        let handle = {
            let mut state = self.lock();
            let joined = match &*state {
                CacheState::Warm { loaded_at } if !force && !self.is_expired(*loaded_at) => {
                    debug!("Template cache hit");
                    return Ok(None);
                }
                CacheState::Loading(handle) => Some(handle.clone()),
                _ => None,
            };

            match joined {
                Some(handle) => {
                    debug!("Joining in-flight template load");
                    handle
                }
                None => {
                    debug!("Starting template load (force: {})", force);
                    let handle = start().shared();
                    *state = CacheState::Loading(handle.clone());
                    handle
                }
            }
        };

        let result = handle.clone().await;

        let mut state = self.lock();
        let current = matches!(&*state, CacheState::Loading(active) if active.ptr_eq(&handle));
        if current {
            match &result {
                Ok(value) => {
                    install(value.clone());
                    *state = CacheState::Warm {
                        loaded_at: self.clock.now(),
                    };
                }
                Err(_) => *state = CacheState::Empty,
            }
        } else if matches!(&*state, CacheState::Empty) {
            debug!("Template cache was cleared during load, discarding result");
        }

        result.map(Some)
    }

    /// Drop back to `Empty`, running `reset` under the state lock.
    ///
    /// A load still in flight keeps running for its callers but its result is
    /// not installed.
    pub fn clear(&self, reset: impl FnOnce()) {
        let mut state = self.lock();
        *state = CacheState::Empty;
        reset();
    }

    pub fn status(&self) -> CacheStatus {
        match &*self.lock() {
            CacheState::Empty => CacheStatus::Empty,
            CacheState::Loading(_) => CacheStatus::Loading,
            CacheState::Warm { loaded_at } => CacheStatus::Warm {
                loaded_at: *loaded_at,
                expired: self.is_expired(*loaded_at),
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.status(), CacheStatus::Warm { expired: false, .. })
    }

    pub fn last_updated(&self) -> Option<OffsetDateTime> {
        match self.status() {
            CacheStatus::Warm { loaded_at, .. } => Some(loaded_at),
            _ => None,
        }
    }
}

impl<T: Clone> fmt::Debug for CacheController<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            CacheState::Empty => "empty",
            CacheState::Loading(_) => "loading",
            CacheState::Warm { .. } => "warm",
        };
        f.debug_struct("CacheController")
            .field("ttl", &self.ttl)
            .field("state", &state)
            .finish()
    }
}
