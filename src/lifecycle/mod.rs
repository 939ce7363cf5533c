//! # Resource Lifecycle
//!
//! Every resource and every collection carries a [`Lifecycle`]: a small state machine
//! deciding whether its data is present or still has to be fetched.
//!
//! ```text
//! INITIALIZING(0) -> UNFETCHED(10) -> FETCHING(20) -> FETCHED(30)
//! ```
//!
//! - The state only ever moves forward.
//! - UNFETCHED -> FETCHING happens once, on the first fetch.
//! - FETCHING -> FETCHED happens when the network call settles, successful or not.
//! - While a fetch is in flight, every caller gets a clone of the same [`FetchHandle`].
//!
//! The state lives in a `tokio::sync::watch` channel, so a [`FetchHandle`] is simply a
//! receiver waiting for FETCHED. Nothing here spawns tasks or talks to the network;
//! resources and collections drive the transitions.

pub mod tracing;

use serde::Serialize;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use tokio::sync::watch;

/// Lifecycle states, ordered by rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[repr(u8)]
pub enum ResourceState {
    Initializing = 0,
    Unfetched = 10,
    Fetching = 20,
    Fetched = 30,
}

impl ResourceState {
    /// Integer rank of the state.
    pub fn rank(self) -> u8 {
        self as u8
    }
}

/// Outcome of [`Lifecycle::begin_fetch`].
#[derive(Debug)]
pub enum FetchStart {
    /// The caller moved the lifecycle to FETCHING and must now perform the fetch
    /// and call [`Lifecycle::settle`].
    Started(FetchHandle),
    /// A fetch is in flight or already settled; nothing to do.
    Joined(FetchHandle),
}

impl FetchStart {
    pub fn handle(&self) -> FetchHandle {
        match self {
            FetchStart::Started(handle) | FetchStart::Joined(handle) => handle.clone(),
        }
    }
}

/// State machine shared by resources and collections.
#[derive(Debug)]
pub struct Lifecycle {
    state: watch::Sender<ResourceState>,
    in_flight: Mutex<Option<FetchHandle>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Starts at INITIALIZING.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ResourceState::Initializing);
        Self {
            state,
            in_flight: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ResourceState {
        *self.state.borrow()
    }

    /// Ends construction: INITIALIZING -> UNFETCHED, unless the owner already advanced
    /// the state (pre-populated collections).
    pub fn initialized(&self) {
        self.state.send_if_modified(|state| {
            if *state == ResourceState::Initializing {
                *state = ResourceState::Unfetched;
                true
            } else {
                false
            }
        });
    }

    /// Marks the owner as already holding its data; no fetch will ever be issued.
    pub fn mark_fetched(&self) {
        self.state.send_replace(ResourceState::Fetched);
    }

    /// Claims the right to fetch.
    ///
    /// Only the first call made while UNFETCHED returns [`FetchStart::Started`]; every
    /// other call joins the stored handle.
    pub fn begin_fetch(&self) -> FetchStart {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = in_flight.as_ref() {
            return FetchStart::Joined(handle.clone());
        }

        let start = self.state.send_if_modified(|state| {
            if *state == ResourceState::Unfetched {
                *state = ResourceState::Fetching;
                true
            } else {
                false
            }
        });

        let handle = FetchHandle {
            state: self.state.subscribe(),
        };
        if start {
            *in_flight = Some(handle.clone());
            FetchStart::Started(handle)
        } else {
            FetchStart::Joined(handle)
        }
    }

    /// FETCHING -> FETCHED. Called once the network call settled, whatever its outcome.
    pub fn settle(&self) {
        self.state.send_replace(ResourceState::Fetched);
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState> {
        self.state.subscribe()
    }
}

/// Handle on a fetch; resolves once its owner reaches FETCHED.
///
/// Awaiting a handle for an owner that never starts fetching (still UNFETCHED) would
/// wait forever, so [`Lifecycle::begin_fetch`] is the only way to obtain one.
#[derive(Debug, Clone)]
pub struct FetchHandle {
    state: watch::Receiver<ResourceState>,
}

impl FetchHandle {
    pub fn is_settled(&self) -> bool {
        *self.state.borrow() == ResourceState::Fetched
    }

    /// Waits for the owner to reach FETCHED.
    pub async fn settled(mut self) {
        // A closed channel means the owner is gone; nothing left to wait for.
        let _ = self
            .state
            .wait_for(|state| *state == ResourceState::Fetched)
            .await;
    }
}

impl IntoFuture for FetchHandle {
    type Output = ();
    type IntoFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.settled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ranked() {
        assert_eq!(ResourceState::Initializing.rank(), 0);
        assert_eq!(ResourceState::Unfetched.rank(), 10);
        assert_eq!(ResourceState::Fetching.rank(), 20);
        assert_eq!(ResourceState::Fetched.rank(), 30);
        assert!(ResourceState::Unfetched < ResourceState::Fetching);
    }

    #[test]
    fn test_initialized_moves_to_unfetched_once() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ResourceState::Initializing);
        lifecycle.initialized();
        assert_eq!(lifecycle.state(), ResourceState::Unfetched);
    }

    #[test]
    fn test_initialized_keeps_an_advanced_state() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_fetched();
        lifecycle.initialized();
        assert_eq!(lifecycle.state(), ResourceState::Fetched);
    }

    #[test]
    fn test_only_first_begin_fetch_starts() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();

        assert!(matches!(lifecycle.begin_fetch(), FetchStart::Started(_)));
        assert_eq!(lifecycle.state(), ResourceState::Fetching);
        assert!(matches!(lifecycle.begin_fetch(), FetchStart::Joined(_)));
        assert!(matches!(lifecycle.begin_fetch(), FetchStart::Joined(_)));
        assert_eq!(lifecycle.state(), ResourceState::Fetching);
    }

    #[test]
    fn test_no_fetch_after_fetched() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();
        let _ = lifecycle.begin_fetch();
        lifecycle.settle();

        let again = lifecycle.begin_fetch();
        assert!(matches!(again, FetchStart::Joined(_)));
        assert!(again.handle().is_settled());
        assert_eq!(lifecycle.state(), ResourceState::Fetched);
    }

    #[test]
    fn test_pre_fetched_owner_never_starts() {
        let lifecycle = Lifecycle::new();
        lifecycle.mark_fetched();
        let start = lifecycle.begin_fetch();
        assert!(matches!(start, FetchStart::Joined(_)));
        assert!(start.handle().is_settled());
    }

    #[tokio::test]
    async fn test_handles_resolve_on_settle() {
        let lifecycle = Lifecycle::new();
        lifecycle.initialized();
        let first = lifecycle.begin_fetch().handle();
        let second = lifecycle.begin_fetch().handle();
        assert!(!first.is_settled());

        lifecycle.settle();
        first.await;
        second.await;
    }
}
