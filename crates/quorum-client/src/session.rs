//! Client-side auth state.
//!
//! The store holds the current token/user pair and broadcasts every change,
//! so pages can subscribe and guard their routes on sign-in and sign-out.

use quorum_common::entities::User;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(User),
    SignedOut,
}

#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self { inner: Arc::new(RwLock::new(None)), events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn set(&self, session: Session) {
        let user = session.user.clone();
        *self.inner.write().expect("session lock poisoned") = Some(session);
        let _ = self.events.send(SessionEvent::SignedIn(user));
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write().expect("session lock poisoned");
        if guard.take().is_some() {
            let _ = self.events.send(SessionEvent::SignedOut);
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.inner.read().expect("session lock poisoned").clone()
    }

    pub fn token(&self) -> Option<String> {
        self.current().map(|s| s.token)
    }

    pub fn user(&self) -> Option<User> {
        self.current().map(|s| s.user)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }
}
