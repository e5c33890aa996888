//! Typed client for the Quorum API.
//!
//! Carries the state machines the UI pages are built on: the session store,
//! the temp-copy editor (edit/save-or-cancel), relation search, the CrossRef
//! publication client and the dashboard list caches.

pub mod api;
pub mod cache;
pub mod crossref;
pub mod editor;
pub mod search;
pub mod session;

pub use api::Api;
pub use crossref::CrossrefClient;
pub use editor::Editor;
pub use session::{Session, SessionEvent, SessionStore};
