//! Quorum REST server: the collection API, auth and file storage.

pub mod handlers;
pub mod router;
pub mod state;
