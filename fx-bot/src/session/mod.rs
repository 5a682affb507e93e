//! Per-user conversation state.
//!
//! A [`Session`] records how far a user has progressed through the
//! conversion dialogue. Sessions live in a [`SessionStore`]; the shipped
//! backend keeps them in memory for the lifetime of the process.

mod state;
mod store;

pub use state::{Session, Stage};
pub use store::{MemorySessionStore, SessionStore};
