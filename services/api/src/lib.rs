//! Tutoring API Library Crate
//!
//! This library contains all the logic of the tutoring web service: the
//! configuration, the session store, the turn orchestrator, the conversation
//! log, the API handlers and routing. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod conversation_log;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod store;
pub mod tutoring;
