//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the shared service
//! clients and the turn orchestrator.

use crate::{config::Config, conversation_log::ConversationLogger, tutoring::TutoringService};
use std::sync::Arc;
use tutor_core::challenge::ChallengeApi;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub tutoring: Arc<TutoringService>,
    pub challenge: Arc<dyn ChallengeApi>,
    pub conversation_log: Arc<ConversationLogger>,
    pub config: Arc<Config>,
}
