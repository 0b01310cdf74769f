//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the token issuer and the agent API client.

use crate::{
    agent_api::{AgentApi, AgentRegistration},
    config::Config,
};
use std::sync::Arc;
use voicebridge_core::credential::TokenIssuer;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub token_issuer: Arc<TokenIssuer>,
    pub agent_api: Arc<dyn AgentApi>,
    pub registration: Arc<AgentRegistration>,
}
