//! Voice Bridge API Library Crate
//!
//! This library contains the web service that sits between the browser, the
//! RTC room and the agent-management API: configuration, application state,
//! REST handlers for tokens and call lifecycle, the transcript WebSocket and
//! routing. The `api` binary is a thin wrapper around it.

pub mod agent_api;
pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
