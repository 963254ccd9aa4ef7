//! Voice Bridge API Library Crate
//!
//! Configuration, application state, routing, the WebSocket transport and the
//! Azure OpenAI realtime adapter. The `api` binary is a thin wrapper around
//! this library.

pub mod config;
pub mod realtime;
pub mod router;
pub mod state;
pub mod ws;
