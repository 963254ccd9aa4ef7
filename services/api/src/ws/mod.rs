//! WebSocket Call Handling
//!
//! - `transport`: adapts an axum WebSocket to the core transport contract.
//! - `session`: upgrades a connection and runs one call over it.

pub mod session;
pub mod transport;

pub use session::ws_handler;
