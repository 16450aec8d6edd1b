//! WebSocket Session Management
//!
//! This module contains the core logic for handling real-time assistant
//! sessions over WebSockets. It is structured into submodules for clarity:
//!
//! - `protocol`: Defines the JSON-based message format for client-server communication.
//! - `session`: Manages the connection lifecycle and drives the turn-taking machine.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
