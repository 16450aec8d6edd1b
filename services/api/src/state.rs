//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources built once at startup.

use crate::config::Config;
use folio_core::Orchestrator;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub config: Arc<Config>,
}
