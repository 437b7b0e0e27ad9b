//! HIV-care clinic backend
//!
//! A layered clinic management service:
//! - Patient treatments with single-active-protocol enforcement and cost calculation
//! - Table-driven clinical safety validation (organ function, pregnancy, resistance,
//!   adherence, continuity, emergency protocol timing)
//! - Weekly doctor shift scheduling
//! - Meeting records, blogs and payment webhook reconciliation

#![allow(
    clippy::too_many_arguments,      // Repository methods mirror table columns
    clippy::large_enum_variant,      // Error carries the validation report inline
)]

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{Error, Result};
pub use state::AppState;
