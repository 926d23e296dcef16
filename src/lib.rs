//! Courier Relay - Real-Time Courier Dispatch Notifier
//!
//! A small backend that bridges a WebSocket dispatch frontend to a messaging
//! transport (e.g. a WhatsApp account). The core is the contact router: a
//! bijective job↔phone mapping with per-job chat history and an injectable
//! auto-provisioning policy for unbound jobs.
//!
//! ## Features
//!
//! - **Contact Router:** bijective job↔phone bindings, `#token` recovery for
//!   unknown senders, delivery-status tracking per message
//! - **WebSocket Gateway:** JSON event protocol (`client_message`,
//!   `send_message`, job lifecycle, courier locations) with fan-out broadcast
//! - **Transport Boundary:** messaging delivery behind a narrow trait, usable
//!   before any transport is connected
//! - **Job Store:** in-memory job records with seed-file loading
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the gateway (default command)
//! courier-relay
//!
//! # With a custom config file
//! courier-relay --config ./courier-relay.toml serve
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod jobs;
pub mod logging;
pub mod router;
pub mod tracking;
pub mod transport;

// Re-export commonly used types
pub use error::{RelayError, Result};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
