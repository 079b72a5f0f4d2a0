//! Bluetooth Module
//!
//! Device access and GATT inspection.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │  (Command loop - public API for the application)         │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌───────────┐
//! │ Provider  │  │ Inspector  │  │  Backend  │
//! │           │  │            │  │           │
//! │ - access  │  │ - GATT     │  │ - btleplug│
//! │   traits  │  │   walk     │  │   adapter │
//! │ - events  │  │ - records  │  │ - notify  │
//! └───────────┘  └────────────┘  └───────────┘
//! ```
//!
//! ## Modules
//!
//! - [`provider`] - Capability traits for the host device-access API
//! - [`backend`] - btleplug implementation of the provider traits
//! - [`inspector`] - Service/characteristic/descriptor tree walk
//! - [`service`] - Command loop coordinating scan, connect, and I/O
//! - [`error`] - Typed failure kinds

pub mod backend;
pub mod error;
pub mod inspector;
pub mod provider;
pub mod service;

#[cfg(test)]
pub mod testing;

// Re-export main service for convenience
pub use service::BluetoothService;
