//! Bluetooth Error Kinds
//!
//! Typed failures surfaced by the device access provider and the
//! coordinator. Tree-enumeration failures abort an inspection; access
//! failures stay local to the control that triggered them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BleError {
    /// The scan ended without the user picking a device.
    #[error("no device selected")]
    SelectionCancelled,

    #[error("bluetooth adapter not available")]
    AdapterUnavailable,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("enumeration failed: {0}")]
    Enumeration(String),

    #[error("{operation} failed: {reason}")]
    Access {
        operation: &'static str,
        reason: String,
    },

    #[error("not connected to a device")]
    NotConnected,

    #[error("unknown characteristic {0}")]
    UnknownCharacteristic(String),
}
