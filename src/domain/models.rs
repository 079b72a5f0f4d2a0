//! Domain Models
//!
//! The serializable snapshot records produced by the inspection pipeline,
//! plus the command and event types exchanged between the UI and the
//! bluetooth worker.

use serde::Serialize;

use crate::domain::properties::Capabilities;

/// Fallback display name for devices that advertise none.
pub const UNKNOWN_DEVICE: &str = "Unknown device";

/// Identity of the connected device, captured once per connection and
/// discarded on disconnect or a new scan.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceSnapshot {
    pub name: String,
    pub id: String,
}

impl DeviceSnapshot {
    pub fn new(name: Option<String>, id: String) -> Self {
        Self {
            name: name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNKNOWN_DEVICE.to_string()),
            id,
        }
    }
}

/// One primary service and its characteristics, in enumeration order.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceRecord {
    pub uuid: String,
    pub label: String,
    pub characteristics: Vec<CharacteristicRecord>,
}

/// A characteristic with its derived capabilities and interpreted
/// descriptors. `key` addresses the live accessor held outside the
/// snapshot; the snapshot itself is pure data.
#[derive(Debug, Clone, Serialize)]
pub struct CharacteristicRecord {
    pub uuid: String,
    pub label: String,
    pub key: String,
    pub operations: Vec<String>,
    #[serde(flatten)]
    pub capabilities: Capabilities,
    pub descriptors: Vec<DescriptorRecord>,
    pub presentation: Option<String>,
}

/// Why a descriptor record does or does not carry a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DescriptorStatus {
    /// Payload was read and decoded.
    Decoded,
    /// The handle does not support value reads.
    NotReadable,
    /// The read failed; the failure is logged, not surfaced.
    ReadFailed,
    /// Read succeeded but the type is not one we decode.
    Unrecognized,
}

#[derive(Debug, Clone, Serialize)]
pub struct DescriptorRecord {
    pub uuid: String,
    pub label: String,
    pub value: Option<String>,
    pub presentation: Option<String>,
    pub status: DescriptorStatus,
}

/// A device seen while scanning.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    pub id: String,
    pub name: String,
    pub signal_strength: Option<i16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

/// Commands sent from the UI to the bluetooth worker.
#[derive(Debug, Clone)]
pub enum BluetoothCommand {
    StartScan,
    StopScan,
    Connect(String),
    Disconnect,
    Read { key: String },
    Write { key: String, input: String },
    ToggleNotify { key: String },
}

/// Events sent from the bluetooth worker back to the UI.
#[derive(Debug, Clone)]
pub enum AppEvent {
    AdapterAvailability(bool),
    DeviceFound(DiscoveredDevice),
    ConnectionStatus(ConnectionStatus),
    InspectionReady {
        device: DeviceSnapshot,
        services: Vec<ServiceRecord>,
    },
    CharacteristicValue { key: String, display: String },
    WriteDone { key: String },
    NotifyState { key: String, enabled: bool },
    OperationFailed { key: String, message: String },
    LogMessage(StatusMessage),
}
