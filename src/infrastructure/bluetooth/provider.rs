//! Device Access Provider
//!
//! The capability surface consumed by the inspection pipeline and the
//! coordinator. The host platform (btleplug in production, in-memory
//! mocks in tests) implements these traits; nothing above this layer
//! touches the platform API directly.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::models::DiscoveredDevice;
use crate::domain::properties::CharacteristicProperties;
use crate::infrastructure::bluetooth::error::BleError;

/// Signals pushed by the provider outside of any call.
#[derive(Debug, Clone)]
pub enum ProviderEvent {
    DeviceDiscovered(DiscoveredDevice),
    Disconnected { device_id: String },
}

pub type ProviderEventSender = mpsc::UnboundedSender<ProviderEvent>;
pub type ProviderEventReceiver = mpsc::UnboundedReceiver<ProviderEvent>;

/// Stream of values for an active subscription.
pub type ValueReceiver = mpsc::UnboundedReceiver<Vec<u8>>;

/// Entry point capability: scanning and connecting. Discovery and
/// disconnect signals arrive on the event channel handed to the provider
/// at construction.
#[async_trait]
pub trait DeviceAccess: Send + Sync {
    /// Whether a usable adapter is present.
    async fn is_available(&self) -> bool;

    /// Starts advert scanning. `service_filters` holds full 128-bit UUID
    /// strings; an empty list accepts every device.
    async fn start_scan(&self, service_filters: &[String]) -> Result<(), BleError>;

    async fn stop_scan(&self) -> Result<(), BleError>;

    /// Connects to a previously discovered device and opens its GATT
    /// session.
    async fn connect(&self, device_id: &str) -> Result<Arc<dyn GattSession>, BleError>;
}

#[async_trait]
pub trait GattSession: Send + Sync {
    fn device_id(&self) -> String;
    fn device_name(&self) -> Option<String>;

    async fn primary_services(&self) -> Result<Vec<Arc<dyn GattService>>, BleError>;

    async fn disconnect(&self) -> Result<(), BleError>;
}

#[async_trait]
pub trait GattService: Send + Sync {
    fn uuid(&self) -> String;

    async fn characteristics(&self) -> Result<Vec<Arc<dyn GattCharacteristic>>, BleError>;
}

#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> String;

    fn properties(&self) -> CharacteristicProperties;

    /// Whether the platform exposes descriptor enumeration at all.
    /// Absence is not an error; the characteristic is simply reported
    /// without descriptors.
    fn supports_descriptors(&self) -> bool {
        true
    }

    async fn descriptors(&self) -> Result<Vec<Arc<dyn GattDescriptor>>, BleError>;

    async fn read(&self) -> Result<Vec<u8>, BleError>;

    async fn write(&self, payload: &[u8]) -> Result<(), BleError>;

    /// Enables value-change notifications and returns their stream.
    async fn subscribe(&self) -> Result<ValueReceiver, BleError>;

    async fn unsubscribe(&self) -> Result<(), BleError>;
}

#[async_trait]
pub trait GattDescriptor: Send + Sync {
    fn uuid(&self) -> String;

    /// Whether the handle supports value reads.
    fn supports_read(&self) -> bool {
        true
    }

    async fn read(&self) -> Result<Vec<u8>, BleError>;
}
