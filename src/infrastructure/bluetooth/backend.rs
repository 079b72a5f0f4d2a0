//! btleplug Backend
//!
//! Implements the device access capability over the cross-platform
//! btleplug stack: adapter bootstrap, scan event forwarding, connection
//! and GATT discovery, and fan-out of the peripheral's notification
//! stream to per-characteristic subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Descriptor, Manager as _,
    Peripheral as _, ScanFilter, Service, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::models::DiscoveredDevice;
use crate::domain::properties::CharacteristicProperties;
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::provider::{
    DeviceAccess, GattCharacteristic, GattDescriptor, GattService, GattSession, ProviderEvent,
    ProviderEventSender, ValueReceiver,
};

pub struct BtleplugAccess {
    adapter: Adapter,
    scanning: Arc<AtomicBool>,
}

impl BtleplugAccess {
    /// Opens the first adapter and starts the central event pump.
    pub async fn new(events: ProviderEventSender) -> Result<Self, BleError> {
        let manager = Manager::new()
            .await
            .map_err(|e| BleError::Connection(e.to_string()))?;
        let mut adapters = manager
            .adapters()
            .await
            .map_err(|e| BleError::Connection(e.to_string()))?;
        if adapters.is_empty() {
            return Err(BleError::AdapterUnavailable);
        }
        let adapter = adapters.remove(0);

        let scanning = Arc::new(AtomicBool::new(false));
        spawn_event_pump(adapter.clone(), events, scanning.clone());

        Ok(Self { adapter, scanning })
    }
}

/// Forwards adapter central events as provider events. Discovery events
/// are only forwarded while a scan is active; disconnects always are.
fn spawn_event_pump(adapter: Adapter, sender: ProviderEventSender, scanning: Arc<AtomicBool>) {
    tokio::spawn(async move {
        let mut events = match adapter.events().await {
            Ok(events) => events,
            Err(err) => {
                warn!(%err, "central event stream unavailable");
                return;
            }
        };

        while let Some(event) = events.next().await {
            match event {
                CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                    if !scanning.load(Ordering::Relaxed) {
                        continue;
                    }
                    let Ok(peripheral) = adapter.peripheral(&id).await else {
                        continue;
                    };
                    let properties = peripheral.properties().await.ok().flatten();
                    let name = properties
                        .as_ref()
                        .and_then(|p| p.local_name.clone())
                        .unwrap_or_else(|| "Unknown".to_string());
                    let signal_strength = properties.as_ref().and_then(|p| p.rssi);

                    let _ = sender.send(ProviderEvent::DeviceDiscovered(DiscoveredDevice {
                        id: id.to_string(),
                        name,
                        signal_strength,
                    }));
                }
                CentralEvent::DeviceDisconnected(id) => {
                    let _ = sender.send(ProviderEvent::Disconnected {
                        device_id: id.to_string(),
                    });
                }
                _ => {}
            }
        }
    });
}

#[async_trait]
impl DeviceAccess for BtleplugAccess {
    async fn is_available(&self) -> bool {
        self.adapter.adapter_info().await.is_ok()
    }

    async fn start_scan(&self, service_filters: &[String]) -> Result<(), BleError> {
        let services: Vec<Uuid> = service_filters
            .iter()
            .filter_map(|s| Uuid::parse_str(s).ok())
            .collect();

        self.adapter
            .start_scan(ScanFilter { services })
            .await
            .map_err(|e| BleError::Enumeration(e.to_string()))?;
        self.scanning.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.scanning.store(false, Ordering::Relaxed);
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| BleError::Enumeration(e.to_string()))
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn GattSession>, BleError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| BleError::Connection(e.to_string()))?;
        let peripheral = peripherals
            .into_iter()
            .find(|p| p.id().to_string() == device_id)
            .ok_or_else(|| {
                BleError::Connection(format!("device {device_id} is no longer in range"))
            })?;

        peripheral
            .connect()
            .await
            .map_err(|e| BleError::Connection(e.to_string()))?;
        peripheral
            .discover_services()
            .await
            .map_err(|e| BleError::Enumeration(e.to_string()))?;

        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);
        let router = NotificationRouter::spawn(&peripheral).await?;

        Ok(Arc::new(BtleplugSession {
            peripheral,
            name,
            router,
        }))
    }
}

/// Fans the peripheral's single notification stream out to the
/// per-characteristic subscriber channels.
struct NotificationRouter {
    routes: Arc<Mutex<HashMap<Uuid, mpsc::UnboundedSender<Vec<u8>>>>>,
}

impl NotificationRouter {
    async fn spawn(peripheral: &Peripheral) -> Result<Arc<Self>, BleError> {
        let mut stream = peripheral
            .notifications()
            .await
            .map_err(|e| BleError::Connection(e.to_string()))?;

        let routes: Arc<Mutex<HashMap<Uuid, mpsc::UnboundedSender<Vec<u8>>>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let router = Arc::new(Self {
            routes: routes.clone(),
        });

        tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                let mut routes = routes.lock().await;
                if let Some(tx) = routes.get(&notification.uuid) {
                    // A closed receiver means the subscriber went away.
                    if tx.send(notification.value).is_err() {
                        routes.remove(&notification.uuid);
                    }
                }
            }
            debug!("notification stream ended");
        });

        Ok(router)
    }

    async fn open(&self, uuid: Uuid) -> ValueReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.lock().await.insert(uuid, tx);
        rx
    }

    async fn close(&self, uuid: &Uuid) {
        self.routes.lock().await.remove(uuid);
    }
}

struct BtleplugSession {
    peripheral: Peripheral,
    name: Option<String>,
    router: Arc<NotificationRouter>,
}

#[async_trait]
impl GattSession for BtleplugSession {
    fn device_id(&self) -> String {
        self.peripheral.id().to_string()
    }

    fn device_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn primary_services(&self) -> Result<Vec<Arc<dyn GattService>>, BleError> {
        Ok(self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.primary)
            .map(|service| {
                Arc::new(BtleplugService {
                    peripheral: self.peripheral.clone(),
                    router: self.router.clone(),
                    service,
                }) as Arc<dyn GattService>
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| BleError::Connection(e.to_string()))
    }
}

struct BtleplugService {
    peripheral: Peripheral,
    router: Arc<NotificationRouter>,
    service: Service,
}

#[async_trait]
impl GattService for BtleplugService {
    fn uuid(&self) -> String {
        self.service.uuid.to_string()
    }

    async fn characteristics(&self) -> Result<Vec<Arc<dyn GattCharacteristic>>, BleError> {
        Ok(self
            .service
            .characteristics
            .iter()
            .cloned()
            .map(|characteristic| {
                Arc::new(BtleplugCharacteristic {
                    peripheral: self.peripheral.clone(),
                    router: self.router.clone(),
                    characteristic,
                }) as Arc<dyn GattCharacteristic>
            })
            .collect())
    }
}

struct BtleplugCharacteristic {
    peripheral: Peripheral,
    router: Arc<NotificationRouter>,
    characteristic: Characteristic,
}

#[async_trait]
impl GattCharacteristic for BtleplugCharacteristic {
    fn uuid(&self) -> String {
        self.characteristic.uuid.to_string()
    }

    fn properties(&self) -> CharacteristicProperties {
        properties_from_flags(self.characteristic.properties)
    }

    async fn descriptors(&self) -> Result<Vec<Arc<dyn GattDescriptor>>, BleError> {
        Ok(self
            .characteristic
            .descriptors
            .iter()
            .cloned()
            .map(|descriptor| {
                Arc::new(BtleplugDescriptor {
                    peripheral: self.peripheral.clone(),
                    descriptor,
                }) as Arc<dyn GattDescriptor>
            })
            .collect())
    }

    async fn read(&self) -> Result<Vec<u8>, BleError> {
        self.peripheral
            .read(&self.characteristic)
            .await
            .map_err(|e| BleError::Access {
                operation: "read",
                reason: e.to_string(),
            })
    }

    async fn write(&self, payload: &[u8]) -> Result<(), BleError> {
        let write_type = if self.characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(&self.characteristic, payload, write_type)
            .await
            .map_err(|e| BleError::Access {
                operation: "write",
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self) -> Result<ValueReceiver, BleError> {
        self.peripheral
            .subscribe(&self.characteristic)
            .await
            .map_err(|e| BleError::Access {
                operation: "subscribe",
                reason: e.to_string(),
            })?;
        Ok(self.router.open(self.characteristic.uuid).await)
    }

    async fn unsubscribe(&self) -> Result<(), BleError> {
        self.router.close(&self.characteristic.uuid).await;
        self.peripheral
            .unsubscribe(&self.characteristic)
            .await
            .map_err(|e| BleError::Access {
                operation: "unsubscribe",
                reason: e.to_string(),
            })
    }
}

struct BtleplugDescriptor {
    peripheral: Peripheral,
    descriptor: Descriptor,
}

#[async_trait]
impl GattDescriptor for BtleplugDescriptor {
    fn uuid(&self) -> String {
        self.descriptor.uuid.to_string()
    }

    async fn read(&self) -> Result<Vec<u8>, BleError> {
        self.peripheral
            .read_descriptor(&self.descriptor)
            .await
            .map_err(|e| BleError::Access {
                operation: "descriptor read",
                reason: e.to_string(),
            })
    }
}

/// Flags the platform does not report (reliable write, writable
/// auxiliaries) default to false.
fn properties_from_flags(flags: CharPropFlags) -> CharacteristicProperties {
    CharacteristicProperties {
        broadcast: flags.contains(CharPropFlags::BROADCAST),
        read: flags.contains(CharPropFlags::READ),
        write_without_response: flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        write: flags.contains(CharPropFlags::WRITE),
        notify: flags.contains(CharPropFlags::NOTIFY),
        indicate: flags.contains(CharPropFlags::INDICATE),
        authenticated_signed_writes: flags.contains(CharPropFlags::AUTHENTICATED_SIGNED_WRITES),
        reliable_write: false,
        writable_auxiliaries: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_properties_from_flags() {
        let props =
            properties_from_flags(CharPropFlags::READ | CharPropFlags::NOTIFY);
        assert!(props.read);
        assert!(props.notify);
        assert!(!props.write);
        assert_eq!(props.labels(), vec!["read", "notify"]);
    }

    #[test]
    fn test_empty_flags() {
        let props = properties_from_flags(CharPropFlags::empty());
        assert_eq!(props, CharacteristicProperties::default());
    }
}
