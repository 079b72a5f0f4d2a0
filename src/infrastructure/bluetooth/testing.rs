//! In-memory provider used by the pipeline and coordinator tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::properties::CharacteristicProperties;
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::provider::{
    DeviceAccess, GattCharacteristic, GattDescriptor, GattService, GattSession, ValueReceiver,
};

pub struct MockDescriptor {
    pub uuid: String,
    pub readable: bool,
    /// None makes the read fail.
    pub value: Option<Vec<u8>>,
}

impl MockDescriptor {
    pub fn with_value(uuid: &str, value: Vec<u8>) -> Self {
        Self {
            uuid: uuid.to_string(),
            readable: true,
            value: Some(value),
        }
    }

    pub fn unreadable(uuid: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            readable: false,
            value: None,
        }
    }

    pub fn failing(uuid: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            readable: true,
            value: None,
        }
    }
}

#[async_trait]
impl GattDescriptor for MockDescriptor {
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    fn supports_read(&self) -> bool {
        self.readable
    }

    async fn read(&self) -> Result<Vec<u8>, BleError> {
        self.value.clone().ok_or(BleError::Access {
            operation: "descriptor read",
            reason: "mock read failure".to_string(),
        })
    }
}

pub struct MockCharacteristic {
    pub uuid: String,
    pub properties: CharacteristicProperties,
    pub descriptors: Vec<Arc<dyn GattDescriptor>>,
    pub descriptors_supported: bool,
    pub fail_descriptors: bool,
    pub value: Mutex<Vec<u8>>,
    pub fail_reads: bool,
    pub written: Mutex<Vec<Vec<u8>>>,
    notify_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    pub unsubscribed: AtomicBool,
}

impl MockCharacteristic {
    pub fn new(uuid: &str, properties: CharacteristicProperties) -> Self {
        Self {
            uuid: uuid.to_string(),
            properties,
            descriptors: Vec::new(),
            descriptors_supported: true,
            fail_descriptors: false,
            value: Mutex::new(Vec::new()),
            fail_reads: false,
            written: Mutex::new(Vec::new()),
            notify_tx: Mutex::new(None),
            unsubscribed: AtomicBool::new(false),
        }
    }

    /// Pushes a value to the active subscriber, if any.
    pub fn push_value(&self, value: Vec<u8>) {
        if let Some(tx) = self.notify_tx.lock().unwrap().as_ref() {
            let _ = tx.send(value);
        }
    }
}

#[async_trait]
impl GattCharacteristic for MockCharacteristic {
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    fn properties(&self) -> CharacteristicProperties {
        self.properties
    }

    fn supports_descriptors(&self) -> bool {
        self.descriptors_supported
    }

    async fn descriptors(&self) -> Result<Vec<Arc<dyn GattDescriptor>>, BleError> {
        if self.fail_descriptors {
            return Err(BleError::Enumeration("mock descriptor failure".to_string()));
        }
        Ok(self.descriptors.clone())
    }

    async fn read(&self) -> Result<Vec<u8>, BleError> {
        if self.fail_reads {
            return Err(BleError::Access {
                operation: "read",
                reason: "mock read failure".to_string(),
            });
        }
        Ok(self.value.lock().unwrap().clone())
    }

    async fn write(&self, payload: &[u8]) -> Result<(), BleError> {
        self.written.lock().unwrap().push(payload.to_vec());
        Ok(())
    }

    async fn subscribe(&self) -> Result<ValueReceiver, BleError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.notify_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn unsubscribe(&self) -> Result<(), BleError> {
        self.unsubscribed.store(true, Ordering::Relaxed);
        *self.notify_tx.lock().unwrap() = None;
        Ok(())
    }
}

pub struct MockService {
    pub uuid: String,
    pub characteristics: Vec<Arc<dyn GattCharacteristic>>,
    pub fail_characteristics: bool,
}

impl MockService {
    pub fn new(uuid: &str, characteristics: Vec<Arc<dyn GattCharacteristic>>) -> Self {
        Self {
            uuid: uuid.to_string(),
            characteristics,
            fail_characteristics: false,
        }
    }
}

#[async_trait]
impl GattService for MockService {
    fn uuid(&self) -> String {
        self.uuid.clone()
    }

    async fn characteristics(&self) -> Result<Vec<Arc<dyn GattCharacteristic>>, BleError> {
        if self.fail_characteristics {
            return Err(BleError::Enumeration(
                "mock characteristic failure".to_string(),
            ));
        }
        Ok(self.characteristics.clone())
    }
}

pub struct MockSession {
    pub name: Option<String>,
    pub id: String,
    pub services: Vec<Arc<dyn GattService>>,
    pub fail_services: bool,
    pub disconnected: AtomicBool,
}

impl MockSession {
    pub fn new(name: Option<&str>, id: &str, services: Vec<Arc<dyn GattService>>) -> Self {
        Self {
            name: name.map(|n| n.to_string()),
            id: id.to_string(),
            services,
            fail_services: false,
            disconnected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl GattSession for MockSession {
    fn device_id(&self) -> String {
        self.id.clone()
    }

    fn device_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn primary_services(&self) -> Result<Vec<Arc<dyn GattService>>, BleError> {
        if self.fail_services {
            return Err(BleError::Enumeration("mock service failure".to_string()));
        }
        Ok(self.services.clone())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.disconnected.store(true, Ordering::Relaxed);
        Ok(())
    }
}

pub struct MockAccess {
    pub available: bool,
    pub session: Mutex<Option<Arc<dyn GattSession>>>,
    pub scans_started: AtomicUsize,
    pub scans_stopped: AtomicUsize,
    pub last_filters: Mutex<Vec<String>>,
}

impl MockAccess {
    pub fn with_session(session: Arc<dyn GattSession>) -> Self {
        Self {
            available: true,
            session: Mutex::new(Some(session)),
            scans_started: AtomicUsize::new(0),
            scans_stopped: AtomicUsize::new(0),
            last_filters: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DeviceAccess for MockAccess {
    async fn is_available(&self) -> bool {
        self.available
    }

    async fn start_scan(&self, service_filters: &[String]) -> Result<(), BleError> {
        self.scans_started.fetch_add(1, Ordering::Relaxed);
        *self.last_filters.lock().unwrap() = service_filters.to_vec();
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BleError> {
        self.scans_stopped.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn connect(&self, device_id: &str) -> Result<Arc<dyn GattSession>, BleError> {
        self.session
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| BleError::Connection(format!("no mock session for {device_id}")))
    }
}
