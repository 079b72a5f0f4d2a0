//! Bluetooth Service Module
//!
//! Coordinates the scan/connect/inspect lifecycle and the interactive
//! characteristic operations. Runs as a command loop on the bluetooth
//! worker thread, receiving commands from the UI and provider events from
//! the backend, and reporting everything back as [`AppEvent`]s.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::codec;
use crate::domain::models::{
    AppEvent, BluetoothCommand, ConnectionStatus, MessageSeverity, StatusMessage,
};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::error::BleError;
use crate::infrastructure::bluetooth::inspector::{self, CharacteristicAccessors};
use crate::infrastructure::bluetooth::provider::{
    DeviceAccess, GattCharacteristic, GattSession, ProviderEvent, ProviderEventReceiver,
};

pub struct BluetoothService {
    provider: Arc<dyn DeviceAccess>,
    session: Option<Arc<dyn GattSession>>,
    accessors: CharacteristicAccessors,
    /// Tasks forwarding subscription values to the UI, one per notifying
    /// characteristic.
    forwarders: HashMap<String, JoinHandle<()>>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    settings: Arc<Mutex<SettingsService>>,
    is_scanning: bool,
}

impl BluetoothService {
    pub fn new(
        provider: Arc<dyn DeviceAccess>,
        event_sender: mpsc::UnboundedSender<AppEvent>,
        settings: Arc<Mutex<SettingsService>>,
    ) -> Self {
        Self {
            provider,
            session: None,
            accessors: CharacteristicAccessors::new(),
            forwarders: HashMap::new(),
            event_sender,
            settings,
            is_scanning: false,
        }
    }

    /// Command loop. Returns when both channels close.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<BluetoothCommand>,
        mut provider_events: ProviderEventReceiver,
    ) {
        let available = self.provider.is_available().await;
        let _ = self
            .event_sender
            .send(AppEvent::AdapterAvailability(available));

        loop {
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => break,
                    }
                }
                event = provider_events.recv() => {
                    match event {
                        Some(event) => self.handle_provider_event(event).await,
                        None => break,
                    }
                }
            }
        }

        self.disconnect(false).await;
    }

    async fn handle_command(&mut self, command: BluetoothCommand) {
        match command {
            BluetoothCommand::StartScan => self.start_scan().await,
            BluetoothCommand::StopScan => self.stop_scan().await,
            BluetoothCommand::Connect(device_id) => self.connect(&device_id).await,
            BluetoothCommand::Disconnect => self.disconnect(true).await,
            BluetoothCommand::Read { key } => self.read(&key).await,
            BluetoothCommand::Write { key, input } => self.write(&key, &input).await,
            BluetoothCommand::ToggleNotify { key } => self.toggle_notify(&key).await,
        }
    }

    async fn handle_provider_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::DeviceDiscovered(device) => {
                let _ = self.event_sender.send(AppEvent::DeviceFound(device));
            }
            ProviderEvent::Disconnected { device_id } => {
                let ours = self
                    .session
                    .as_ref()
                    .map(|s| s.device_id() == device_id)
                    .unwrap_or(false);
                if ours {
                    self.disconnect(false).await;
                    self.send_log(
                        "Device disconnected. Scan again to reconnect.",
                        MessageSeverity::Warning,
                    );
                    let _ = self
                        .event_sender
                        .send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
                }
            }
        }
    }

    async fn start_scan(&mut self) {
        // A new scan discards the previous snapshot.
        if self.session.is_some() {
            self.disconnect(false).await;
            let _ = self
                .event_sender
                .send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
        }

        let filters = {
            match self.settings.lock() {
                Ok(settings) => {
                    let settings = settings.get();
                    if settings.filter_scan_to_services {
                        settings.service_filters()
                    } else {
                        Vec::new()
                    }
                }
                Err(_) => Vec::new(),
            }
        };

        match self.provider.start_scan(&filters).await {
            Ok(()) => {
                self.is_scanning = true;
                info!(filters = filters.len(), "scan started");
                self.send_log("Scanning for nearby devices...", MessageSeverity::Info);
            }
            Err(err) => {
                error!(%err, "failed to start scan");
                self.send_log(
                    &format!("Unable to scan for devices: {err}"),
                    MessageSeverity::Error,
                );
            }
        }
    }

    async fn stop_scan(&mut self) {
        if let Err(err) = self.provider.stop_scan().await {
            warn!(%err, "failed to stop scan");
        }
        if self.is_scanning {
            self.is_scanning = false;
            if self.session.is_none() {
                // The chooser closed with nothing picked.
                info!(reason = %BleError::SelectionCancelled, "scan stopped");
                self.send_log(
                    "No device selected. Try again to scan for nearby devices.",
                    MessageSeverity::Warning,
                );
            }
        }
    }

    async fn connect(&mut self, device_id: &str) {
        self.disconnect(false).await;
        let _ = self.provider.stop_scan().await;
        self.is_scanning = false;

        let _ = self
            .event_sender
            .send(AppEvent::ConnectionStatus(ConnectionStatus::Connecting));

        let session = match self.provider.connect(device_id).await {
            Ok(session) => session,
            Err(err) => {
                error!(%err, "connection failed");
                self.send_log(&format!("Connection failed: {err}"), MessageSeverity::Error);
                let _ = self
                    .event_sender
                    .send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
                return;
            }
        };

        let _ = self
            .event_sender
            .send(AppEvent::ConnectionStatus(ConnectionStatus::Connected));

        match inspector::inspect_device(session.as_ref()).await {
            Ok(result) => {
                info!(
                    device = %result.device.name,
                    services = result.services.len(),
                    "inspection complete"
                );
                self.accessors = result.accessors;
                self.session = Some(session);
                let _ = self.event_sender.send(AppEvent::InspectionReady {
                    device: result.device,
                    services: result.services,
                });
            }
            Err(err) => {
                // No partial tree: drop the session and force a fresh scan.
                error!(%err, "inspection failed");
                let _ = session.disconnect().await;
                self.send_log(
                    &format!("Unable to inspect device: {err}"),
                    MessageSeverity::Error,
                );
                let _ = self
                    .event_sender
                    .send(AppEvent::ConnectionStatus(ConnectionStatus::Error));
            }
        }
    }

    async fn disconnect(&mut self, announce: bool) {
        let notifying: Vec<String> = self.forwarders.keys().cloned().collect();
        for (_, handle) in self.forwarders.drain() {
            handle.abort();
        }
        for key in notifying {
            if let Some(accessor) = self.accessors.get(&key) {
                if let Err(err) = accessor.unsubscribe().await {
                    warn!(%key, %err, "failed to release subscription");
                }
            }
        }
        self.accessors.clear();

        if let Some(session) = self.session.take() {
            if let Err(err) = session.disconnect().await {
                warn!(%err, "disconnect failed");
            }
            if announce {
                info!("Disconnected from device");
                self.send_log("Disconnected from device", MessageSeverity::Info);
                let _ = self
                    .event_sender
                    .send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
            }
        }
    }

    fn accessor(&self, key: &str) -> Result<Arc<dyn GattCharacteristic>, BleError> {
        if self.session.is_none() {
            return Err(BleError::NotConnected);
        }
        self.accessors
            .get(key)
            .cloned()
            .ok_or_else(|| BleError::UnknownCharacteristic(key.to_string()))
    }

    async fn read(&mut self, key: &str) {
        let result = match self.accessor(key) {
            Ok(accessor) => accessor.read().await,
            Err(err) => Err(err),
        };

        match result {
            Ok(value) => {
                let _ = self.event_sender.send(AppEvent::CharacteristicValue {
                    key: key.to_string(),
                    display: codec::decode_for_display(&value),
                });
            }
            Err(err) => {
                warn!(%key, %err, "read failed");
                self.send_failure(key, &err);
            }
        }
    }

    async fn write(&mut self, key: &str, input: &str) {
        let payload = codec::encode_for_write(input);
        let result = match self.accessor(key) {
            Ok(accessor) => accessor.write(&payload).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                let _ = self
                    .event_sender
                    .send(AppEvent::WriteDone { key: key.to_string() });
            }
            Err(err) => {
                warn!(%key, %err, "write failed");
                self.send_failure(key, &err);
            }
        }
    }

    async fn toggle_notify(&mut self, key: &str) {
        if let Some(handle) = self.forwarders.remove(key) {
            handle.abort();
            if let Some(accessor) = self.accessors.get(key) {
                // Release failures are logged, never escalated.
                if let Err(err) = accessor.unsubscribe().await {
                    warn!(%key, %err, "failed to release subscription");
                }
            }
            let _ = self.event_sender.send(AppEvent::NotifyState {
                key: key.to_string(),
                enabled: false,
            });
            return;
        }

        let accessor = match self.accessor(key) {
            Ok(accessor) => accessor,
            Err(err) => {
                self.send_failure(key, &err);
                return;
            }
        };

        match accessor.subscribe().await {
            Ok(mut values) => {
                let sender = self.event_sender.clone();
                let value_key = key.to_string();
                let handle = tokio::spawn(async move {
                    while let Some(value) = values.recv().await {
                        let _ = sender.send(AppEvent::CharacteristicValue {
                            key: value_key.clone(),
                            display: codec::decode_for_display(&value),
                        });
                    }
                });
                self.forwarders.insert(key.to_string(), handle);
                let _ = self.event_sender.send(AppEvent::NotifyState {
                    key: key.to_string(),
                    enabled: true,
                });
            }
            Err(err) => {
                warn!(%key, %err, "subscribe failed");
                self.send_failure(key, &err);
            }
        }
    }

    fn send_failure(&self, key: &str, err: &BleError) {
        let _ = self.event_sender.send(AppEvent::OperationFailed {
            key: key.to_string(),
            message: err.to_string(),
        });
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self.event_sender.send(AppEvent::LogMessage(StatusMessage {
            message: message.to_string(),
            severity,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::properties::CharacteristicProperties;
    use crate::domain::settings::Settings;
    use crate::infrastructure::bluetooth::provider::ProviderEventSender;
    use crate::infrastructure::bluetooth::testing::{
        MockAccess, MockCharacteristic, MockService, MockSession,
    };
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        commands: mpsc::UnboundedSender<BluetoothCommand>,
        events: mpsc::UnboundedReceiver<AppEvent>,
        _provider_events: ProviderEventSender,
    }

    fn spawn_service(provider: Arc<dyn DeviceAccess>) -> Harness {
        spawn_service_with(provider, Settings::default())
    }

    fn spawn_service_with(provider: Arc<dyn DeviceAccess>, settings: Settings) -> Harness {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (provider_tx, provider_rx) = mpsc::unbounded_channel();
        let settings = Arc::new(Mutex::new(SettingsService::for_tests(settings)));

        let service = BluetoothService::new(provider, event_tx, settings);
        tokio::spawn(service.run(command_rx, provider_rx));

        Harness {
            commands: command_tx,
            events: event_rx,
            _provider_events: provider_tx,
        }
    }

    async fn wait_for(
        events: &mut mpsc::UnboundedReceiver<AppEvent>,
        pred: impl Fn(&AppEvent) -> bool,
    ) -> AppEvent {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = events.recv().await.expect("event channel closed");
                if pred(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    fn battery_setup() -> (Arc<MockCharacteristic>, Arc<MockSession>, Arc<MockAccess>) {
        let mut characteristic = MockCharacteristic::new(
            "2a19",
            CharacteristicProperties {
                read: true,
                write: true,
                notify: true,
                ..Default::default()
            },
        );
        *characteristic.value.lock().unwrap() = b"Hi".to_vec();
        let characteristic = Arc::new(characteristic);

        let as_gatt: Arc<dyn GattCharacteristic> = characteristic.clone();
        let service = MockService::new("180f", vec![as_gatt]);
        let session = Arc::new(MockSession::new(Some("Mock"), "dev-1", vec![Arc::new(service)]));
        let as_session: Arc<dyn GattSession> = session.clone();
        let access = Arc::new(MockAccess::with_session(as_session));

        (characteristic, session, access)
    }

    async fn connect_and_get_key(harness: &mut Harness) -> String {
        harness
            .commands
            .send(BluetoothCommand::Connect("dev-1".to_string()))
            .unwrap();
        let event = wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::InspectionReady { .. })
        })
        .await;
        match event {
            AppEvent::InspectionReady { services, .. } => {
                services[0].characteristics[0].key.clone()
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_connect_then_read_reports_decoded_value() {
        let (_characteristic, _session, access) = battery_setup();
        let mut harness = spawn_service(access);

        let key = connect_and_get_key(&mut harness).await;
        harness
            .commands
            .send(BluetoothCommand::Read { key: key.clone() })
            .unwrap();

        let event = wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::CharacteristicValue { .. })
        })
        .await;
        match event {
            AppEvent::CharacteristicValue { key: k, display } => {
                assert_eq!(k, key);
                assert_eq!(display, "48 69 (Hi)");
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_write_encodes_hex_input() {
        let (characteristic, _session, access) = battery_setup();
        let mut harness = spawn_service(access);

        let key = connect_and_get_key(&mut harness).await;
        harness
            .commands
            .send(BluetoothCommand::Write {
                key: key.clone(),
                input: "01 ff".to_string(),
            })
            .unwrap();

        wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::WriteDone { .. })
        })
        .await;
        assert_eq!(
            characteristic.written.lock().unwrap().as_slice(),
            &[vec![0x01, 0xff]]
        );
    }

    #[tokio::test]
    async fn test_notify_toggle_and_teardown() {
        let (characteristic, _session, access) = battery_setup();
        let mut harness = spawn_service(access);

        let key = connect_and_get_key(&mut harness).await;
        harness
            .commands
            .send(BluetoothCommand::ToggleNotify { key: key.clone() })
            .unwrap();
        wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::NotifyState { enabled: true, .. })
        })
        .await;

        characteristic.push_value(vec![0x64]);
        let event = wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::CharacteristicValue { .. })
        })
        .await;
        match event {
            AppEvent::CharacteristicValue { display, .. } => assert_eq!(display, "64 (d)"),
            _ => unreachable!(),
        }

        harness
            .commands
            .send(BluetoothCommand::ToggleNotify { key: key.clone() })
            .unwrap();
        wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::NotifyState { enabled: false, .. })
        })
        .await;
        assert!(characteristic.unsubscribed.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_unknown_key_reports_inline_failure() {
        let (_characteristic, _session, access) = battery_setup();
        let mut harness = spawn_service(access);

        connect_and_get_key(&mut harness).await;
        harness
            .commands
            .send(BluetoothCommand::Read {
                key: "bogus".to_string(),
            })
            .unwrap();

        let event = wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::OperationFailed { .. })
        })
        .await;
        match event {
            AppEvent::OperationFailed { key, .. } => assert_eq!(key, "bogus"),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_disconnect_releases_subscriptions_and_session() {
        let (characteristic, session, access) = battery_setup();
        let mut harness = spawn_service(access);

        let key = connect_and_get_key(&mut harness).await;
        harness
            .commands
            .send(BluetoothCommand::ToggleNotify { key })
            .unwrap();
        wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::NotifyState { enabled: true, .. })
        })
        .await;

        harness.commands.send(BluetoothCommand::Disconnect).unwrap();
        wait_for(&mut harness.events, |e| {
            matches!(
                e,
                AppEvent::ConnectionStatus(ConnectionStatus::Disconnected)
            )
        })
        .await;

        assert!(characteristic.unsubscribed.load(Ordering::Relaxed));
        assert!(session.disconnected.load(Ordering::Relaxed));
    }

    #[tokio::test]
    async fn test_read_failure_stays_local_to_the_control() {
        let mut characteristic = MockCharacteristic::new(
            "2a19",
            CharacteristicProperties {
                read: true,
                ..Default::default()
            },
        );
        characteristic.fail_reads = true;

        let as_gatt: Arc<dyn GattCharacteristic> = Arc::new(characteristic);
        let service = MockService::new("180f", vec![as_gatt]);
        let session = MockSession::new(None, "dev-1", vec![Arc::new(service)]);
        let access = Arc::new(MockAccess::with_session(Arc::new(session)));
        let mut harness = spawn_service(access);

        let key = connect_and_get_key(&mut harness).await;
        harness
            .commands
            .send(BluetoothCommand::Read { key: key.clone() })
            .unwrap();

        let event = wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::OperationFailed { .. })
        })
        .await;
        match event {
            AppEvent::OperationFailed { key: k, message } => {
                assert_eq!(k, key);
                assert!(message.contains("read failed"), "{message}");
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_scan_applies_service_filters_from_settings() {
        let (_characteristic, _session, access) = battery_setup();
        let settings = Settings {
            filter_scan_to_services: true,
            ..Default::default()
        };
        let mut harness = spawn_service_with(access.clone(), settings);

        harness.commands.send(BluetoothCommand::StartScan).unwrap();
        wait_for(&mut harness.events, |e| {
            matches!(e, AppEvent::LogMessage(msg) if msg.message.starts_with("Scanning"))
        })
        .await;

        assert_eq!(access.scans_started.load(Ordering::Relaxed), 1);
        let filters = access.last_filters.lock().unwrap().clone();
        assert!(filters.contains(&"0000180f-0000-1000-8000-00805f9b34fb".to_string()));
    }
}
