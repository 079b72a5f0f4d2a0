use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;
use tracing::error;

use crate::domain::models::{
    AppEvent, BluetoothCommand, ConnectionStatus, DeviceSnapshot, DiscoveredDevice,
    MessageSeverity, ServiceRecord, StatusMessage,
};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::backend::BtleplugAccess;
use crate::infrastructure::bluetooth::BluetoothService;

/// Interactive state for one characteristic row.
#[derive(Default)]
pub struct CharacteristicUiState {
    pub write_input: String,
    pub last_value: Option<String>,
    pub notifying: bool,
    /// An operation is outstanding; controls are disabled until the worker
    /// answers.
    pub busy: bool,
    pub error: Option<String>,
}

pub struct GattScopeApp {
    // Services
    pub(crate) settings: Arc<Mutex<SettingsService>>,

    // Bluetooth worker bridge
    pub(crate) command_tx: mpsc::UnboundedSender<BluetoothCommand>,
    event_rx: mpsc::UnboundedReceiver<AppEvent>,

    // State
    pub(crate) adapter_available: Option<bool>,
    pub(crate) connection_status: ConnectionStatus,
    pub(crate) status_message: Option<StatusMessage>,
    pub(crate) is_scanning: bool,
    pub(crate) discovered: Vec<DiscoveredDevice>,
    pub(crate) device: Option<DeviceSnapshot>,
    pub(crate) services: Vec<ServiceRecord>,
    pub(crate) characteristic_ui: HashMap<String, CharacteristicUiState>,

    // UI Options
    pub(crate) is_dark_mode: bool,

    // Logging guard
    pub(crate) _logging_guard: Option<crate::infrastructure::logging::LoggingGuard>,
}

impl GattScopeApp {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        crate::presentation::theme::configure(&cc.egui_ctx, false);

        let settings_service = SettingsService::new().expect("Failed to load settings");

        let logging_guard =
            crate::infrastructure::logging::init_logger(&settings_service.get().log_settings)
                .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
                .ok();

        tracing::info!("Starting GATTScope");

        let settings = Arc::new(Mutex::new(settings_service));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let worker_settings = settings.clone();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("Failed to create tokio runtime for Bluetooth");

            rt.block_on(async move {
                let (provider_tx, provider_rx) = mpsc::unbounded_channel();
                let provider = match BtleplugAccess::new(provider_tx).await {
                    Ok(provider) => Arc::new(provider),
                    Err(err) => {
                        error!(%err, "bluetooth adapter unavailable");
                        let _ = event_tx.send(AppEvent::AdapterAvailability(false));
                        let _ = event_tx.send(AppEvent::LogMessage(StatusMessage {
                            message: format!("Bluetooth unavailable: {err}"),
                            severity: MessageSeverity::Error,
                        }));
                        return;
                    }
                };

                BluetoothService::new(provider, event_tx, worker_settings)
                    .run(command_rx, provider_rx)
                    .await;
            });
        });

        Self {
            settings,
            command_tx,
            event_rx,
            adapter_available: None,
            connection_status: ConnectionStatus::Disconnected,
            status_message: None,
            is_scanning: false,
            discovered: Vec::new(),
            device: None,
            services: Vec::new(),
            characteristic_ui: HashMap::new(),
            is_dark_mode: false,
            _logging_guard: logging_guard,
        }
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::AdapterAvailability(available) => {
                self.adapter_available = Some(available);
            }
            AppEvent::DeviceFound(device) => {
                if let Some(existing) = self.discovered.iter_mut().find(|d| d.id == device.id) {
                    existing.name = device.name;
                    existing.signal_strength = device.signal_strength;
                } else {
                    self.discovered.push(device);
                }
            }
            AppEvent::ConnectionStatus(status) => {
                self.connection_status = status;
                match status {
                    ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                        // Enumeration failures and disconnects clear the
                        // snapshot; a fresh scan is required.
                        self.device = None;
                        self.services.clear();
                        self.characteristic_ui.clear();
                    }
                    ConnectionStatus::Connected | ConnectionStatus::Connecting => {}
                }
            }
            AppEvent::InspectionReady { device, services } => {
                self.characteristic_ui = services
                    .iter()
                    .flat_map(|s| s.characteristics.iter())
                    .map(|c| (c.key.clone(), CharacteristicUiState::default()))
                    .collect();
                self.status_message = Some(StatusMessage {
                    message: format!("Connected to {} ({} services)", device.name, services.len()),
                    severity: MessageSeverity::Success,
                });
                self.device = Some(device);
                self.services = services;
            }
            AppEvent::CharacteristicValue { key, display } => {
                if let Some(state) = self.characteristic_ui.get_mut(&key) {
                    state.last_value = Some(display);
                    state.busy = false;
                    state.error = None;
                }
            }
            AppEvent::WriteDone { key } => {
                if let Some(state) = self.characteristic_ui.get_mut(&key) {
                    state.busy = false;
                    state.error = None;
                }
            }
            AppEvent::NotifyState { key, enabled } => {
                if let Some(state) = self.characteristic_ui.get_mut(&key) {
                    state.notifying = enabled;
                    state.busy = false;
                }
            }
            AppEvent::OperationFailed { key, message } => {
                if let Some(state) = self.characteristic_ui.get_mut(&key) {
                    state.busy = false;
                    state.error = Some(message);
                }
            }
            AppEvent::LogMessage(message) => {
                self.status_message = Some(message);
            }
        }
    }
}

impl eframe::App for GattScopeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply_event(event);
        }

        // Worker events arrive while the UI is idle; keep polling.
        ctx.request_repaint_after(Duration::from_millis(100));

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.label(egui::RichText::new("GATTScope").strong());

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode {
                        "☀ Light"
                    } else {
                        "🌙 Dark"
                    };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        crate::presentation::theme::configure(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.set_max_width(820.0);
                    ui.add_space(20.0);

                    crate::presentation::panels::render(self, ui);

                    ui.add_space(50.0);
                });
            });
        });
    }
}
