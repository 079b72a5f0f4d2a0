use std::collections::HashMap;

use eframe::egui;
use tokio::sync::mpsc;

use crate::domain::models::{
    BluetoothCommand, CharacteristicRecord, ConnectionStatus, ServiceRecord,
};
use crate::presentation::app::{CharacteristicUiState, GattScopeApp};
use crate::presentation::components::Components;

pub fn render(app: &mut GattScopeApp, ui: &mut egui::Ui) {
    hero_panel(app, ui);
    ui.add_space(15.0);

    optional_services_panel(app, ui);

    if !app.discovered.is_empty() && app.device.is_none() {
        ui.add_space(15.0);
        devices_panel(app, ui);
    }

    if app.device.is_some() {
        ui.add_space(15.0);
        device_panel(app, ui);
    }

    ui.add_space(15.0);
    services_panel(app, ui);
}

fn hero_panel(app: &mut GattScopeApp, ui: &mut egui::Ui) {
    Components::card(ui, "Scan for a Bluetooth device", |ui| {
        ui.label(
            "Start a scan to pick a nearby device, connect, and inspect its \
             available services and characteristics.",
        );

        let (status_text, bg_color, text_color) = match app.connection_status {
            ConnectionStatus::Connected => (
                "CONNECTED",
                egui::Color32::from_rgb(0, 200, 0),
                egui::Color32::BLACK,
            ),
            ConnectionStatus::Connecting => (
                "CONNECTING...",
                egui::Color32::from_rgb(255, 200, 0),
                egui::Color32::BLACK,
            ),
            ConnectionStatus::Disconnected => (
                "DISCONNECTED",
                egui::Color32::from_gray(100),
                egui::Color32::WHITE,
            ),
            ConnectionStatus::Error => (
                "ERROR",
                egui::Color32::from_rgb(255, 50, 50),
                egui::Color32::WHITE,
            ),
        };
        Components::status_banner(ui, status_text, bg_color, text_color);

        ui.add_space(10.0);

        ui.horizontal(|ui| {
            if app.is_scanning {
                if ui.button("Stop scan").clicked() {
                    app.is_scanning = false;
                    let _ = app.command_tx.send(BluetoothCommand::StopScan);
                }
                ui.spinner();
            } else if ui.button("Start scan").clicked() {
                app.is_scanning = true;
                app.discovered.clear();
                app.device = None;
                app.services.clear();
                app.characteristic_ui.clear();
                app.status_message = None;
                let _ = app.command_tx.send(BluetoothCommand::StartScan);
            }

            if app.connection_status == ConnectionStatus::Connected
                && ui.button("Disconnect").clicked()
            {
                let _ = app.command_tx.send(BluetoothCommand::Disconnect);
            }

            if app.adapter_available == Some(false) {
                Components::pill(ui, "Bluetooth unavailable");
            }
        });

        if let Some(message) = &app.status_message {
            ui.label(
                egui::RichText::new(&message.message)
                    .color(Components::severity_color(message.severity))
                    .strong(),
            );
        }
    });
}

fn optional_services_panel(app: &mut GattScopeApp, ui: &mut egui::Ui) {
    egui::CollapsingHeader::new("Optional services")
        .default_open(false)
        .show(ui, |ui| {
            let Ok(mut settings) = app.settings.lock() else {
                return;
            };

            ui.label(
                "Default Bluetooth services are prefilled. Add UUIDs or service \
                 names to include custom services when requesting a device.",
            );

            let response = ui.add(
                egui::TextEdit::multiline(&mut settings.get_mut().custom_services_input)
                    .desired_rows(3)
                    .hint_text("custom_service, 12345678-1234-1234-1234-1234567890ab"),
            );
            let mut changed = response.lost_focus();

            if ui
                .checkbox(
                    &mut settings.get_mut().filter_scan_to_services,
                    "Only list devices advertising these services",
                )
                .changed()
            {
                changed = true;
            }

            if changed {
                if let Err(err) = settings.save() {
                    tracing::warn!(%err, "failed to save settings");
                }
            }

            ui.horizontal_wrapped(|ui| {
                for service in settings.get().allowed_services() {
                    Components::pill(ui, &service);
                }
            });
        });
}

fn devices_panel(app: &mut GattScopeApp, ui: &mut egui::Ui) {
    let mut connect_to: Option<String> = None;

    Components::card(ui, "Nearby devices", |ui| {
        egui::ScrollArea::vertical()
            .id_salt("scan_results")
            .max_height(160.0)
            .show(ui, |ui| {
                for device in &app.discovered {
                    ui.horizontal(|ui| {
                        ui.label(&device.name);
                        Components::mono(ui, &device.id);
                        if let Some(rssi) = device.signal_strength {
                            ui.label(format!("{rssi} dBm"));
                        }
                        if ui.button("Connect").clicked() {
                            connect_to = Some(device.id.clone());
                        }
                    });
                }
            });
    });

    if let Some(device_id) = connect_to {
        app.is_scanning = false;
        app.connection_status = ConnectionStatus::Connecting;
        let _ = app.command_tx.send(BluetoothCommand::Connect(device_id));
    }
}

fn device_panel(app: &mut GattScopeApp, ui: &mut egui::Ui) {
    let Some(device) = &app.device else {
        return;
    };

    Components::card(ui, "Connected device", |ui| {
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label(egui::RichText::new(&device.name).strong().size(16.0));
                Components::mono(ui, &device.id);
            });
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                Components::pill(ui, &format!("{} services", app.services.len()));
            });
        });
    });
}

fn services_panel(app: &mut GattScopeApp, ui: &mut egui::Ui) {
    if app.services.is_empty() {
        if app.device.is_none() && !app.is_scanning {
            ui.label(egui::RichText::new("Scan to list available services.").weak());
        }
        return;
    }

    for service in &app.services {
        service_card(service, &mut app.characteristic_ui, &app.command_tx, ui);
        ui.add_space(10.0);
    }
}

fn service_card(
    service: &ServiceRecord,
    states: &mut HashMap<String, CharacteristicUiState>,
    commands: &mpsc::UnboundedSender<BluetoothCommand>,
    ui: &mut egui::Ui,
) {
    Components::card(ui, &service.label, |ui| {
        if service.characteristics.is_empty() {
            ui.label(egui::RichText::new("No characteristics reported.").weak());
            return;
        }

        for (index, characteristic) in service.characteristics.iter().enumerate() {
            if index > 0 {
                ui.separator();
            }
            characteristic_row(
                characteristic,
                states.get_mut(&characteristic.key),
                commands,
                ui,
            );
        }
    });
}

fn characteristic_row(
    characteristic: &CharacteristicRecord,
    state: Option<&mut CharacteristicUiState>,
    commands: &mpsc::UnboundedSender<BluetoothCommand>,
    ui: &mut egui::Ui,
) {
    ui.horizontal(|ui| {
        Components::mono(ui, &characteristic.label);
        if !characteristic.operations.is_empty() {
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                Components::pill(ui, &characteristic.operations.join(" • "));
            });
        }
    });

    if let Some(presentation) = &characteristic.presentation {
        ui.label(egui::RichText::new(presentation).weak().size(12.0));
    }

    for descriptor in &characteristic.descriptors {
        let mut line = descriptor.label.clone();
        if let Some(value) = &descriptor.value {
            line.push_str(&format!(" — {value}"));
        }
        if let Some(presentation) = &descriptor.presentation {
            line.push_str(&format!(" — {presentation}"));
        }
        ui.label(egui::RichText::new(line).weak().size(12.0));
    }

    let Some(state) = state else {
        return;
    };

    ui.horizontal(|ui| {
        if characteristic.capabilities.supports_read
            && ui
                .add_enabled(!state.busy, egui::Button::new("Read"))
                .clicked()
        {
            state.busy = true;
            state.error = None;
            let _ = commands.send(BluetoothCommand::Read {
                key: characteristic.key.clone(),
            });
        }

        if characteristic.capabilities.supports_notify {
            let label = if state.notifying { "Stop notifying" } else { "Notify" };
            if ui
                .add_enabled(!state.busy, egui::Button::new(label))
                .clicked()
            {
                state.busy = true;
                state.error = None;
                let _ = commands.send(BluetoothCommand::ToggleNotify {
                    key: characteristic.key.clone(),
                });
            }
        }

        if let Some(value) = &state.last_value {
            Components::mono(ui, value);
        }
    });

    if characteristic.capabilities.supports_write {
        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut state.write_input)
                    .hint_text("hex pairs or text")
                    .desired_width(220.0),
            );
            if ui
                .add_enabled(!state.busy, egui::Button::new("Write"))
                .clicked()
            {
                state.busy = true;
                state.error = None;
                let _ = commands.send(BluetoothCommand::Write {
                    key: characteristic.key.clone(),
                    input: state.write_input.clone(),
                });
            }
        });
    }

    if let Some(error) = &state.error {
        ui.label(
            egui::RichText::new(error)
                .color(egui::Color32::RED)
                .size(12.0),
        );
    }
}
