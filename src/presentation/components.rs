use eframe::egui;

use crate::domain::models::MessageSeverity;

pub struct Components;

impl Components {
    pub fn card<R>(
        ui: &mut egui::Ui,
        title: &str,
        add_contents: impl FnOnce(&mut egui::Ui) -> R,
    ) -> R {
        let stroke = ui.style().visuals.widgets.noninteractive.bg_stroke;
        let bg = ui.style().visuals.widgets.noninteractive.bg_fill;

        egui::Frame::none()
            .inner_margin(egui::Margin::same(15.0))
            .stroke(stroke)
            .fill(bg)
            .show(ui, |ui| {
                ui.vertical(|ui| {
                    ui.label(egui::RichText::new(title).strong().size(18.0));
                    ui.add_space(8.0);
                    add_contents(ui)
                })
                .inner
            })
            .inner
    }

    pub fn status_banner(
        ui: &mut egui::Ui,
        text: &str,
        bg_color: egui::Color32,
        text_color: egui::Color32,
    ) {
        ui.add_sized(
            [ui.available_width(), 35.0],
            egui::Label::new(
                egui::RichText::new(text)
                    .color(text_color)
                    .background_color(bg_color)
                    .size(16.0)
                    .strong(),
            )
            .wrap_mode(egui::TextWrapMode::Extend),
        );
    }

    /// A small framed tag, used for property lists and counters.
    pub fn pill(ui: &mut egui::Ui, text: &str) {
        let stroke = ui.style().visuals.widgets.noninteractive.bg_stroke;
        egui::Frame::none()
            .inner_margin(egui::Margin::symmetric(8.0, 3.0))
            .stroke(stroke)
            .show(ui, |ui| {
                ui.label(egui::RichText::new(text).size(12.0));
            });
    }

    pub fn mono(ui: &mut egui::Ui, text: &str) {
        ui.label(egui::RichText::new(text).monospace());
    }

    pub fn severity_color(severity: MessageSeverity) -> egui::Color32 {
        match severity {
            MessageSeverity::Info => egui::Color32::from_rgb(50, 50, 255),
            MessageSeverity::Success => egui::Color32::from_rgb(0, 150, 0),
            MessageSeverity::Warning => egui::Color32::from_rgb(200, 150, 0),
            MessageSeverity::Error => egui::Color32::RED,
        }
    }
}
