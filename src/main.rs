mod domain;
mod infrastructure;
mod presentation;

use eframe::egui;

fn main() -> Result<(), eframe::Error> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 700.0])
            .with_title("GATTScope"),
        ..Default::default()
    };

    eframe::run_native(
        "GATTScope",
        options,
        Box::new(|cc| Ok(Box::new(presentation::app::GattScopeApp::new(cc)))),
    )
}
