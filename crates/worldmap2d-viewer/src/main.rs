#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use worldmap2d_viewer::{APP_NAME, Settings, WorldmapApp, setup_logging};

fn main() -> eframe::Result {
    let settings = Settings::from_cli();
    setup_logging();

    let rt = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!("Failed to start the async runtime: {}", err);
            std::process::exit(1);
        }
    };

    rt.block_on(async {
        let native_options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size([1280.0, 720.0])
                .with_title(APP_NAME),
            ..Default::default()
        };

        eframe::run_native(
            APP_NAME,
            native_options,
            Box::new(move |cc| {
                let app: Box<dyn eframe::App> = Box::new(WorldmapApp::new(cc, settings)?);
                Ok(app)
            }),
        )
    })
}
