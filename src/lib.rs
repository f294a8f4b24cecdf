pub mod capture;
pub mod meter;
pub mod session;
pub mod settings;
pub mod utils;

#[cfg(feature = "desktop")]
mod commands;

#[cfg(feature = "desktop")]
pub use desktop::run;

#[cfg(feature = "desktop")]
mod desktop {
    use std::sync::Arc;

    use log::{error, warn};
    use tauri::{AppHandle, Emitter, Manager};
    use tokio::sync::broadcast::error::RecvError;

    use crate::capture::{TesseractConfig, TesseractRecognizer};
    use crate::commands::{
        get_meter_state, get_settings, get_stats, get_version, reset_stats, save_settings,
        set_capture_region, start_capture, stop_capture, test_ocr,
    };
    use crate::session::{MeterEvent, SessionController};
    use crate::settings::SettingsStore;

    pub(crate) struct AppState {
        pub(crate) meter: SessionController<TesseractRecognizer>,
    }

    fn forward_event(app_handle: &AppHandle, event: &MeterEvent) {
        let result = match event {
            MeterEvent::StatsUpdated(stats) => app_handle.emit(event.name(), stats),
            MeterEvent::NewHit(value) => app_handle.emit(event.name(), value),
            MeterEvent::StatusChanged(update) => app_handle.emit(event.name(), update.label()),
            MeterEvent::ResetAcknowledged => app_handle.emit(event.name(), ()),
        };

        if let Err(err) = result {
            warn!("failed to emit {}: {err}", event.name());
        }
    }

    #[cfg_attr(mobile, tauri::mobile_entry_point)]
    pub fn run() {
        crate::utils::logging::init();

        log::info!("DPS meter starting up...");

        tauri::Builder::default()
            .setup(|app| {
                let result = (|| -> anyhow::Result<()> {
                    let app_data_dir = app
                        .path()
                        .app_data_dir()
                        .map_err(|err| anyhow::anyhow!(err))?;
                    std::fs::create_dir_all(&app_data_dir)?;

                    let settings = Arc::new(SettingsStore::new(app_data_dir.join("settings.json"))?);
                    let recognizer = Arc::new(TesseractRecognizer::new(TesseractConfig {
                        char_whitelist: settings.get().ocr_whitelist,
                        ..TesseractConfig::default()
                    }));
                    let meter = SessionController::new(Arc::clone(&recognizer), settings);

                    let mut events = meter.subscribe();
                    let app_handle = app.handle().clone();
                    tauri::async_runtime::spawn(async move {
                        loop {
                            match events.recv().await {
                                Ok(event) => forward_event(&app_handle, &event),
                                Err(RecvError::Lagged(skipped)) => {
                                    warn!("overlay event forwarder lagged; skipped {skipped} events")
                                }
                                Err(RecvError::Closed) => break,
                            }
                        }
                    });

                    // OCR init runs in the background; starting capture before it
                    // finishes waits on it.
                    let meter_for_init = meter.clone();
                    tauri::async_runtime::spawn(async move {
                        match recognizer.initialize().await {
                            Ok(()) => meter_for_init.announce_ready().await,
                            Err(err) => error!("Failed to initialize OCR engine: {err}"),
                        }
                    });

                    app.manage(AppState { meter });
                    Ok(())
                })();

                result.map_err(|err| err.into())
            })
            .invoke_handler(tauri::generate_handler![
                start_capture,
                stop_capture,
                reset_stats,
                get_stats,
                get_meter_state,
                get_settings,
                save_settings,
                set_capture_region,
                test_ocr,
                get_version,
            ])
            .run(tauri::generate_context!())
            .expect("error while running tauri application");
    }
}
