use tauri::State;

use crate::{
    capture::{Recognition, Region, TesseractRecognizer},
    desktop::AppState,
    meter::StatsSnapshot,
    session::{MeterState, SessionController, SessionStatus},
    settings::UserSettings,
};

fn controller_from_state(state: &State<'_, AppState>) -> SessionController<TesseractRecognizer> {
    state.meter.clone()
}

#[tauri::command]
pub async fn start_capture(state: State<'_, AppState>) -> Result<SessionStatus, String> {
    let controller = controller_from_state(&state);
    controller.start().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn stop_capture(state: State<'_, AppState>) -> Result<SessionStatus, String> {
    let controller = controller_from_state(&state);
    Ok(controller.stop().await)
}

#[tauri::command]
pub async fn reset_stats(state: State<'_, AppState>) -> Result<StatsSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.reset().await)
}

#[tauri::command]
pub async fn get_stats(state: State<'_, AppState>) -> Result<StatsSnapshot, String> {
    let controller = controller_from_state(&state);
    Ok(controller.get_snapshot().await)
}

#[tauri::command]
pub async fn get_meter_state(state: State<'_, AppState>) -> Result<MeterState, String> {
    let controller = controller_from_state(&state);
    Ok(controller.get_state().await)
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> UserSettings {
    state.meter.settings()
}

#[tauri::command]
pub async fn save_settings(
    state: State<'_, AppState>,
    settings: UserSettings,
) -> Result<SessionStatus, String> {
    let controller = controller_from_state(&state);
    controller
        .update_settings(settings)
        .await
        .map_err(|e| e.to_string())
}

/// Called by the region selector window once the user has drawn a box.
#[tauri::command]
pub async fn set_capture_region(
    state: State<'_, AppState>,
    region: Option<Region>,
) -> Result<SessionStatus, String> {
    let controller = controller_from_state(&state);
    let settings = UserSettings {
        capture_region: region,
        ..controller.settings()
    };
    controller
        .update_settings(settings)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn test_ocr(state: State<'_, AppState>) -> Result<Recognition, String> {
    let controller = controller_from_state(&state);
    controller.test_ocr().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub fn get_version(app_handle: tauri::AppHandle) -> String {
    app_handle.package_info().version.to_string()
}
