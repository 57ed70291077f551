use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use serde::Serialize;
use serde_json::json;

use super::subsonic::{library_error, ok_empty, ok_with, ApiResult};
use crate::scan::start_scan as trigger_scan;
use crate::state::{AppState, LastScan};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScanStatus {
    scanning: bool,
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_finished: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_error: Option<String>,
}

pub async fn ping() -> Response {
    ok_empty()
}

pub async fn get_license() -> Response {
    ok_with("license", json!({ "valid": true }))
}

pub async fn get_music_folders(State(state): State<AppState>) -> ApiResult {
    let root_id = state
        .library
        .root_folder()
        .map_err(library_error)?
        .map(|root| root.id)
        .unwrap_or(0);
    Ok(ok_with(
        "musicFolders",
        json!({ "musicFolder": [{ "id": root_id, "name": state.config.folder_name() }] }),
    ))
}

/// Fire-and-forget; reports whether a scan is running after the trigger.
pub async fn start_scan(State(state): State<AppState>) -> ApiResult {
    let started = trigger_scan(&state, "request");
    scan_status(&state, started)
}

pub async fn get_scan_status(State(state): State<AppState>) -> ApiResult {
    scan_status(&state, false)
}

fn scan_status(state: &AppState, started: bool) -> ApiResult {
    let stats = state.library.stats().map_err(library_error)?;
    let (last_finished, last_error) = match &*state.last_scan.read() {
        LastScan::Never => (None, None),
        LastScan::Finished(summary) => (Some(summary.finished_at), None),
        LastScan::Failed(message) => (None, Some(message.clone())),
    };
    Ok(ok_with(
        "scanStatus",
        ScanStatus {
            scanning: started || state.scanner.is_scanning(),
            count: stats.tracks,
            last_finished,
            last_error,
        },
    ))
}

pub async fn music_folder_settings() -> Response {
    Redirect::to("/rest/startScan.view").into_response()
}
