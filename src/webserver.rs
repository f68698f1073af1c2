// Webserver Module - REST control surface for the mapping editor
use anyhow::Result;
use axum::{
    Router,
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::sync::Arc;

use crate::mapping::{MAX_MIDI_NOTE, Mapper, MappingFile, normalize_mapping_name};

#[derive(Clone)]
pub struct AppState {
    pub mapper: Arc<Mapper>,
    pub led_count: usize,
}

#[derive(Debug, Deserialize)]
struct SwitchMappingRequest {
    file: String,
}

#[derive(Debug, Deserialize)]
struct TriggerRequest {
    note: i64,
    #[serde(default)]
    velocity: Option<i64>,
    #[serde(default)]
    on: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct PreviewEffectRequest {
    first: i64,
    last: i64,
    step: i64,
    color: String,
    effect: String,
    #[serde(default)]
    options: serde_json::Value,
    #[serde(default)]
    on: Option<bool>,
}

fn bad_request(message: impl ToString) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.to_string() })),
    )
        .into_response()
}

async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "currentMapping": state.mapper.current_mapping(),
        "ledCount": state.led_count,
        "status": "running",
    }))
}

async fn list_mappings(State(state): State<AppState>) -> impl IntoResponse {
    let dir = state.mapper.mappings_dir();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::error!("Failed to read mappings directory: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to read mappings directory" })),
            )
                .into_response();
        }
    };

    let current = state.mapper.current_mapping();
    let mut mappings = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !file_name.ends_with(".json") {
            continue;
        }
        let data = match fs::read_to_string(entry.path()) {
            Ok(data) => data,
            Err(e) => {
                log::warn!("Error reading mapping file {}: {}", file_name, e);
                continue;
            }
        };
        let file: MappingFile = match serde_json::from_str(&data) {
            Ok(file) => file,
            Err(e) => {
                log::warn!("Error parsing mapping file {}: {}", file_name, e);
                continue;
            }
        };
        let last_modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map(|t| {
                chrono::DateTime::<chrono::Local>::from(t)
                    .format("%Y-%m-%d")
                    .to_string()
            })
            .unwrap_or_default();
        mappings.push(json!({
            "name": file_name,
            "title": file.name,
            "description": file.description,
            "presetCount": file.presets.len(),
            "lastModified": last_modified,
            "isActive": file_name == current,
        }));
    }
    Json(mappings).into_response()
}

async fn get_mapping(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let name = match normalize_mapping_name(&name) {
        Ok(name) => name,
        Err(e) => return bad_request(e),
    };
    let path = state.mapper.mappings_dir().join(&name);
    let data = match fs::read_to_string(&path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "mapping not found" })),
            )
                .into_response();
        }
        Err(e) => {
            log::error!("Failed to read mapping {}: {}", name, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to read mapping" })),
            )
                .into_response();
        }
    };
    match serde_json::from_str::<MappingFile>(&data) {
        Ok(file) => Json(file).into_response(),
        Err(e) => {
            log::error!("Failed to parse mapping {}: {}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to parse mapping" })),
            )
                .into_response()
        }
    }
}

async fn save_mapping(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(file): Json<MappingFile>,
) -> impl IntoResponse {
    let name = match normalize_mapping_name(&name) {
        Ok(name) => name,
        Err(e) => return bad_request(e),
    };
    if file.name.is_empty() {
        return bad_request("mapping name is required");
    }

    let path = state.mapper.mappings_dir().join(&name);
    let mut data = match serde_json::to_string_pretty(&file) {
        Ok(data) => data,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("failed to serialize mapping: {}", e) })),
            )
                .into_response();
        }
    };
    data.push('\n');
    if let Err(e) = fs::write(&path, data) {
        log::error!("Failed to save mapping {}: {}", name, e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "failed to save mapping" })),
        )
            .into_response();
    }

    // Saving over the active mapping puts the new presets live.
    if name == state.mapper.current_mapping() {
        if let Err(e) = state.mapper.load_from_file(&name) {
            log::warn!("Failed to reload current mapping after save: {:#}", e);
        }
    }

    Json(json!({ "status": "saved" })).into_response()
}

async fn delete_mapping(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let name = match normalize_mapping_name(&name) {
        Ok(name) => name,
        Err(e) => return bad_request(e),
    };
    if name == state.mapper.current_mapping() {
        return bad_request("cannot delete the currently active mapping");
    }
    match fs::remove_file(state.mapper.mappings_dir().join(&name)) {
        Ok(()) => Json(json!({ "status": "deleted" })).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "mapping not found" })),
        )
            .into_response(),
        Err(e) => {
            log::error!("Failed to delete mapping {}: {}", name, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "failed to delete mapping" })),
            )
                .into_response()
        }
    }
}

async fn switch_mapping(
    State(state): State<AppState>,
    Json(request): Json<SwitchMappingRequest>,
) -> impl IntoResponse {
    match state.mapper.switch_mapping(&request.file) {
        Ok(()) => Json(json!({
            "status": "switched",
            "mapping": state.mapper.current_mapping(),
        }))
        .into_response(),
        Err(e) => bad_request(format!("{:#}", e)),
    }
}

async fn trigger_preset(
    State(state): State<AppState>,
    Json(request): Json<TriggerRequest>,
) -> impl IntoResponse {
    if request.note < 0 || request.note > i64::from(MAX_MIDI_NOTE) {
        return bad_request(format!("note must be between 0 and {}", MAX_MIDI_NOTE));
    }
    let note = request.note as u8;
    let on = request.on.unwrap_or(true);

    // Default to max velocity for ON; clamp to the MIDI ceiling.
    let mut velocity = request.velocity.unwrap_or(0);
    if on && velocity <= 0 {
        velocity = i64::from(crate::color::MAX_VELOCITY);
    }
    let velocity = velocity.clamp(0, i64::from(crate::color::MAX_VELOCITY)) as u8;

    let result = if on {
        state.mapper.trigger_preset(note, velocity)
    } else {
        state.mapper.trigger_preset_off(note, velocity)
    };
    match result {
        Ok(()) => Json(json!({
            "status": if on { "triggered" } else { "turned off" },
            "note": note.to_string(),
        }))
        .into_response(),
        Err(e) => bad_request(format!("{:#}", e)),
    }
}

async fn clear_triggers(State(state): State<AppState>) -> impl IntoResponse {
    state.mapper.clear_all();
    Json(json!({ "status": "cleared" }))
}

async fn preview_effect(
    State(state): State<AppState>,
    Json(request): Json<PreviewEffectRequest>,
) -> impl IntoResponse {
    let max_led = state.led_count as i64 - 1;
    if request.first < 0 || request.first > max_led || request.last < 0 || request.last > max_led {
        return bad_request(format!("LED range must be between 0 and {}", max_led));
    }
    if request.on.unwrap_or(true) {
        match state.mapper.trigger_preview(
            request.first,
            request.last,
            request.step,
            &request.color,
            &request.effect,
            &request.options,
        ) {
            Ok(()) => Json(json!({
                "status": "preview triggered",
                "effect": request.effect,
            }))
            .into_response(),
            Err(e) => bad_request(format!("{:#}", e)),
        }
    } else {
        state.mapper.preview_off();
        Json(json!({ "status": "preview turned off" })).into_response()
    }
}

async fn clear_preview(State(state): State<AppState>) -> impl IntoResponse {
    state.mapper.clear_preview();
    Json(json!({ "status": "preview cleared" }))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/mappings", get(list_mappings))
        .route(
            "/api/mappings/:name",
            get(get_mapping).put(save_mapping).delete(delete_mapping),
        )
        .route("/api/switchMapping", post(switch_mapping))
        .route("/api/trigger", post(trigger_preset))
        .route("/api/trigger/clear", post(clear_triggers))
        .route("/api/preview-effect", post(preview_effect))
        .route("/api/preview-effect/clear", post(clear_preview))
        .with_state(state)
}

pub async fn run(state: AppState, ip: &str, port: u16) -> Result<()> {
    let addr = format!("{}:{}", ip, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("HTTP API listening on http://{}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
