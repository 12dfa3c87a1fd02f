// HTTP handlers: version, host records, redacted config, host actions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use serde::Deserialize;

use super::AppState;
use crate::actions::{self, HostAction};

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// GET /version — returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/hosts — last-known record of every host, sorted by name.
pub(super) async fn hosts_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.store.all().await)
}

pub(super) async fn host_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.store.get(&name).await {
        Some(record) => axum::Json(record).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            axum::Json(serde_json::json!({ "error": format!("unknown host {name}") })),
        )
            .into_response(),
    }
}

/// GET /api/config — effective configuration with addresses and credentials masked.
pub(super) async fn config_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(state.config.diagnostics())
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ActionRequest {
    #[serde(default)]
    command: Option<String>,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// POST /api/hosts/{name}/actions/{action} — update_packages, reboot, or run (body `{"command": ...}`).
pub(super) async fn action_handler(
    State(state): State<AppState>,
    Path((name, action)): Path<(String, String)>,
    body: Option<axum::Json<ActionRequest>>,
) -> impl IntoResponse {
    let settings = &state.config.actions;
    if !settings.enabled {
        return error_response(StatusCode::FORBIDDEN, "host actions are disabled");
    }
    let action: HostAction = match action.parse() {
        Ok(a) => a,
        Err(e) => return error_response(StatusCode::NOT_FOUND, e),
    };
    if action == HostAction::Run && !settings.allow_run_command {
        return error_response(StatusCode::FORBIDDEN, "run is disabled");
    }
    let Some(host) = state.config.hosts.iter().find(|h| h.name == name) else {
        return error_response(StatusCode::NOT_FOUND, format!("unknown host {name}"));
    };
    let request = body.map(|axum::Json(b)| b).unwrap_or_default();
    let command = match actions::command_for(action, request.command.as_deref()) {
        Ok(c) => c,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    match actions::run_action(
        state.executor.as_ref(),
        host,
        action,
        &command,
        settings.timeout(),
    )
    .await
    {
        Ok(out) => axum::Json(out).into_response(),
        Err(e) => {
            tracing::warn!(
                host = %host.name,
                action = %action,
                error = %e,
                operation = "host_action",
                "host action failed"
            );
            (
                StatusCode::BAD_GATEWAY,
                axum::Json(serde_json::json!({ "error": e.to_string(), "kind": e.kind() })),
            )
                .into_response()
        }
    }
}
