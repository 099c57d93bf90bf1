//! HTTP routes.
//!
//! Health checks and the file endpoints. Storage is synchronous and may hit
//! the file system, so every call runs on the blocking pool. Nothing here
//! touches the hub beyond reading its config.

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use qkd_core::Environment;
use qkd_proto::http::{ErrorResponse, HealthResponse, StatusResponse, UploadResponse};

use crate::{
    AppState,
    storage::{Storage, StorageError},
    transport,
};

/// Multipart field carrying the upload.
const UPLOAD_FIELD: &str = "file";

/// Build the application router.
pub fn router<E, S>(state: AppState<E, S>) -> Router
where
    E: Environment,
    S: Storage,
{
    Router::new()
        .route("/", get(root))
        .route("/check", get(check::<E, S>))
        .route("/ws", get(transport::ws_handler::<E, S>))
        .route("/upload", post(upload::<E, S>))
        .route("/files", get(list_files::<E, S>))
        .route("/download/:filename", get(download::<E, S>))
        .with_state(state)
}

async fn root() -> Json<StatusResponse> {
    Json(StatusResponse { message: "QKD relay is running".to_string() })
}

async fn check<E: Environment, S: Storage>(
    State(state): State<AppState<E, S>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Quantum Server is Online".to_string(),
        qubits: state.hub.config().bit_count,
    })
}

async fn upload<E: Environment, S: Storage>(
    State(state): State<AppState<E, S>>,
    mut multipart: Multipart,
) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        };

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let Some(name) = field.file_name().map(str::to_owned) else {
            return error_response(StatusCode::BAD_REQUEST, "upload has no file name");
        };

        let bytes = match field.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return error_response(StatusCode::BAD_REQUEST, e.to_string()),
        };

        let size = bytes.len();
        let stored = name.clone();
        let result = on_blocking_pool(&state.storage, move |storage| storage.put(&stored, &bytes));

        return match result.await {
            Ok(()) => {
                tracing::info!(file = %name, size, "file stored");
                Json(UploadResponse { info: format!("File saved as {name}") }).into_response()
            },
            Err(e) => storage_error_response(&e),
        };
    }

    error_response(StatusCode::BAD_REQUEST, format!("missing '{UPLOAD_FIELD}' field"))
}

async fn list_files<E: Environment, S: Storage>(State(state): State<AppState<E, S>>) -> Response {
    match on_blocking_pool(&state.storage, |storage| storage.list()).await {
        Ok(files) => Json(files).into_response(),
        Err(e) => storage_error_response(&e),
    }
}

async fn download<E: Environment, S: Storage>(
    State(state): State<AppState<E, S>>,
    Path(filename): Path<String>,
) -> Response {
    let name = filename.clone();
    match on_blocking_pool(&state.storage, move |storage| storage.get(&name)).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::CONTENT_DISPOSITION, content_disposition(&filename)),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => storage_error_response(&e),
    }
}

/// Run a storage call off the async workers.
async fn on_blocking_pool<S, T, F>(storage: &S, op: F) -> Result<T, StorageError>
where
    S: Storage,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T, StorageError> + Send + 'static,
{
    let storage = storage.clone();
    tokio::task::spawn_blocking(move || op(&storage))
        .await
        .map_err(|e| StorageError::Io(format!("storage task failed: {e}")))?
}

/// `attachment` disposition with `name` as a quoted string.
fn content_disposition(name: &str) -> String {
    let mut value = String::with_capacity(name.len() + 24);
    value.push_str("attachment; filename=\"");
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            value.push('\\');
        }
        value.push(c);
    }
    value.push('"');
    value
}

fn storage_error_response(err: &StorageError) -> Response {
    match err {
        StorageError::NotFound(_) => error_response(StatusCode::NOT_FOUND, "File not found"),
        StorageError::InvalidName(_) => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        StorageError::Io(_) => {
            tracing::error!(error = %err, "storage failure");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
        },
    }
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorResponse::new(error))).into_response()
}
