//! JSON bodies of the HTTP endpoints.

use serde::{Deserialize, Serialize};

/// One stored file, as listed by `GET /files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// File name as uploaded.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
}

/// Body of `GET /check`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Human-readable server status.
    pub status: String,
    /// Qubits exchanged per protocol run.
    pub qubits: usize,
}

/// Body of `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Human-readable liveness text.
    pub message: String,
}

/// Body of a successful `POST /upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Where the file ended up.
    pub info: String,
}

/// Body of any failed request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// What went wrong.
    pub error: String,
}

impl ErrorResponse {
    /// Wrap an error description.
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}
