// ABOUTME: Main library for the SQL Magpie sync engine
// ABOUTME: Contains module declarations and the shared backend response envelope

use serde::{Deserialize, Serialize};

// Module declarations
pub mod config;
pub mod models;
pub mod sync;

/// Standard response envelope returned by every backend call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

impl<T> BackendResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            message: Some(message),
            data: None,
        }
    }
}
