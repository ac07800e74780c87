//! Response envelope shared by every read operation

use crate::error::{FantasyError, FantasyResult};
use serde::Serialize;

/// `{ "ok": true, ...payload }` or `{ "ok": false, "error": "..." }`.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiResponse<T: Serialize> {
    Success {
        ok: bool,
        #[serde(flatten)]
        payload: T,
    },
    Failure {
        ok: bool,
        error: String,
    },
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(payload: T) -> Self {
        ApiResponse::Success { ok: true, payload }
    }

    pub fn failure(error: &FantasyError) -> Self {
        ApiResponse::Failure { ok: false, error: error.to_string() }
    }

    /// Status code and envelope for an operation outcome.
    pub fn from_result(result: FantasyResult<T>) -> (u16, Self) {
        match result {
            Ok(payload) => (200, Self::success(payload)),
            Err(err) => (err.status_code(), Self::failure(&err)),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ApiResponse::Success { .. })
    }
}
