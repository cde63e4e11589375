//! RPC error responses.
//!
//! Errors travel as `{"code": ..., "message": ...}` with an HTTP status
//! that matches the code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::service::{RpcCode, RpcError};

/// Wire form of an `RpcError`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcStatus {
    pub code: RpcCode,
    pub message: String,
}

pub fn status_for(code: RpcCode) -> StatusCode {
    match code {
        RpcCode::NotFound => StatusCode::NOT_FOUND,
        RpcCode::InvalidArgument => StatusCode::BAD_REQUEST,
        RpcCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        if self.code == RpcCode::Internal {
            tracing::error!(message = %self.message, "RPC failed");
        }
        let body = RpcStatus {
            code: self.code,
            message: self.message,
        };
        (status_for(body.code), Json(body)).into_response()
    }
}
