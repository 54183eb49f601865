//! Response envelope.
//!
//! Every JSON response has the same shape:
//! ```text
//! { "code": 200, "msg": "ok", "data": ... }
//! ```
//! `code` comes from the fixed `ResponseCode` table and doubles as the HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Fixed table of response codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    InvalidParams,
    NotFound,
    Error,
}

impl ResponseCode {
    pub fn as_u16(self) -> u16 {
        match self {
            ResponseCode::Success => 200,
            ResponseCode::InvalidParams => 400,
            ResponseCode::NotFound => 404,
            ResponseCode::Error => 500,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ResponseCode::Success => "ok",
            ResponseCode::InvalidParams => "invalid params",
            ResponseCode::NotFound => "not found",
            ResponseCode::Error => "internal error",
        }
    }

    pub fn status(self) -> StatusCode {
        StatusCode::from_u16(self.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// The response envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self::with_code(ResponseCode::Success, Some(data))
    }

    pub fn with_code(code: ResponseCode, data: Option<T>) -> Self {
        Self {
            code: code.as_u16(),
            msg: code.message().to_string(),
            data,
        }
    }
}

impl ApiResponse<()> {
    /// An envelope with no data and the code's fixed message.
    pub fn error(code: ResponseCode) -> Self {
        Self::with_code(code, None)
    }

    /// An envelope with no data and a custom message.
    pub fn error_with_msg(code: ResponseCode, msg: impl Into<String>) -> Self {
        Self {
            code: code.as_u16(),
            msg: msg.into(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}
