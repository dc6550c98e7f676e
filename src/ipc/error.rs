use serde_json::json;
use thiserror::Error;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failure of a single request. Each variant maps to one wire error code.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadParams(String),

    #[error("select a workspace first")]
    NoWorkspace,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Io {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error(transparent)]
    Db(#[from] rusqlite::Error),

    #[error("{0:#}")]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::BadParams(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadParams(_) => "bad_params",
            Self::NoWorkspace => "no_workspace",
            Self::NotAuthenticated => "not_authenticated",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Io { .. } => "io_failed",
            Self::Db(_) => "db_query_failed",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        let code = self.code();
        if matches!(self, Self::Db(_) | Self::Internal(_)) {
            tracing::error!(request_id = id, code, error = %self, "request failed");
        }
        let message = self.to_string();
        let details = match self {
            Self::Io { details, .. } => details,
            _ => None,
        };
        err(id, code, message, details)
    }
}

pub fn respond(id: &str, result: Result<serde_json::Value, HandlerError>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => e.response(id),
    }
}
