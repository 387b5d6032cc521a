//! Application error taxonomy.
//!
//! Every variant maps to one HTTP status and one stable machine-readable
//! code string; the HTTP rendering itself lives in the API crate so this
//! crate stays framework-free.

/// Log level a variant should be reported at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Warn,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Client-side validation failure (bad header, bad length, bad
    /// metadata). `code` is the stable string surfaced to clients, e.g.
    /// `invalid_length` or `invalid_offset`.
    #[error("{message}")]
    InvalidInput {
        code: &'static str,
        message: String,
    },

    /// Wrong `Tus-Resumable` version on a resumable-upload request.
    #[error("unsupported Tus-Resumable version")]
    UnsupportedVersion,

    /// PATCH body with a Content-Type other than
    /// `application/offset+octet-stream`.
    #[error("Content-Type must be application/offset+octet-stream")]
    InvalidChunkContentType,

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Unauthorized {
        code: &'static str,
        message: String,
    },

    #[error("{message}")]
    Conflict {
        code: &'static str,
        message: String,
    },

    /// Resumable PATCH whose `Upload-Offset` does not match the stored
    /// offset. Carries the authoritative offset for the response body.
    #[error("Upload-Offset does not match current offset")]
    OffsetMismatch { current_offset: i64 },

    /// The resource existed but is permanently unavailable: expired,
    /// deleted, or past its download cap.
    #[error("{message}")]
    Gone {
        code: &'static str,
        message: String,
    },

    #[error("{0}")]
    PayloadTooLarge(String),

    /// The upstream messaging session is not connected; retryable.
    #[error("WhatsApp is not connected")]
    NotConnected,

    /// Admin endpoints hit while ADMIN_PASSWORD is unset.
    #[error("admin authentication is not configured")]
    AuthNotConfigured,

    /// Upstream transfer failure. `code` is `upload_failed` or
    /// `download_failed`.
    #[error("{message}")]
    Upstream {
        code: &'static str,
        message: String,
    },

    #[error("{message}")]
    Internal {
        code: &'static str,
        message: String,
    },
}

impl AppError {
    pub fn invalid_input(code: &'static str, message: impl Into<String>) -> Self {
        AppError::InvalidInput {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthorized {
            code,
            message: message.into(),
        }
    }

    pub fn conflict(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Conflict {
            code,
            message: message.into(),
        }
    }

    pub fn gone(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Gone {
            code,
            message: message.into(),
        }
    }

    pub fn upstream(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Upstream {
            code,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            code: "internal_error",
            message: message.into(),
        }
    }

    /// Internal failure with a caller-chosen stable code, e.g. `save_failed`.
    pub fn internal_with_code(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Internal {
            code,
            message: message.into(),
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            AppError::InvalidInput { .. } => 400,
            AppError::Unauthorized { .. } => 401,
            AppError::NotFound(_) => 404,
            AppError::Conflict { .. } | AppError::OffsetMismatch { .. } => 409,
            AppError::Gone { .. } => 410,
            AppError::UnsupportedVersion => 412,
            AppError::PayloadTooLarge(_) => 413,
            AppError::InvalidChunkContentType => 415,
            AppError::NotConnected | AppError::AuthNotConfigured => 503,
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Upstream { .. }
            | AppError::Internal { .. } => 500,
        }
    }

    /// Stable machine-readable code surfaced in error bodies.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Io(_) => "internal_error",
            AppError::InvalidInput { code, .. } => code,
            AppError::UnsupportedVersion => "unsupported_version",
            AppError::InvalidChunkContentType => "invalid_content_type",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized { code, .. } => code,
            AppError::Conflict { code, .. } => code,
            AppError::OffsetMismatch { .. } => "offset_mismatch",
            AppError::Gone { code, .. } => code,
            AppError::PayloadTooLarge(_) => "file_too_large",
            AppError::NotConnected => "whatsapp_not_connected",
            AppError::AuthNotConfigured => "auth_not_configured",
            AppError::Upstream { code, .. } => code,
            AppError::Internal { code, .. } => code,
        }
    }

    /// Human-readable message for clients. Internal variants are masked.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Io(_) | AppError::Internal { .. } => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn log_level(&self) -> LogLevel {
        match self {
            AppError::Database(_)
            | AppError::Io(_)
            | AppError::Upstream { .. }
            | AppError::Internal { .. } => LogLevel::Error,
            AppError::NotConnected | AppError::AuthNotConfigured => LogLevel::Warn,
            _ => LogLevel::Debug,
        }
    }
}
