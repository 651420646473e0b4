use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found")]
    NotFound,

    /// No valid actor session. Kept separate from `Forbidden` internally for
    /// audit clarity; the HTTP layer renders both without leaking which.
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid actor, insufficient role or capability.
    #[error("Forbidden")]
    Forbidden,

    /// Concurrent mutation collision. Callers should reload and retry, not
    /// blindly resubmit.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Destructive admin action invoked without `confirm: true`.
    #[error("Confirmation required")]
    ConfirmationRequired,

    /// A member may never remove themself, independent of role.
    #[error("Cannot remove yourself")]
    SelfRemoval,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Copy, Debug)]
pub enum ErrorCode {
    DatabaseError,
    NotFound,
    Unauthorized,
    Forbidden,
    Conflict,
    ConfirmationRequired,
    SelfRemoval,
    InvalidInput,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            ErrorCode::SelfRemoval => "SELF_REMOVAL",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
