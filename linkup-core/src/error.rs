use thiserror::Error;

/// Infrastructure failures raised while wiring up the service.
#[derive(Error, Debug)]
pub enum LinkupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IPC error: {0}")]
    Ipc(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Typed failures of the connection graph and mailbox operations.
///
/// Every variant except `StoreUnavailable` is semantic (bad input or state)
/// and must not be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("a member cannot send a connection request to themselves")]
    SelfRequest,

    #[error("an active connection already exists between {0} and {1}")]
    AlreadyConnected(String, String),

    #[error("{target} is not within reach of {requester}")]
    Unreachable { requester: String, target: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("message body must not be empty")]
    EmptyBody,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl DomainError {
    /// Stable wire code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::SelfRequest => "self_request",
            DomainError::AlreadyConnected(..) => "already_connected",
            DomainError::Unreachable { .. } => "unreachable",
            DomainError::NotFound(_) => "not_found",
            DomainError::InvalidTransition(_) => "invalid_transition",
            DomainError::Unauthorized(_) => "unauthorized",
            DomainError::EmptyBody => "empty_body",
            DomainError::StoreUnavailable(_) => "store_unavailable",
        }
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(e: sqlx::Error) -> Self {
        DomainError::StoreUnavailable(e.to_string())
    }
}
