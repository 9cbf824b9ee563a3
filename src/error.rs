use thiserror::Error;

/// Failure of a single call against an external REST API.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("request to {path} failed with status {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },
    #[error("request to {path} could not be sent: {message}")]
    Transport { path: String, message: String },
    #[error("response from {path} could not be decoded: {message}")]
    Decode { path: String, message: String },
    #[error("request to {path} timed out")]
    Timeout { path: String },
}

impl FetchError {
    pub fn path(&self) -> &str {
        match self {
            FetchError::Status { path, .. }
            | FetchError::Transport { path, .. }
            | FetchError::Decode { path, .. }
            | FetchError::Timeout { path } => path,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 401/403: the access token is expired, revoked or lacks a scope.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self.status(), Some(401) | Some(403))
    }

    /// Transport failures, timeouts, 429 and 5xx are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport { .. } | FetchError::Timeout { .. } => true,
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode { .. } => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("authorization code is missing")]
    MissingCode,
    #[error("no access token in session, please log in")]
    MissingToken,
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
    #[error("access token is invalid or expired, please log in again: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },
}

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DashboardError {
    /// Unauthorized fetches fail the whole operation as an auth problem.
    pub fn from_fetch(err: FetchError) -> Self {
        if err.is_unauthorized() {
            DashboardError::Auth(AuthError::InvalidToken(err.to_string()))
        } else {
            DashboardError::Fetch(err)
        }
    }
}
