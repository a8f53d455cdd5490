use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Auth,
    Decode,
    Remote,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization code rejected: {0}")]
    InvalidCode(String),
    #[error("refresh token rejected: {0}")]
    InvalidRefreshToken(String),
    #[error("network failure: {0}")]
    NetworkFailure(String),
    #[error("malformed token response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("empty response body")]
    Empty,
    #[error("not found")]
    NotFound,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("service returned error {code}: {message}")]
    Remote { code: i64, message: String },
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Malformed(format!("{e}"))
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("unauthorized")]
    Unauthorized,
    #[error("network failure: {0}")]
    Network(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Decode(DecodeError),
    #[error("service returned error {code}: {message}")]
    Remote { code: i64, message: String },
    #[error("status saved but episode progress was not: {0}")]
    PartialUpdate(Box<Error>),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Remote { code: 401, .. } => Error::Unauthorized,
            DecodeError::Remote { code, message } => Error::Remote { code, message },
            e => Error::Decode(e),
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unauthorized => ErrorKind::Auth,
            Error::Network(_) => ErrorKind::Network,
            Error::Auth(AuthError::NetworkFailure(_)) => ErrorKind::Network,
            Error::Auth(_) => ErrorKind::Auth,
            Error::Decode(_) => ErrorKind::Decode,
            Error::Remote { .. } | Error::Other(_) => ErrorKind::Remote,
            Error::PartialUpdate(e) => e.kind(),
        }
    }

    /// Whether refreshing the token and retrying once may help.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Unauthorized => true,
            Error::PartialUpdate(e) => e.is_unauthorized(),
            _ => false,
        }
    }
}
