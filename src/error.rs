/// Errors produced while parsing storage urls, expanding wildcards, or talking
/// to the storage service
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("invalid wildcard pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("[{bucket}] bucket does not exist")]
    BucketNotFound { bucket: String },
    #[error("{what} already exists")]
    Conflict { what: String },
    #[error("HTTP status {status}: {message}")]
    Http {
        status: http::StatusCode,
        message: String,
    },
    #[error("invalid local wildcard: {0}")]
    LocalPattern(#[from] glob::PatternError),
    #[error("{code} Could not upload file [{local}] to [{remote}]: {message}")]
    Upload {
        code: u16,
        local: String,
        remote: String,
        message: String,
    },
    #[error("{code} Could not list bucket [{bucket}]: {message}")]
    ListBucket {
        code: u16,
        bucket: String,
        message: String,
    },
    #[error("rewrite of [{src}] to [{dst}] stopped before completing without a continuation token")]
    IncompleteRewrite { src: String, dst: String },
    #[error("{0}")]
    BadFile(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Gcs(#[from] tame_gcs::Error),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    HttpBuild(#[from] http::Error),
}

impl Error {
    #[inline]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::BucketNotFound { .. })
    }

    /// The HTTP status code associated with this error, if it came from the
    /// storage service
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound { .. } | Self::BucketNotFound { .. } => Some(404),
            Self::Conflict { .. } => Some(409),
            Self::Http { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// The service provided message, without the status prefix
    pub fn status_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
