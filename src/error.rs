use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no category given for {url}")]
    MissingCategory { url: String },

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status {
        url: String,
        status: StatusCode,
        headers: HeaderMap,
    },

    #[error("archive {}: {source}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Coarse classification used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MissingCategory { .. }
            | Error::InvalidSelector { .. }
            | Error::InvalidUrl { .. } => "config",
            Error::Request { .. } | Error::Status { .. } => "transport",
            Error::Archive { .. } => "archive",
            Error::Io { .. } => "io",
        }
    }

    /// Response headers, when the failure came with a response.
    pub fn headers(&self) -> Option<&HeaderMap> {
        match self {
            Error::Status { headers, .. } => Some(headers),
            _ => None,
        }
    }
}
