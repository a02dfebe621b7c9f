use meshsync_engine::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("GET {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("GET {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("GET {url} returned an undecodable body: {message}")]
    Decode { url: String, message: String },
}

impl ClientError {
    pub(crate) fn from_ureq(url: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::Status {
                status,
                url: url.to_string(),
            },
            ureq::Error::Json(e) => Self::Decode {
                url: url.to_string(),
                message: e.to_string(),
            },
            other => Self::Transport {
                url: url.to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ClientError> for SourceError {
    fn from(err: ClientError) -> Self {
        let message = err.to_string();
        match err {
            ClientError::Status { status, url } => SourceError::Status { status, url },
            ClientError::Transport { .. } => SourceError::Transport(message),
            ClientError::Decode { .. } => SourceError::Decode(message),
        }
    }
}
