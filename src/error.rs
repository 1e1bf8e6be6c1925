use crate::embedded::ExtractError;
use crate::schema::SchemaError;

/// Which pipeline stage a [`ScrapeError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transport,
    NotFound,
    MalformedPayload,
    DecodeError,
    SchemaError,
    CycleDetected,
}

/// Failure while fetching, locating, decoding or mapping one page.
///
/// Every variant names the URL (or chapter id) that failed. None of them are
/// retried; the walker stops on the first one.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("fetch {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch {url}: http status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("locate payload in {url}")]
    Locate {
        url: String,
        #[source]
        source: ExtractError,
    },

    #[error("decode payload from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("map payload from {url}")]
    Schema {
        url: String,
        #[source]
        source: SchemaError,
    },

    #[error("chapter chain loops back to already visited chapter {chapter_id}")]
    CycleDetected { chapter_id: String },
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::HttpStatus { .. } => ErrorKind::Transport,
            Self::Locate {
                source: ExtractError::NotFound { .. },
                ..
            } => ErrorKind::NotFound,
            Self::Locate {
                source: ExtractError::MalformedPayload { .. },
                ..
            } => ErrorKind::MalformedPayload,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Schema { .. } => ErrorKind::SchemaError,
            Self::CycleDetected { .. } => ErrorKind::CycleDetected,
        }
    }
}
