//! Error taxonomy for the enrichment pipeline.
//!
//! Leaf clients (geocode, weather, place) produce [`EnrichError`] internally and
//! absorb it into sentinel values; only [`EnrichError::Offline`] is surfaced by the
//! orchestrator, as an annotation's failure reason. [`AnnotateError`] covers
//! caller mistakes at the orchestrator boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    /// Network unreachable, DNS failure, timeout, non-2xx status.
    #[error("transport error: {0}")]
    Transport(String),

    /// Upstream answered, but not with the JSON shape we expected.
    #[error("unexpected upstream data: {0}")]
    UpstreamData(String),

    /// Upstream answered with zero matches.
    #[error("no match found")]
    NotFound,

    /// Local connectivity pre-check failed.
    #[error("{0}")]
    Offline(String),
}

impl EnrichError {
    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamData(msg.into())
    }
}

impl From<reqwest::Error> for EnrichError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::UpstreamData(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Rejections at the orchestrator boundary. Nothing is created when one is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnotateError {
    #[error("caption must not be empty")]
    EmptyCaption,

    #[error("no coordinate selected")]
    NoSelection,

    #[error("annotation session is finished")]
    SessionFinished,

    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: String, lon: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_message_is_verbatim() {
        let e = EnrichError::Offline("You appear to be offline.".into());
        assert_eq!(e.to_string(), "You appear to be offline.");
    }

    #[test]
    fn annotate_error_messages() {
        assert_eq!(
            AnnotateError::EmptyCaption.to_string(),
            "caption must not be empty"
        );
        assert_eq!(
            AnnotateError::SessionFinished.to_string(),
            "annotation session is finished"
        );
    }
}
