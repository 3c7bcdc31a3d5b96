use std::error::Error;

use ruse_shared::{http::HttpError, uri::RUri};

use crate::{channel::ChannelError, verify::Mismatch};

/// Everything that can sink a fetch or a chain. No variant is retried;
/// each one is a test or implementation defect, not a transient condition.
#[derive(Debug)]
pub enum EngineError {
    /// The host refused every notification name we know.
    UnsupportedTopic(String),
    /// An intercepted subject at the redirect-follow point was not an
    /// HTTP-class channel. Implementer bug, not a test failure.
    NotHttpChannel(&'static str),
    /// The channel refused a redirect instruction.
    RedirectRejected { uri: RUri, reason: ChannelError },
    /// The policy produced a cycle; gave up following it.
    RedirectLoop { uri: RUri, hops: usize },
    /// A redirect sink returned without letting the transport proceed.
    ContinuationDropped,
    /// A driver's worker vanished before delivering an outcome.
    WorkerLost,
    Http(HttpError),
    Io(std::io::Error),
    /// A chain stage's response did not match its expectation.
    StageFailed {
        stage: usize,
        mismatches: Vec<Mismatch>,
    },
}

impl Error for EngineError {}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::UnsupportedTopic(topic) => {
                write!(f, "host does not deliver notifications named {topic:?}")
            }
            EngineError::NotHttpChannel(kind) => {
                write!(f, "intercepted subject is not an http channel: {kind}")
            }
            EngineError::RedirectRejected { uri, reason } => {
                write!(f, "channel at {uri} refused redirect: {reason}")
            }
            EngineError::RedirectLoop { uri, hops } => {
                write!(f, "gave up after {hops} redirect hops, last at {uri}")
            }
            EngineError::ContinuationDropped => {
                write!(f, "redirect sink dropped its continuation")
            }
            EngineError::WorkerLost => write!(f, "request worker went away without an outcome"),
            EngineError::Http(err) => write!(f, "http: {err}"),
            EngineError::Io(err) => write!(f, "io: {err}"),
            EngineError::StageFailed { stage, mismatches } => {
                write!(f, "stage {stage} failed verification:")?;
                for mismatch in mismatches {
                    write!(f, " [{mismatch}]")?;
                }
                Ok(())
            }
        }
    }
}

impl From<HttpError> for EngineError {
    fn from(value: HttpError) -> Self {
        EngineError::Http(value)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(value: std::io::Error) -> Self {
        EngineError::Io(value)
    }
}
