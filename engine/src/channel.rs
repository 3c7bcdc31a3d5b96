use std::{error::Error, fmt::Display, sync::Arc};

use ruse_shared::uri::RUri;
use tracing::debug;

use crate::{error::EngineError, redirect::RedirectSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Pending,
    Dispatched,
}

/// An HTTP-class request channel: supports header-level inspection and a
/// redirect instruction, valid only until the request is dispatched.
#[derive(Debug)]
pub struct HttpChannel {
    uri: RUri,
    state: ChannelState,
    pending_redirect: Option<RUri>,
    sink: Option<Arc<dyn RedirectSink>>,
}

impl HttpChannel {
    pub fn new(uri: RUri) -> Self {
        Self {
            uri,
            state: ChannelState::Pending,
            pending_redirect: None,
            sink: None,
        }
    }

    pub fn uri(&self) -> &RUri {
        &self.uri
    }

    pub fn is_dispatched(&self) -> bool {
        self.state == ChannelState::Dispatched
    }

    /// Point this channel somewhere else before it goes out. A later call
    /// overwrites an earlier one; once dispatched the instruction is
    /// refused.
    pub fn redirect_to(&mut self, target: RUri) -> Result<(), ChannelError> {
        if self.is_dispatched() {
            return Err(ChannelError::AlreadyDispatched);
        }
        debug!("channel {} accepts redirect to {}", self.uri, target);
        self.pending_redirect = Some(target);
        Ok(())
    }

    /// Per-request redirect sink, consulted ahead of the transport's
    /// globally registered one.
    pub fn set_notification_sink(&mut self, sink: Arc<dyn RedirectSink>) {
        self.sink = Some(sink);
    }

    pub fn sink(&self) -> Option<Arc<dyn RedirectSink>> {
        self.sink.clone()
    }

    pub(crate) fn take_pending_redirect(&mut self) -> Option<RUri> {
        self.pending_redirect.take()
    }

    pub(crate) fn mark_dispatched(&mut self) {
        self.state = ChannelState::Dispatched;
    }

    /// The channel that replaces this one when a redirect is followed.
    /// Inherits the per-request sink.
    pub(crate) fn successor(&self, target: RUri) -> HttpChannel {
        Self {
            uri: target,
            state: ChannelState::Pending,
            pending_redirect: None,
            sink: self.sink.clone(),
        }
    }
}

/// What lifecycle notifications carry. Observers must tolerate subjects
/// that are not HTTP channels.
#[derive(Debug)]
pub enum Subject {
    Http(HttpChannel),
    Opaque(&'static str),
}

impl Subject {
    pub fn kind(&self) -> &'static str {
        match self {
            Subject::Http(_) => "http",
            Subject::Opaque(kind) => kind,
        }
    }

    pub fn as_http_mut(&mut self) -> Option<&mut HttpChannel> {
        match self {
            Subject::Http(channel) => Some(channel),
            Subject::Opaque(_) => None,
        }
    }

    pub fn into_http(self) -> Result<HttpChannel, EngineError> {
        match self {
            Subject::Http(channel) => Ok(channel),
            Subject::Opaque(kind) => Err(EngineError::NotHttpChannel(kind)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    AlreadyDispatched,
}

impl Error for ChannelError {}

impl Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::AlreadyDispatched => write!(f, "request already dispatched"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn uri(s: &str) -> RUri {
        s.parse().unwrap()
    }

    #[test]
    fn redirect_before_dispatch_is_accepted() {
        let mut channel = HttpChannel::new(uri("http://h:1/bait"));
        channel.redirect_to(uri("http://h:1/switch")).unwrap();
        assert_eq!(
            channel.take_pending_redirect(),
            Some(uri("http://h:1/switch"))
        );
    }

    #[test]
    fn redirect_after_dispatch_is_refused() {
        let mut channel = HttpChannel::new(uri("http://h:1/bait"));
        channel.mark_dispatched();
        assert_eq!(
            channel.redirect_to(uri("http://h:1/switch")),
            Err(ChannelError::AlreadyDispatched)
        );
    }

    #[test]
    fn later_redirect_overwrites_earlier() {
        let mut channel = HttpChannel::new(uri("http://h:1/bait"));
        channel.redirect_to(uri("http://h:1/a")).unwrap();
        channel.redirect_to(uri("http://h:1/b")).unwrap();
        assert_eq!(channel.take_pending_redirect(), Some(uri("http://h:1/b")));
    }

    #[test]
    fn opaque_subject_is_not_http() {
        let mut subject = Subject::Opaque("websocket");
        assert!(subject.as_http_mut().is_none());
        assert_eq!(subject.kind(), "websocket");
    }
}
