use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;

use crate::{
    channel::{HttpChannel, Subject},
    error::EngineError,
    observer::{Observer, ObserverService, TOPIC_MODIFY, TOPIC_PRE_SEND},
    policy::RedirectPolicy,
};

/// Handed to a redirect sink; the transport does not follow the redirect
/// until `proceed` is called. Dropping it without proceeding surfaces as
/// `ContinuationDropped` on the fetch.
#[derive(Debug)]
pub struct Continuation {
    tx: oneshot::Sender<()>,
}

impl Continuation {
    pub fn new() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn proceed(self) {
        let _ = self.tx.send(());
    }
}

/// Second interception point: invoked whenever the transport is about to
/// follow a redirect, whether a server 3xx or a prior script rewrite.
pub trait RedirectSink: Send + Sync + std::fmt::Debug {
    fn on_redirect_follow(
        &self,
        old: &HttpChannel,
        subject: &mut Subject,
        continuation: Continuation,
    ) -> Result<(), EngineError>;
}

/// The script-side interceptor: one policy consulted from both interception
/// points, so the verdict for a URL never depends on which notification
/// delivered it.
#[derive(Debug)]
pub struct Redirector {
    policy: Arc<RedirectPolicy>,
}

impl Redirector {
    pub fn new(policy: Arc<RedirectPolicy>) -> Arc<Self> {
        Arc::new(Self { policy })
    }

    /// Adaptive subscription: try the preferred notification name, and if
    /// the host refuses it fall back to the legacy one. Returns whichever
    /// name was accepted. Any error other than an unsupported topic
    /// propagates unchanged.
    pub fn register(self: &Arc<Self>, host: &ObserverService) -> Result<&'static str, EngineError> {
        let observer: Arc<dyn Observer> = self.clone();
        match host.subscribe(TOPIC_PRE_SEND, observer.clone()) {
            Ok(()) => Ok(TOPIC_PRE_SEND),
            Err(EngineError::UnsupportedTopic(_)) => {
                debug!("host refused {TOPIC_PRE_SEND}, retrying {TOPIC_MODIFY}");
                host.subscribe(TOPIC_MODIFY, observer)?;
                Ok(TOPIC_MODIFY)
            }
            Err(err) => Err(err),
        }
    }

    fn apply(&self, channel: &mut HttpChannel) -> Result<(), EngineError> {
        let Some(target) = self.policy.decide(channel.uri()) else {
            return Ok(());
        };
        debug!("policy rewrites {} -> {}", channel.uri(), target);
        let uri = channel.uri().clone();
        channel
            .redirect_to(target)
            .map_err(|reason| EngineError::RedirectRejected { uri, reason })
    }
}

impl Observer for Redirector {
    /// Pre-send: a subject that is not an HTTP channel is silently ignored.
    fn observe(&self, subject: &mut Subject, _topic: &str) -> Result<(), EngineError> {
        match subject.as_http_mut() {
            Some(channel) => self.apply(channel),
            None => Ok(()),
        }
    }
}

impl RedirectSink for Redirector {
    /// Redirect-follow: the hand-off target must be an HTTP channel; anything
    /// else is an implementer bug and fatal.
    fn on_redirect_follow(
        &self,
        _old: &HttpChannel,
        subject: &mut Subject,
        continuation: Continuation,
    ) -> Result<(), EngineError> {
        let kind = subject.kind();
        let Some(channel) = subject.as_http_mut() else {
            return Err(EngineError::NotHttpChannel(kind));
        };
        self.apply(channel)?;
        continuation.proceed();
        Ok(())
    }
}
