use std::sync::{Arc, RwLock};

use bytes::Bytes;
use http::{Request, header::HOST};
use http_body_util::Empty;
use ruse_shared::{
    http::{HttpError, HttpResponse, send_once},
    uri::RUri,
};
use tracing::debug;

use crate::{
    channel::{HttpChannel, Subject},
    error::EngineError,
    observer::ObserverService,
    redirect::{Continuation, RedirectSink},
};

/// Loop guard for cyclic policy tables.
pub static MAX_REDIRECT_HOPS: usize = 20;

/// The thing that actually moves bytes. Fires the pre-send notification for
/// every outgoing channel, dispatches over the wire, and hands every
/// redirect — script- or server-originated — through the redirect sink
/// before following it.
#[derive(Debug)]
pub struct Transport {
    observers: Arc<ObserverService>,
    sink: RwLock<Option<Arc<dyn RedirectSink>>>,
}

impl Transport {
    pub fn new(observers: Arc<ObserverService>) -> Self {
        Self {
            observers,
            sink: RwLock::new(None),
        }
    }

    /// Global redirect-follow registration point. A channel carrying its
    /// own sink override wins over this one.
    pub fn set_redirect_sink(&self, sink: Arc<dyn RedirectSink>) {
        let mut guard = self.sink.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(sink);
    }

    fn global_sink(&self) -> Option<Arc<dyn RedirectSink>> {
        self.sink
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub async fn fetch(&self, uri: RUri) -> Result<HttpResponse, EngineError> {
        self.fetch_channel(HttpChannel::new(uri)).await
    }

    /// Resolve a channel to its final response, following script and server
    /// redirects. Every hop raises a fresh pre-send notification, so chained
    /// redirects are repeated single-hop decisions.
    pub async fn fetch_channel(
        &self,
        mut channel: HttpChannel,
    ) -> Result<HttpResponse, EngineError> {
        let mut hops = 0usize;
        loop {
            let mut subject = Subject::Http(channel);
            self.observers.notify_request(&mut subject)?;
            channel = subject.into_http()?;

            if let Some(target) = channel.take_pending_redirect() {
                debug!("script redirect {} -> {}", channel.uri(), target);
                channel = self.follow(channel, target).await?;
                hops += 1;
                check_hops(&channel, hops)?;
                continue;
            }

            channel.mark_dispatched();
            let response = dispatch(channel.uri()).await?;

            let Some(location) = response.location().map(str::to_string) else {
                return Ok(response);
            };
            let target = channel
                .uri()
                .resolve(&location)
                .map_err(|e| EngineError::Http(e.into()))?;
            debug!(
                "server redirect {} -> {} ({})",
                channel.uri(),
                target,
                response.status()
            );
            channel = self.follow(channel, target).await?;
            hops += 1;
            check_hops(&channel, hops)?;
        }
    }

    /// Hand off to the successor channel through whichever redirect sink is
    /// in play. With no sink registered the transport proceeds directly; the
    /// successor still gets its own pre-send notification.
    async fn follow(
        &self,
        old: HttpChannel,
        target: RUri,
    ) -> Result<HttpChannel, EngineError> {
        let successor = old.successor(target);
        let Some(sink) = old.sink().or_else(|| self.global_sink()) else {
            return Ok(successor);
        };

        let (continuation, ready) = Continuation::new();
        let mut subject = Subject::Http(successor);
        sink.on_redirect_follow(&old, &mut subject, continuation)?;
        ready
            .await
            .map_err(|_| EngineError::ContinuationDropped)?;
        subject.into_http()
    }
}

fn check_hops(channel: &HttpChannel, hops: usize) -> Result<(), EngineError> {
    if hops > MAX_REDIRECT_HOPS {
        return Err(EngineError::RedirectLoop {
            uri: channel.uri().clone(),
            hops,
        });
    }
    Ok(())
}

async fn dispatch(uri: &RUri) -> Result<HttpResponse, EngineError> {
    let request = Request::get(uri.inner())
        .header(HOST, uri.host_port())
        .body(Empty::<Bytes>::new())
        .map_err(HttpError::from)?;
    Ok(send_once(request).await?)
}
