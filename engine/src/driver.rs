use std::sync::Arc;

use ruse_shared::{http::HttpResponse, uri::RUri};
use tracing::debug;

use crate::{
    channel::HttpChannel, error::EngineError, redirect::RedirectSink, transport::Transport,
};

/// How a stage delivers its request. Both modes must observe the same final
/// post-redirect response for the same URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Blocking,
    Callback,
}

/// Issues a request and blocks the calling thread until the final response,
/// after all redirects resolve, is available. Runs the fetch on a dedicated
/// thread with its own runtime; never call it from an async context
/// directly, wrap it in `spawn_blocking`.
#[derive(Debug, Clone)]
pub struct BlockingDriver {
    transport: Arc<Transport>,
}

impl BlockingDriver {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn get(&self, uri: RUri) -> Result<HttpResponse, EngineError> {
        debug!("blocking get {uri}");
        let transport = self.transport.clone();
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let outcome = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt.block_on(transport.fetch(uri)),
                Err(err) => Err(EngineError::Io(err)),
            };
            let _ = tx.send(outcome);
        });
        rx.recv().map_err(|_| EngineError::WorkerLost)?
    }
}

pub type OnComplete = Box<dyn FnOnce(Result<HttpResponse, EngineError>) + Send + 'static>;

/// Issues a request and invokes the completion callback exactly once with
/// the final response. The optional sink is a per-request redirect-follow
/// override, applied to this channel only.
#[derive(Debug, Clone)]
pub struct CallbackDriver {
    transport: Arc<Transport>,
}

impl CallbackDriver {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn open(&self, uri: RUri, sink: Option<Arc<dyn RedirectSink>>, on_complete: OnComplete) {
        debug!("callback open {uri}");
        let transport = self.transport.clone();
        tokio::spawn(async move {
            let mut channel = HttpChannel::new(uri);
            if let Some(sink) = sink {
                channel.set_notification_sink(sink);
            }
            on_complete(transport.fetch_channel(channel).await);
        });
    }
}
