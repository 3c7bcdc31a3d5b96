#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{convert::Infallible, io, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use dashmap::DashMap;
use http::{
    HeaderMap, Method, Request, Response, StatusCode, Uri,
    header::{CONTENT_TYPE, HeaderName, LOCATION},
    uri::InvalidUri,
};
use http_body_util::{Full, combinators::BoxBody};
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use ruse_shared::{io::local_tcp_listener, uri::RUri};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{error, info, warn};

type H1ServerBuilder = hyper::server::conn::http1::Builder;

pub static MARKER_HEADER: &str = "x-redirected-by-script";
pub static MARKER_PRIMARY: &str = "Yes indeed";
pub static MARKER_SECONDARY: &str = "Very Yes";

pub static BAIT_BODY: &str = "you got the worm";
pub static SWITCH_BODY: &str = "worms are not tasty";

/// A fixture handler: inspects the request metadata and fills in the canned
/// response. Handlers are infallible; bad header text is logged and skipped.
pub type Handler = Arc<dyn Fn(&RequestMeta, &mut CannedResponse) + Send + Sync>;

/// Read-only view of the incoming request handed to fixture handlers.
#[derive(Debug)]
pub struct RequestMeta {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

/// Status line, headers and body a fixture handler wants served back.
#[derive(Debug)]
pub struct CannedResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Default for CannedResponse {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }
}

impl CannedResponse {
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> http::Result<()> {
        let name: HeaderName = name.parse()?;
        self.headers.append(name, value.parse()?);
        Ok(())
    }

    pub fn write_body(&mut self, chunk: impl AsRef<[u8]>) {
        self.body.extend_from_slice(chunk.as_ref());
    }

    /// 302 with a `Location` header, the shape a server redirect takes.
    pub fn set_redirect(&mut self, location: &str) -> http::Result<()> {
        self.status = StatusCode::FOUND;
        self.headers.append(LOCATION, location.parse()?);
        Ok(())
    }

    fn into_response(self) -> http::Result<Response<BoxBody<Bytes, Infallible>>> {
        let mut builder = Response::builder().status(self.status);
        for (name, value) in self.headers.iter() {
            builder = builder.header(name, value);
        }
        builder.body(BoxBody::new(Full::new(Bytes::from(self.body))))
    }
}

/// Canned HTTP server: register path handlers, then start it on a listener.
/// Unregistered paths get a diagnostic 404.
#[derive(Clone, Default)]
pub struct FixtureServer {
    routes: Arc<DashMap<String, Handler>>,
}

impl FixtureServer {
    pub fn new() -> Self {
        Self {
            routes: Arc::new(DashMap::new()),
        }
    }

    /// Re-registering a path replaces its handler.
    pub fn register_handler(&self, path: impl Into<String>, handler: Handler) {
        self.routes.insert(path.into(), handler);
    }

    pub async fn start(
        &self,
        tcp_listener: TcpListener,
    ) -> Result<(SocketAddr, JoinHandle<()>), io::Error> {
        let addr = tcp_listener.local_addr()?;
        let routes = self.routes.clone();
        let handle = tokio::spawn(async move {
            info!("fixture listening on {}", addr);
            while let Ok((stream, _addr)) = tcp_listener.accept().await {
                info!("fixture request from {_addr}");
                let routes = routes.clone();
                tokio::task::spawn(async move {
                    if let Err(err) = H1ServerBuilder::new()
                        .preserve_header_case(true)
                        .serve_connection(
                            TokioIo::new(stream),
                            service_fn(move |req| serve(req, routes.clone())),
                        )
                        .await
                    {
                        error!("fixture server error: {err:?}");
                    }
                });
            }
            warn!("fixture on {} stopped accepting", addr);
        });

        Ok((addr, handle))
    }

    pub async fn start_local(&self) -> Result<FixtureHandle, io::Error> {
        let (addr, handle) = self.start(local_tcp_listener(None).await?).await?;
        Ok(FixtureHandle { addr, handle })
    }
}

/// Running fixture server. Stopping (or dropping) it aborts the accept loop.
#[derive(Debug)]
pub struct FixtureHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl FixtureHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn uri_for(&self, path: &str) -> Result<RUri, InvalidUri> {
        format!("http://{}{}", self.addr, path).parse()
    }

    pub fn stop(self) {
        info!("stopping fixture on {}", self.addr);
    }
}

impl Drop for FixtureHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(
    request: Request<hyper::body::Incoming>,
    routes: Arc<DashMap<String, Handler>>,
) -> http::Result<Response<BoxBody<Bytes, Infallible>>> {
    let (parts, _body) = request.into_parts();
    let path = parts.uri.path().to_string();
    info!("fixture path {}", path);

    let meta = RequestMeta {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
    };

    let Some(handler) = routes.get(&path) else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(BoxBody::new(Full::new(Bytes::from(format!(
                "no handler registered for {path}"
            )))));
    };

    let mut canned = CannedResponse::default();
    (handler.value())(&meta, &mut canned);
    canned.into_response()
}

/// Handler serving the pre-redirect page. The original scenario stamps the
/// marker header here too, so a request that was never rewritten still has
/// a header value the verifier can flag as wrong.
pub fn bait_handler() -> Handler {
    Arc::new(|_meta, response| {
        stamp(response, "text/html", MARKER_PRIMARY);
        response.write_body(BAIT_BODY);
    })
}

/// Handler for the redirect target, with a configurable marker value so a
/// second host can prove cross-origin hops land on it.
pub fn switch_handler(marker: &'static str) -> Handler {
    Arc::new(move |_meta, response| {
        stamp(response, "text/html", marker);
        response.write_body(SWITCH_BODY);
    })
}

/// Handler answering 302 with the given target.
pub fn server_redirect_handler(location: String) -> Handler {
    Arc::new(move |_meta, response| {
        if let Err(err) = response.set_redirect(&location) {
            warn!("bad redirect location {location}: {err}");
        }
    })
}

fn stamp(response: &mut CannedResponse, content_type: &str, marker: &str) {
    if let Err(err) = response.set_header(CONTENT_TYPE.as_str(), content_type) {
        warn!("bad content type: {err}");
    }
    if let Err(err) = response.set_header(MARKER_HEADER, marker) {
        warn!("bad marker value: {err}");
    }
}
