use std::borrow::Cow;
use std::error::Error;

use bytes::Bytes;
use http::Request;
use http::Response;
use http::StatusCode;
use http::header::LOCATION;
use http::response::Parts;
use http::uri::InvalidUri;
use http_body_util::BodyExt;
use http_body_util::Empty;
use hyper_util::rt::tokio::WithHyperIo;
use tokio::net::TcpStream;
use tracing::warn;

type H1ClientBuilder = hyper::client::conn::http1::Builder;

/// Fully collected response: the final status line, header set and body of
/// whatever request the transport last dispatched.
#[derive(Debug)]
pub struct HttpResponse {
    pub parts: Parts,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn status(&self) -> StatusCode {
        self.parts.status
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// The `Location` a 3xx response points at, if any.
    pub fn location(&self) -> Option<&str> {
        if !self.parts.status.is_redirection() {
            return None;
        }
        self.parts.headers.get(LOCATION).and_then(|v| v.to_str().ok())
    }
}

pub async fn try_from(res: Response<hyper::body::Incoming>) -> Result<HttpResponse, HttpError> {
    let (parts, body) = res.into_parts();
    let body = body.collect().await?.to_bytes();
    Ok(HttpResponse { parts, body })
}

#[derive(Debug)]
pub enum HttpError {
    Io(std::io::Error),
    Hyper(hyper::Error),
    Http(http::Error),
    Uri,
    MissingLocation,
}

impl Error for HttpError {}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<InvalidUri> for HttpError {
    fn from(_: InvalidUri) -> Self {
        HttpError::Uri
    }
}

impl From<std::io::Error> for HttpError {
    fn from(value: std::io::Error) -> Self {
        HttpError::Io(value)
    }
}

impl From<hyper::Error> for HttpError {
    fn from(value: hyper::Error) -> Self {
        HttpError::Hyper(value)
    }
}

impl From<http::Error> for HttpError {
    fn from(value: http::Error) -> Self {
        HttpError::Http(value)
    }
}

/// Dispatch a single request over a fresh connection and collect the
/// response. Redirects are not followed here; the caller owns that loop.
pub async fn send_once(request: Request<Empty<Bytes>>) -> Result<HttpResponse, HttpError> {
    let connect_host = format!(
        "{}:{}",
        request.uri().host().unwrap_or("localhost"),
        request.uri().port_u16().unwrap_or(80)
    );
    let stream = TcpStream::connect(connect_host).await?;
    let io = WithHyperIo::new(stream);

    let (mut sender, conn) = H1ClientBuilder::new()
        .title_case_headers(true)
        .handshake(io)
        .await?;

    tokio::task::spawn(async move {
        if let Err(err) = conn.await {
            warn!("Connection failed: {:?}", err);
        }
    });

    try_from(sender.send_request(request).await?).await
}
