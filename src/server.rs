//! HTTP front for the ads.txt document
//!
//! `AdsTxtResponder` answers requests for exactly `/ads.txt` and lets
//! everything else through. `Server` wraps it in a minimal HTTP/1.x accept
//! loop: passthrough requests get a 404 and lazily register the daily refresh.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use crate::refresh::{register_daily_refresh, AdsTxtService};
use crate::schedule::Scheduler;

/// The one path this server answers
pub const ADS_TXT_PATH: &str = "/ads.txt";

/// Largest request head accepted
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// Most request headers parsed
const MAX_HEADERS: usize = 64;

/// How long a client may take to send each part of its request head
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while handling a connection
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket read or write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Request head is not valid HTTP/1.x
    #[error("Malformed request: {0}")]
    Parse(#[from] httparse::Error),

    /// Request head exceeded `MAX_HEAD_BYTES`
    #[error("Request head larger than 8 KiB")]
    HeadTooLarge,

    /// Client sent nothing for `READ_TIMEOUT`
    #[error("Timed out waiting for the request head")]
    Timeout,
}

/// The parts of a request the responder looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    pub method: String,
    /// Raw request target, query string included
    pub target: String,
    /// `Host` header, if sent
    pub host: Option<String>,
}

impl InboundRequest {
    pub fn get(target: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            target: target.into(),
            host: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    fn from_parsed(request: &httparse::Request<'_, '_>) -> Self {
        let host = request
            .headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case("host"))
            .map(|header| String::from_utf8_lossy(header.value).trim().to_string());

        Self {
            method: request.method.unwrap_or("GET").to_string(),
            target: request.path.unwrap_or("/").to_string(),
            host,
        }
    }
}

/// A complete response, always sent with `Connection: close`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: Option<&'static str>,
    pub body: String,
}

impl HttpResponse {
    pub fn plain_text(body: String) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type: Some("text/plain"),
            body,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: 404,
            reason: "Not Found",
            content_type: None,
            body: String::new(),
        }
    }

    pub fn bad_request() -> Self {
        Self {
            status: 400,
            reason: "Bad Request",
            content_type: None,
            body: String::new(),
        }
    }

    /// Serializes the response; `include_body` is false for `HEAD`
    pub fn to_bytes(&self, include_body: bool) -> Vec<u8> {
        let mut head = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        if let Some(content_type) = self.content_type {
            head.push_str(&format!("Content-Type: {}\r\n", content_type));
        }
        head.push_str(&format!(
            "Content-Length: {}\r\nConnection: close\r\n\r\n",
            self.body.len()
        ));

        let mut bytes = head.into_bytes();
        if include_body {
            bytes.extend_from_slice(self.body.as_bytes());
        }
        bytes
    }
}

/// Outcome of offering a request to the responder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// The request was answered; nothing else may handle it
    Served(HttpResponse),
    /// Not ours
    PassThrough,
}

/// Escapes `&`, `<`, `>`, `"` and `'` for HTML output
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Serves `/ads.txt` from the refresh service
pub struct AdsTxtResponder {
    service: Arc<AdsTxtService>,
    escape_html: bool,
}

impl AdsTxtResponder {
    /// Creates a responder that HTML-escapes its output
    pub fn new(service: Arc<AdsTxtService>) -> Self {
        Self {
            service,
            escape_html: true,
        }
    }

    pub fn with_escape_html(mut self, escape_html: bool) -> Self {
        self.escape_html = escape_html;
        self
    }

    pub fn service(&self) -> &Arc<AdsTxtService> {
        &self.service
    }

    /// Answers the request if its target is exactly `/ads.txt`
    ///
    /// The target is compared as sent, so a query string means passthrough.
    /// Missing content is served as an empty 200.
    pub async fn respond(&self, request: &InboundRequest) -> Routed {
        if request.target != ADS_TXT_PATH {
            return Routed::PassThrough;
        }

        let content = self
            .service
            .current_content(request.host.as_deref())
            .await
            .unwrap_or_default();
        let body = if self.escape_html {
            escape_html(&content)
        } else {
            content
        };

        Routed::Served(HttpResponse::plain_text(body))
    }
}

/// Minimal HTTP/1.x server around an `AdsTxtResponder`
pub struct Server {
    responder: AdsTxtResponder,
    scheduler: Arc<Scheduler>,
    refresh_interval: Duration,
    read_timeout: Duration,
}

impl Server {
    pub fn new(responder: AdsTxtResponder, scheduler: Arc<Scheduler>) -> Self {
        Self {
            responder,
            scheduler,
            refresh_interval: Duration::from_secs(86_400),
            read_timeout: READ_TIMEOUT,
        }
    }

    pub fn with_refresh_interval(mut self, refresh_interval: Duration) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Produces the response for one request
    ///
    /// Requests the responder passes on are the site's normal traffic; the
    /// first of them registers the daily refresh job.
    pub async fn handle(&self, request: &InboundRequest) -> HttpResponse {
        match self.responder.respond(request).await {
            Routed::Served(response) => {
                tracing::debug!(path = %request.target, "served ads.txt");
                response
            }
            Routed::PassThrough => {
                register_daily_refresh(
                    &self.scheduler,
                    self.responder.service().clone(),
                    self.refresh_interval,
                );
                tracing::debug!(path = %request.target, "passed through");
                HttpResponse::not_found()
            }
        }
    }

    /// Accepts connections until `shutdown` completes
    pub async fn run<S>(self: Arc<Self>, listener: TcpListener, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let server = self.clone();
                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream).await {
                                    tracing::debug!(%peer, error = %e, "connection closed with error");
                                }
                            });
                        }
                        Err(e) => tracing::warn!(error = %e, "accept failed"),
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("server shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<(), ServerError> {
        let request = match read_request_head(&mut stream, self.read_timeout).await {
            Ok(Some(request)) => request,
            Ok(None) => return Ok(()),
            Err(e @ (ServerError::Io(_) | ServerError::Timeout)) => return Err(e),
            Err(e) => {
                stream.write_all(&HttpResponse::bad_request().to_bytes(true)).await?;
                stream.shutdown().await?;
                return Err(e);
            }
        };

        let response = self.handle(&request).await;
        let include_body = !request.method.eq_ignore_ascii_case("HEAD");
        stream.write_all(&response.to_bytes(include_body)).await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Reads until a full request head has arrived
///
/// Returns `Ok(None)` if the peer closes before sending anything. Each read
/// gets `read_timeout`; an idle or stalled client ends with `Timeout`.
async fn read_request_head(
    stream: &mut TcpStream,
    read_timeout: Duration,
) -> Result<Option<InboundRequest>, ServerError> {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];

    loop {
        let n = timeout(read_timeout, stream.read(&mut chunk))
            .await
            .map_err(|_| ServerError::Timeout)??;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ServerError::Parse(httparse::Error::Status));
        }
        buf.extend_from_slice(&chunk[..n]);

        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);
        match request.parse(&buf)? {
            httparse::Status::Complete(_) => return Ok(Some(InboundRequest::from_parsed(&request))),
            httparse::Status::Partial if buf.len() > MAX_HEAD_BYTES => return Err(ServerError::HeadTooLarge),
            httparse::Status::Partial => {}
        }
    }
}
