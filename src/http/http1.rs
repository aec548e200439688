//! HTTP/1.1 fallback for clients that do not speak HTTP/2.
//!
//! # Responsibilities
//! - Tell HTTP/2 prior-knowledge connections from HTTP/1.x ones
//! - Serve static files over HTTP/1.1 with no push, no token and no learning
//!
//! # Design Decisions
//! - Detection peeks at the socket so the h2 handshake still sees the preface
//! - Missing files answer 404, any other read failure 500

use axum::body::Body;
use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::io;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::Instrument;

use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::http::server::StaticServer;
use crate::observability::metrics;

/// Client connection preface of HTTP/2 with prior knowledge.
const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// How long a client may take to send enough bytes to classify it.
pub(crate) const DETECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Protocol {
    Http2,
    Http1,
}

/// Classify a fresh connection without consuming any of its bytes.
pub(crate) async fn detect(stream: &TcpStream) -> io::Result<Protocol> {
    let mut buf = [0u8; PREFACE.len()];
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        if let Some(protocol) = classify(&buf[..n]) {
            return Ok(protocol);
        }
        // Partial preface; wait for the rest to land in the socket buffer.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

fn classify(seen: &[u8]) -> Option<Protocol> {
    if !PREFACE.starts_with(seen) {
        Some(Protocol::Http1)
    } else if seen.len() == PREFACE.len() {
        Some(Protocol::Http2)
    } else {
        None
    }
}

impl StaticServer {
    /// Serve one HTTP/1.x connection until it closes or `shutdown` fires.
    pub(crate) async fn serve_http1(&self, stream: TcpStream, mut shutdown: broadcast::Receiver<()>) {
        let server = self.clone();
        let service = service_fn(move |request: Request<Incoming>| {
            let server = server.clone();
            async move { Ok::<_, Infallible>(server.handle_http1(request).await) }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        let result = tokio::select! {
            result = connection.as_mut() => result,
            _ = shutdown.recv() => {
                connection.as_mut().graceful_shutdown();
                connection.as_mut().await
            }
        };
        if let Err(e) = result {
            tracing::debug!(error = %e, "HTTP/1.1 connection error");
        }
        tracing::debug!("Connection closed");
    }

    async fn handle_http1(&self, request: Request<Incoming>) -> Response<Body> {
        let request_id = RequestId::new();
        let start = Instant::now();
        let raw_path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let span = tracing::debug_span!("request", request_id = %request_id, path = %raw_path);

        async move {
            let method = request.method().clone();
            let response = if method != Method::GET && method != Method::HEAD {
                Response::builder()
                    .status(StatusCode::METHOD_NOT_ALLOWED)
                    .header(header::ALLOW, "GET, HEAD")
                    .header(X_REQUEST_ID, request_id.to_string())
                    .body(Body::empty())
            } else {
                let (status, asset) = self.load_primary(&raw_path).await;
                let mut response = Response::builder()
                    .status(status)
                    .header(X_REQUEST_ID, request_id.to_string());
                let mut body = Bytes::new();
                if let Some(asset) = asset {
                    response = response
                        .header(header::CONTENT_TYPE, asset.content_type)
                        .header(header::CACHE_CONTROL, self.files().cache_control())
                        .header(header::CONTENT_LENGTH, asset.body.len());
                    if method == Method::GET {
                        body = asset.body;
                    }
                }
                response.body(Body::from(body))
            };

            let response = response.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Failed to build response");
                let mut fallback = Response::new(Body::empty());
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            });

            let status = response.status().as_u16();
            metrics::record_request(status, start.elapsed());
            tracing::debug!(status, elapsed = ?start.elapsed(), "Request completed");
            response
        }
        .instrument(span)
        .await
    }
}
