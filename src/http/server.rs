//! HTTP/2 static server with adaptive push.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener and speak HTTP/2 (h2c)
//! - Hand connections without the HTTP/2 preface to the HTTP/1.1 fallback
//! - Tie one push-engine session to each HTTP/2 connection
//! - Serve assets, consulting the engine before and after each response
//! - Stop accepting on shutdown and drain open connections gracefully

use bytes::Bytes;
use h2::server::SendResponse;
use h2::RecvStream;
use http::{header, request, Method, Request, Response, StatusCode};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::Instrument;

use crate::asset::PathError;
use crate::config::AutoPushConfig;
use crate::http::cookie::{read_token, token_cookie};
use crate::http::files::{Asset, FileError, StaticFiles};
use crate::http::http1::{detect, Protocol, DETECT_TIMEOUT};
use crate::http::push_stream::{send_body, H2PushStream};
use crate::http::request::{Origin, RequestId, X_REQUEST_ID};
use crate::lifecycle::Shutdown;
use crate::net::listener::{ConnectionPermit, Listener, ListenerError};
use crate::observability::metrics;
use crate::push::{PushEngine, RequestContext, ResponseStatus};
use crate::session::SessionId;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("HTTP/2 error: {0}")]
    H2(#[from] h2::Error),

    #[error("invalid response: {0}")]
    Http(#[from] http::Error),
}

struct ServerInner {
    engine: PushEngine,
    files: StaticFiles,
    cookie_name: String,
}

/// Serves a static directory over HTTP/2, pushing learned dependencies.
#[derive(Clone)]
pub struct StaticServer {
    inner: Arc<ServerInner>,
}

impl StaticServer {
    pub fn new(engine: PushEngine, config: &AutoPushConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                engine,
                files: StaticFiles::from_config(&config.assets),
                cookie_name: config.token.cookie_name.clone(),
            }),
        }
    }

    pub fn engine(&self) -> &PushEngine {
        &self.inner.engine
    }

    /// Accept connections until `shutdown` fires.
    pub async fn run(self, listener: Listener, shutdown: Shutdown) -> Result<(), ServerError> {
        let addr = listener
            .local_addr()
            .map_err(|source| ListenerError::Bind {
                address: "<listener>".to_string(),
                source,
            })?;
        tracing::info!(
            address = %addr,
            root = %self.inner.files.root().display(),
            "Server starting"
        );

        let mut stop = shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => {
                        let server = self.clone();
                        let connection_shutdown = shutdown.subscribe();
                        tokio::spawn(async move {
                            server.serve_connection(stream, peer, permit, connection_shutdown).await;
                        });
                    }
                    Err(ListenerError::Closed) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                },
                _ = stop.recv() => {
                    tracing::info!("Server received shutdown signal, no longer accepting");
                    listener.close();
                    break;
                }
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn serve_connection(
        self,
        stream: TcpStream,
        peer: SocketAddr,
        _permit: ConnectionPermit,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let protocol = match tokio::time::timeout(DETECT_TIMEOUT, detect(&stream)).await {
            Ok(Ok(protocol)) => protocol,
            Ok(Err(e)) => {
                tracing::debug!(peer = %peer, error = %e, "Connection closed before first request");
                return;
            }
            Err(_) => {
                tracing::debug!(peer = %peer, "Timed out waiting for first request");
                return;
            }
        };
        if protocol == Protocol::Http1 {
            let span = tracing::debug_span!("connection", peer = %peer, protocol = "http/1.1");
            self.serve_http1(stream, shutdown).instrument(span).await;
            return;
        }

        let session = self.inner.engine.open_session();
        let span = tracing::debug_span!("connection", peer = %peer, session = %session.id());

        async move {
            let mut connection = match h2::server::handshake(stream).await {
                Ok(connection) => connection,
                Err(e) => {
                    tracing::debug!(error = %e, "HTTP/2 handshake failed");
                    return;
                }
            };

            let mut draining = false;
            loop {
                tokio::select! {
                    next = connection.accept() => match next {
                        Some(Ok((request, respond))) => {
                            let server = self.clone();
                            let id = session.id();
                            tokio::spawn(
                                async move { server.handle_stream(id, request, respond).await }
                                    .in_current_span(),
                            );
                        }
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "Connection error");
                            break;
                        }
                        None => break,
                    },
                    _ = shutdown.recv(), if !draining => {
                        connection.graceful_shutdown();
                        draining = true;
                    }
                }
            }
            tracing::debug!("Connection closed");
        }
        .instrument(span)
        .await
    }

    async fn handle_stream(
        self,
        session: SessionId,
        request: Request<RecvStream>,
        mut respond: SendResponse<Bytes>,
    ) {
        let request_id = RequestId::new();
        let start = Instant::now();
        let raw_path = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());
        let span = tracing::debug_span!("request", request_id = %request_id, path = %raw_path);
        let (parts, _body) = request.into_parts();

        async move {
            let status = match self
                .respond(session, request_id, &raw_path, &parts, &mut respond)
                .await
            {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(error = %e, "Failed to complete response");
                    return;
                }
            };

            if parts.method == Method::GET {
                self.inner
                    .engine
                    .on_response(session, &raw_path, ResponseStatus::from_code(status.as_u16()));
            }
            metrics::record_request(status.as_u16(), start.elapsed());
            tracing::debug!(status = status.as_u16(), elapsed = ?start.elapsed(), "Request completed");
        }
        .instrument(span)
        .await
    }

    async fn respond(
        &self,
        session: SessionId,
        request_id: RequestId,
        raw_path: &str,
        request: &request::Parts,
        respond: &mut SendResponse<Bytes>,
    ) -> Result<StatusCode, ServerError> {
        let method = &request.method;
        if method != Method::GET && method != Method::HEAD {
            let response = Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .header(header::ALLOW, "GET, HEAD")
                .header(X_REQUEST_ID, request_id.to_string())
                .body(())?;
            respond.send_response(response, true)?;
            return Ok(StatusCode::METHOD_NOT_ALLOWED);
        }

        // HEAD neither pushes nor updates the client's token.
        let token = if method == Method::GET {
            let token = read_token(&request.headers, &self.inner.cookie_name);
            let stream = H2PushStream::new(respond, Origin::of(&request.uri), self.inner.files.clone());
            let outcome = self.inner.engine.on_request(
                &RequestContext {
                    path: raw_path,
                    session,
                    token: token.as_deref(),
                },
                &stream,
            );
            if !outcome.pushed.is_empty() {
                tracing::debug!(pushes = outcome.pushed.len(), "Pushes promised");
            }
            Some(outcome.token)
        } else {
            None
        };

        let (status, asset) = self.load_primary(raw_path).await;
        let mut response = Response::builder()
            .status(status)
            .header(X_REQUEST_ID, request_id.to_string());
        if let Some(token) = &token {
            response = response.header(
                header::SET_COOKIE,
                token_cookie(&self.inner.cookie_name, token),
            );
        }
        if let Some(asset) = &asset {
            response = response
                .header(header::CONTENT_TYPE, asset.content_type)
                .header(header::CACHE_CONTROL, self.inner.files.cache_control())
                .header(header::CONTENT_LENGTH, asset.body.len());
        }

        let body = match asset {
            Some(asset) if method != Method::HEAD => asset.body,
            _ => Bytes::new(),
        };
        let mut stream = respond.send_response(response.body(())?, body.is_empty())?;
        send_body(&mut stream, body).await?;
        Ok(status)
    }

    pub(crate) fn files(&self) -> &StaticFiles {
        &self.inner.files
    }

    pub(crate) async fn load_primary(&self, raw_path: &str) -> (StatusCode, Option<Asset>) {
        let path = match self.inner.engine.settings().normalizer.normalize(raw_path) {
            Ok(path) => path,
            Err(PathError::PrefixMismatch { .. } | PathError::Empty) => {
                return (StatusCode::NOT_FOUND, None)
            }
            Err(_) => return (StatusCode::BAD_REQUEST, None),
        };

        match self.inner.files.load(&path).await {
            Ok(asset) => (StatusCode::OK, Some(asset)),
            Err(FileError::NotFound) => (StatusCode::NOT_FOUND, None),
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to read asset");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        }
    }
}
