//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use auto_push::asset::AssetPath;
use auto_push::config::AutoPushConfig;
use auto_push::lifecycle::Shutdown;
use auto_push::net::Listener;
use auto_push::push::{PromisedPush, PushError, PushJob, PushStream, RequestContext};
use auto_push::session::SessionId;
use auto_push::{PushEngine, StaticServer};
use bytes::{Bytes, BytesMut};
use h2::RecvStream;
use http::{Method, Request};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{TcpListener, TcpStream};

pub fn path(p: &str) -> AssetPath {
    AssetPath::from_canonical(p).unwrap()
}

pub fn ctx<'a>(raw: &'a str, session: SessionId, token: Option<&'a str>) -> RequestContext<'a> {
    RequestContext {
        path: raw,
        session,
        token,
    }
}

/// Config with a low push threshold and metrics off, suitable for tests.
pub fn test_config(push_threshold: u32) -> AutoPushConfig {
    let mut config = AutoPushConfig::default();
    config.learner.push_threshold = push_threshold;
    config.observability.metrics_enabled = false;
    config
}

/// A `PushStream` that records promises and fails deliveries on request.
#[derive(Clone, Default)]
pub struct MockPushStream {
    promised: Arc<Mutex<Vec<String>>>,
    delivery_errors: Arc<HashMap<String, PushError>>,
    promise_errors: Arc<HashMap<String, PushError>>,
}

impl MockPushStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliveries for these request paths fail with the given errors.
    pub fn failing_delivery(errors: &[(&str, PushError)]) -> Self {
        Self {
            delivery_errors: Arc::new(
                errors.iter().map(|(p, e)| (p.to_string(), e.clone())).collect(),
            ),
            ..Self::default()
        }
    }

    /// Promises for these request paths are rejected with the given errors.
    pub fn failing_promise(errors: &[(&str, PushError)]) -> Self {
        Self {
            promise_errors: Arc::new(
                errors.iter().map(|(p, e)| (p.to_string(), e.clone())).collect(),
            ),
            ..Self::default()
        }
    }

    pub fn promised(&self) -> Vec<String> {
        self.promised.lock().unwrap().clone()
    }
}

pub struct MockPromise {
    result: Result<(), PushError>,
}

impl PushStream for MockPushStream {
    type Promised = MockPromise;

    fn promise(&self, job: &PushJob) -> Result<MockPromise, PushError> {
        if let Some(err) = self.promise_errors.get(&job.request_path) {
            return Err(err.clone());
        }
        self.promised.lock().unwrap().push(job.request_path.clone());
        Ok(MockPromise {
            result: match self.delivery_errors.get(&job.request_path) {
                Some(err) => Err(err.clone()),
                None => Ok(()),
            },
        })
    }
}

impl PromisedPush for MockPromise {
    async fn deliver(self) -> Result<(), PushError> {
        tokio::task::yield_now().await;
        self.result
    }
}

/// Simulate one page view: the entry document followed by its assets.
pub async fn visit(engine: &PushEngine, stream: &MockPushStream, entry: &str, assets: &[&str]) {
    let session = engine.open_session();
    visit_in(engine, stream, session.id(), entry, assets).await;
}

pub async fn visit_in(
    engine: &PushEngine,
    stream: &MockPushStream,
    session: SessionId,
    entry: &str,
    assets: &[&str],
) {
    use auto_push::push::ResponseStatus;

    for raw in std::iter::once(&entry).chain(assets.iter()) {
        let outcome = engine.on_request(&ctx(raw, session, None), stream);
        if let Some(report) = outcome.report {
            report.report().await;
        }
        engine.on_response(session, raw, ResponseStatus::Success);
    }
}

/// A static site on disk: `/index.html`, `/main.js`, `/style.css`.
pub fn static_site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_file(dir.path(), "index.html", "<script src=\"/main.js\"></script>");
    write_file(dir.path(), "main.js", "console.log('main');");
    write_file(dir.path(), "style.css", "body { margin: 0 }");
    dir
}

pub fn write_file(root: &Path, name: &str, contents: &str) {
    std::fs::write(root.join(name), contents).unwrap();
}

/// Running server under test.
pub struct TestServer {
    pub addr: SocketAddr,
    pub engine: PushEngine,
    pub shutdown: Shutdown,
    pub handle: tokio::task::JoinHandle<()>,
}

/// Start a server for `config` on an ephemeral port.
pub async fn start_server(config: AutoPushConfig) -> TestServer {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, config.listener.max_connections).unwrap();

    let engine = PushEngine::new(&config);
    let server = StaticServer::new(engine.clone(), &config);
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        server.run(listener, server_shutdown).await.unwrap();
    });

    TestServer {
        addr,
        engine,
        shutdown,
        handle,
    }
}

/// One HTTP/2 client connection with push enabled.
pub struct H2Client {
    send: h2::client::SendRequest<Bytes>,
}

/// A response as seen by the client, including anything pushed with it.
#[derive(Debug)]
pub struct Fetched {
    pub status: u16,
    pub set_cookie: Option<String>,
    pub body: Bytes,
    pub pushes: Vec<Pushed>,
}

#[derive(Debug)]
pub struct Pushed {
    pub path: String,
    pub status: u16,
    pub body: Bytes,
}

impl Fetched {
    pub fn pushed_paths(&self) -> Vec<&str> {
        self.pushes.iter().map(|p| p.path.as_str()).collect()
    }

    /// Token value from `set-cookie`.
    pub fn token(&self) -> Option<String> {
        let header = self.set_cookie.as_deref()?;
        let pair = header.split(';').next()?;
        pair.split_once('=').map(|(_, value)| value.to_string())
    }
}

impl H2Client {
    pub async fn connect(addr: SocketAddr) -> Self {
        let tcp = TcpStream::connect(addr).await.unwrap();
        let (send, connection) = h2::client::Builder::new()
            .enable_push(true)
            .handshake(tcp)
            .await
            .unwrap();
        tokio::spawn(async move {
            let _ = connection.await;
        });
        Self { send }
    }

    pub async fn get(&mut self, path: &str, cookie: Option<&str>) -> Fetched {
        self.send(Method::GET, path, cookie).await
    }

    pub async fn head(&mut self, path: &str) -> Fetched {
        self.send(Method::HEAD, path, None).await
    }

    pub async fn send(&mut self, method: Method, path: &str, cookie: Option<&str>) -> Fetched {
        let mut request = Request::builder()
            .method(method)
            .uri(format!("http://localhost{}", path));
        if let Some(cookie) = cookie {
            request = request.header("cookie", cookie);
        }

        let send = self.send.clone();
        let mut send = send.ready().await.unwrap();
        let (mut response, _) = send.send_request(request.body(()).unwrap(), true).unwrap();
        let mut promises = response.push_promises();

        let response = response.await.unwrap();
        let status = response.status().as_u16();
        let set_cookie = response
            .headers()
            .get("set-cookie")
            .map(|v| v.to_str().unwrap().to_string());
        let body = read_body(response.into_body()).await;

        let mut pushes = Vec::new();
        while let Some(promise) = promises.push_promise().await {
            let (request, pushed) = promise.unwrap().into_parts();
            let pushed = pushed.await.unwrap();
            pushes.push(Pushed {
                path: request.uri().path().to_string(),
                status: pushed.status().as_u16(),
                body: read_body(pushed.into_body()).await,
            });
        }

        Fetched {
            status,
            set_cookie,
            body,
            pushes,
        }
    }
}

pub async fn read_body(mut body: RecvStream) -> Bytes {
    let mut out = BytesMut::new();
    while let Some(chunk) = body.data().await {
        let chunk = chunk.unwrap();
        let _ = body.flow_control().release_capacity(chunk.len());
        out.extend_from_slice(&chunk);
    }
    out.freeze()
}

/// Poll `check` until it holds or the timeout expires.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
