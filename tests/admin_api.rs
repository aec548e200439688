//! Admin API over a real socket.

use std::net::SocketAddr;

use auto_push::admin::{self, AdminState};
use auto_push::lifecycle::Shutdown;
use auto_push::PushEngine;
use serde_json::Value;
use tokio::net::TcpListener;

mod common;
use common::{test_config, visit, MockPushStream};

const KEY: &str = "test-admin-key";

async fn start_admin(engine: PushEngine) -> (SocketAddr, Shutdown) {
    let mut config = test_config(1);
    config.admin.enabled = true;
    config.admin.api_key = KEY.to_string();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let state = AdminState::new(engine, &config.admin);
    tokio::spawn(admin::serve(listener, state, shutdown.subscribe()));
    (addr, shutdown)
}

async fn get_json(client: &reqwest::Client, url: String) -> Value {
    let response = client.get(url).bearer_auth(KEY).send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_admin_endpoints() {
    let engine = PushEngine::new(&test_config(1));
    let stream = MockPushStream::new();
    visit(&engine, &stream, "/index.html", &["/main.js", "/style.css"]).await;
    let _open = engine.open_session();

    let (addr, shutdown) = start_admin(engine.clone()).await;
    let client = reqwest::Client::new();
    let base = format!("http://{}", addr);

    let status = get_json(&client, format!("{}/admin/status", base)).await;
    assert_eq!(status["status"], "operational");
    assert_eq!(status["push_enabled"], true);
    assert_eq!(status["learned_entries"], 1);
    assert_eq!(status["active_sessions"], 1);

    let dependencies = get_json(&client, format!("{}/admin/dependencies", base)).await;
    let entries = dependencies.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entry"], "/index.html");
    assert_eq!(entries[0]["edges"].as_array().unwrap().len(), 2);

    let sessions = get_json(&client, format!("{}/admin/sessions", base)).await;
    assert_eq!(sessions["active_sessions"], 1);

    let reset: Value = client
        .post(format!("{}/admin/dependencies/reset", base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reset["cleared_entries"], 1);
    assert_eq!(engine.learner().entry_count(), 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_admin_requires_key() {
    let engine = PushEngine::new(&test_config(1));
    let (addr, shutdown) = start_admin(engine).await;
    let client = reqwest::Client::new();

    let missing = client
        .get(format!("http://{}/admin/status", addr))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 401);

    let wrong = client
        .get(format!("http://{}/admin/status", addr))
        .bearer_auth("not-the-key")
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 401);

    shutdown.trigger();
}
