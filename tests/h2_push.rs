//! HTTP/2 server tests: real connections, real PUSH_PROMISE frames.

use std::time::Duration;

use auto_push::token::TokenCodec;

mod common;
use common::{eventually, path, start_server, static_site, test_config, write_file, H2Client};

/// One page view per connection: the document, then its script.
async fn learning_visit(addr: std::net::SocketAddr) {
    visit_with(addr, "/main.js").await;
}

async fn visit_with(addr: std::net::SocketAddr, asset: &str) {
    let mut client = H2Client::connect(addr).await;
    let page = client.get("/index.html", None).await;
    assert_eq!(page.status, 200);
    tokio::time::sleep(Duration::from_millis(20)).await;
    let dependency = client.get(asset, None).await;
    assert_eq!(dependency.status, 200);
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn serves_files_with_token_cookie() {
    let site = static_site();
    let mut config = test_config(3);
    config.assets.root = site.path().to_path_buf();
    let server = start_server(config).await;

    let mut client = H2Client::connect(server.addr).await;
    let page = client.get("/", None).await;
    assert_eq!(page.status, 200);
    assert_eq!(&page.body[..], b"<script src=\"/main.js\"></script>");
    assert!(page.pushes.is_empty());
    let cookie = page.set_cookie.as_deref().unwrap();
    assert!(cookie.starts_with("__ap_cache__="));
    assert!(cookie.contains("Max-Age=0"));

    let missing = client.get("/nope.js", None).await;
    assert_eq!(missing.status, 404);

    server.shutdown.trigger();
}

#[tokio::test]
async fn learned_script_is_pushed_on_a_new_connection() {
    let site = static_site();
    let mut config = test_config(3);
    config.assets.root = site.path().to_path_buf();
    let max_token_bytes = config.token.max_token_bytes;
    let server = start_server(config).await;

    for _ in 0..3 {
        learning_visit(server.addr).await;
    }
    let (index, main) = (path("/index.html"), path("/main.js"));
    assert!(
        eventually(Duration::from_secs(2), || {
            server.engine.learner().confidence(&index, &main) == Some(3)
        })
        .await
    );

    let mut client = H2Client::connect(server.addr).await;
    let page = client.get("/index.html", None).await;
    assert_eq!(page.status, 200);
    assert_eq!(page.pushed_paths(), vec!["/main.js"]);
    assert_eq!(page.pushes[0].status, 200);
    assert_eq!(&page.pushes[0].body[..], b"console.log('main');");

    let token = page.token().expect("token cookie");
    let decoded = TokenCodec::new(max_token_bytes).decode(&token);
    assert!(!decoded.reset);
    assert!(decoded.state.contains(&main));

    // A client presenting that token already has the script.
    let mut returning = H2Client::connect(server.addr).await;
    let cookie = format!("__ap_cache__={}", token);
    let again = returning.get("/index.html", Some(&cookie)).await;
    assert_eq!(again.status, 200);
    assert!(again.pushes.is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn escaped_asset_names_are_pushed_under_their_encoded_path() {
    let site = static_site();
    write_file(site.path(), "my file.css", "p { color: red }");
    let mut config = test_config(3);
    config.assets.root = site.path().to_path_buf();
    let server = start_server(config).await;

    for _ in 0..3 {
        visit_with(server.addr, "/my%20file.css").await;
    }
    let (index, styles) = (path("/index.html"), path("/my file.css"));
    assert!(
        eventually(Duration::from_secs(2), || {
            server.engine.learner().confidence(&index, &styles) == Some(3)
        })
        .await
    );

    let mut client = H2Client::connect(server.addr).await;
    let page = client.get("/index.html", None).await;
    assert_eq!(page.pushed_paths(), vec!["/my%20file.css"]);
    assert_eq!(page.pushes[0].status, 200);
    assert_eq!(&page.pushes[0].body[..], b"p { color: red }");
    assert!(page.token().is_some_and(|token| !token.is_empty()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.engine.learner().confidence(&index, &styles), Some(3));

    server.shutdown.trigger();
}

#[tokio::test]
async fn deleted_asset_is_pushed_as_404_and_weakened() {
    let site = static_site();
    let mut config = test_config(3);
    config.assets.root = site.path().to_path_buf();
    let server = start_server(config).await;

    for _ in 0..3 {
        learning_visit(server.addr).await;
    }
    let (index, main) = (path("/index.html"), path("/main.js"));
    assert!(
        eventually(Duration::from_secs(2), || {
            server.engine.learner().confidence(&index, &main) == Some(3)
        })
        .await
    );

    std::fs::remove_file(site.path().join("main.js")).unwrap();

    let mut client = H2Client::connect(server.addr).await;
    let page = client.get("/index.html", None).await;
    assert_eq!(page.pushed_paths(), vec!["/main.js"]);
    assert_eq!(page.pushes[0].status, 404);

    assert!(
        eventually(Duration::from_secs(2), || {
            server.engine.learner().confidence(&index, &main) == Some(2)
        })
        .await
    );

    let mut next = H2Client::connect(server.addr).await;
    let page = next.get("/index.html", None).await;
    assert!(page.pushes.is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn no_push_mode_serves_without_promises() {
    let site = static_site();
    let mut config = test_config(1);
    config.assets.root = site.path().to_path_buf();
    config.push.enabled = false;
    let server = start_server(config).await;

    learning_visit(server.addr).await;

    let mut client = H2Client::connect(server.addr).await;
    let page = client.get("/index.html", None).await;
    assert_eq!(page.status, 200);
    assert!(page.pushes.is_empty());

    server.shutdown.trigger();
}

#[tokio::test]
async fn shutdown_stops_the_accept_loop() {
    let site = static_site();
    let mut config = test_config(3);
    config.assets.root = site.path().to_path_buf();
    let server = start_server(config).await;

    let mut client = H2Client::connect(server.addr).await;
    assert_eq!(client.get("/index.html", None).await.status, 200);

    server.shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), server.handle)
        .await
        .expect("server did not stop")
        .unwrap();
}

#[tokio::test]
async fn head_requests_do_not_push_or_consume_the_token() {
    let site = static_site();
    let mut config = test_config(3);
    config.assets.root = site.path().to_path_buf();
    let server = start_server(config).await;

    for _ in 0..3 {
        learning_visit(server.addr).await;
    }
    let (index, main) = (path("/index.html"), path("/main.js"));
    assert!(
        eventually(Duration::from_secs(2), || {
            server.engine.learner().confidence(&index, &main) == Some(3)
        })
        .await
    );

    let mut client = H2Client::connect(server.addr).await;
    let head = client.head("/index.html").await;
    assert_eq!(head.status, 200);
    assert!(head.body.is_empty());
    assert!(head.pushes.is_empty());
    assert!(head.set_cookie.is_none());

    // The same session still gets the push on its first GET.
    let page = client.get("/index.html", None).await;
    assert_eq!(page.pushed_paths(), vec!["/main.js"]);

    server.shutdown.trigger();
}
