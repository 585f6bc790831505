//! Loopback fixtures shared by the module tests.

use crate::dispatcher::{ProcessingServer, ShutdownHandle};
use crate::executor::{TaskHandlerRegistry, WorkerPool};

use axum::Router;
use axum::http::header;
use axum::response::{Html, Redirect};
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

pub const PAGE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <title>Fixture Page</title>
    <meta name="description" content="A page used by tests">
    <meta property="og:title" content="Fixture">
    <link rel="stylesheet" href="/style.css">
    <script src="/app.js"></script>
    <script>console.log("inline");</script>
</head>
<body>
    <h1>Fixture</h1>
    <h2>First</h2>
    <h2>Second</h2>
    <a href="/about">About</a>
    <a href="/about">About again</a>
    <a href="https://other.test/page">Elsewhere</a>
    <a href="#top">Anchor</a>
    <a href="javascript:void(0)">Script</a>
    <a href="mailto:someone@example.com">Mail</a>
    <img src="/logo.png" alt="logo">
    <img src="/missing.png" alt="broken">
</body>
</html>"##;

/// Serves [`PAGE`] at `/`, a tiny PNG at `/logo.png`, a redirect at `/moved`
/// and a page that takes five seconds at `/slow`.
pub async fn spawn_site() -> SocketAddr {
    let app = Router::new()
        .route("/", get(|| async { Html(PAGE) }))
        .route(
            "/logo.png",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "image/png")],
                    vec![0x89u8, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a],
                )
            }),
        )
        .route("/moved", get(|| async { Redirect::temporary("/") }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                Html(PAGE)
            }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address nothing listens on: bound once, then released.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// A processing server running in the background on a loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: ShutdownHandle,
    pub task: JoinHandle<anyhow::Result<()>>,
}

pub async fn start_processing(registry: Arc<TaskHandlerRegistry>, workers: usize) -> TestServer {
    let pool = WorkerPool::new(registry, workers);
    let server = ProcessingServer::bind_with_pool("127.0.0.1:0".parse().unwrap(), pool)
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle();
    let task = tokio::spawn(server.run());
    TestServer { addr, shutdown, task }
}
