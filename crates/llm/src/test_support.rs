//! Stub upstream servers for provider tests.

use axum::{body::Body, Router};
use futures::StreamExt;
use std::time::Duration;

/// Serve `router` on an ephemeral local port and return its base URL.
pub(crate) async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A body that sends `parts` a few milliseconds apart.
pub(crate) fn paced_body(parts: Vec<String>) -> Body {
    let stream = futures::stream::iter(parts).then(|part| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok::<_, std::io::Error>(part)
    });
    Body::from_stream(stream)
}

/// A body that sends `parts` and then goes silent without closing.
pub(crate) fn stalled_body(parts: Vec<String>) -> Body {
    let stream = futures::stream::iter(parts)
        .map(Ok::<_, std::io::Error>)
        .chain(futures::stream::pending());
    Body::from_stream(stream)
}
