use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Serves `router` on an ephemeral loopback port for the rest of the test.
pub async fn serve_stub(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}
