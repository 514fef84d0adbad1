//! Liveness probe endpoint, unrelated to the reconciliation logic.

use eyre::Context;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body};
use std::convert::Infallible;
use std::net::SocketAddr;

/// Serves `200 OK` with no body on `/healthz` (and the legacy `/_ah/warmup`
/// path) forever. Anything else is a 404.
pub async fn serve(addr: SocketAddr) -> eyre::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind health endpoint to {addr}"))?;
    tracing::info!(%addr, "health endpoint listening");

    loop {
        let (conn, _) = listener
            .accept()
            .await
            .context("accept health endpoint connection")?;
        let conn = hyper_util::rt::TokioIo::new(conn);
        tokio::spawn(async move {
            let service = service_fn(|req: Request<body::Incoming>| async move {
                let status = match req.uri().path() {
                    "/healthz" | "/_ah/warmup" => StatusCode::OK,
                    _ => StatusCode::NOT_FOUND,
                };
                let response = Response::builder()
                    .status(status)
                    .body(Full::new(Bytes::new()))
                    .expect("static response is always valid");
                Ok::<_, Infallible>(response)
            });
            if let Err(e) = hyper::server::conn::http1::Builder::new()
                .serve_connection(conn, service)
                .await
            {
                tracing::debug!(error = %e, "health endpoint connection error");
            }
        });
    }
}
