// src/server.rs
//
// HTTP endpoint serving the latest joystick record.
//
// Routes:
//   GET/POST /packet       -> "h,v,c,r" (text/plain)
//   POST /                 -> "h,v,c,r" (the browser page polls with a POST)
//   GET /packet.json       -> {"h":..,"v":..,"c":..,"r":..}
//   anything else          -> static files, when a directory is configured

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::future::Future;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::io::{LatestRecord, Record};

/// Build the router over a consumer handle
pub fn router(latest: LatestRecord, static_dir: Option<PathBuf>) -> Router {
    // GET / falls through to index.html when static files are served
    let root = match &static_dir {
        Some(dir) => post(packet_text).fallback_service(ServeDir::new(dir)),
        None => post(packet_text),
    };

    let router = Router::new()
        .route("/", root)
        .route("/packet", get(packet_text).post(packet_text))
        .route("/packet.json", get(packet_json))
        .with_state(latest);

    match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    }
}

async fn packet_text(State(latest): State<LatestRecord>) -> impl IntoResponse {
    let record: Record = latest.get();
    ([(header::CONTENT_TYPE, "text/plain")], record.to_string())
}

async fn packet_json(State(latest): State<LatestRecord>) -> Json<Record> {
    Json(latest.get())
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    latest: LatestRecord,
    static_dir: Option<PathBuf>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tlog!("[http] Serving latest packet on http://{}/packet", addr);
    }
    axum::serve(listener, router(latest, static_dir))
        .with_graceful_shutdown(shutdown)
        .await
}

// ============================================================================
// Tests
// ============================================================================
