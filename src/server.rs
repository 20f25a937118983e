//! # Operator Control Surface
//!
//! Thin HTTP adapter over the engine's observable state: status snapshot,
//! idempotent start/stop, config echo, and a static status page.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;
use warp::Filter;

use crate::engine::Engine;

const STATUS_PAGE: &str = include_str!("status.html");

fn with_engine(
    engine: Arc<Engine>,
) -> impl Filter<Extract = (Arc<Engine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

async fn handle_status(engine: Arc<Engine>) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(&engine.status().await))
}

async fn handle_start(engine: Arc<Engine>) -> Result<impl warp::Reply, Infallible> {
    let already = engine.is_running().await;
    engine.start().await;
    Ok(warp::reply::json(&serde_json::json!({
        "running": true,
        "changed": !already,
    })))
}

async fn handle_stop(engine: Arc<Engine>) -> Result<impl warp::Reply, Infallible> {
    let was_running = engine.is_running().await;
    engine.stop().await;
    Ok(warp::reply::json(&serde_json::json!({
        "running": false,
        "changed": was_running,
    })))
}

async fn handle_config(engine: Arc<Engine>) -> Result<impl warp::Reply, Infallible> {
    Ok(warp::reply::json(engine.config()))
}

pub fn routes(
    engine: Arc<Engine>,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(handle_status);

    let start = warp::path!("api" / "start")
        .and(warp::post())
        .and(with_engine(engine.clone()))
        .and_then(handle_start);

    let stop = warp::path!("api" / "stop")
        .and(warp::post())
        .and(with_engine(engine.clone()))
        .and_then(handle_stop);

    let config = warp::path!("api" / "config")
        .and(warp::get())
        .and(with_engine(engine))
        .and_then(handle_config);

    let page = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(STATUS_PAGE));

    status.or(start).or(stop).or(config).or(page)
}

/// Spawns the HTTP server on `port`. The task lives until the process
/// exits; the engine outlives individual requests via the shared Arc.
pub fn spawn(engine: Arc<Engine>, port: u16) -> JoinHandle<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target: "server", %addr, "Control surface listening");
    tokio::spawn(async move {
        warp::serve(routes(engine)).run(addr).await;
    })
}
