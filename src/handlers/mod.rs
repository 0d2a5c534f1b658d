//! Request handlers for different server endpoints

pub mod presence;
pub mod publish;
pub mod websocket;

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::reply::{self, Reply};
use warp::{Filter, Rejection};

use crate::constants::{MAX_JSON_BODY_SIZE, WS_PATH};
use crate::core::server::SharedChatServer;

// Re-export the websocket handler
pub use websocket::handle_ws_client;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub connections: usize,
    pub topics: usize,
}

// Helper function to include the server state in a request
fn with_server(
    server: SharedChatServer,
) -> impl Filter<Extract = (SharedChatServer,), Error = Infallible> + Clone {
    warp::any().map(move || server.clone())
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_JSON_BODY_SIZE).and(warp::body::json())
}

async fn stats(server: SharedChatServer) -> Result<reply::Response, Infallible> {
    match server.stats() {
        Ok((connections, topics)) => Ok(reply::json(&StatsResponse {
            connections,
            topics,
        })
        .into_response()),
        Err(e) => {
            error!("Failed to read hub stats: {}", e);
            Ok(StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
    }
}

/// Every route the server exposes
pub fn routes(
    server: SharedChatServer,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let max_message_size = server.config().max_message_size;

    let ws_route = warp::path(WS_PATH)
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::query::<ConnectParams>())
        .and(with_server(server.clone()))
        .map(move |ws: warp::ws::Ws, params: ConnectParams, server: SharedChatServer| {
            let user_id = params
                .user_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("anon-{}", Uuid::new_v4()));
            info!("New websocket connection for user {}", user_id);
            ws.max_message_size(max_message_size)
                .on_upgrade(move |socket| handle_ws_client(socket, user_id, server))
        });

    let health_route = warp::path!("health").and(warp::get()).map(|| "OK");

    let batch_route = warp::path!("presence" / "batch")
        .and(warp::post())
        .and(json_body())
        .and(with_server(server.clone()))
        .and_then(presence::batch_status);

    let status_route = warp::path!("presence" / String)
        .and(warp::get())
        .and(with_server(server.clone()))
        .and_then(presence::get_status);

    let offline_route = warp::path!("presence" / String)
        .and(warp::delete())
        .and(with_server(server.clone()))
        .and_then(presence::set_offline);

    let publish_route = warp::path!("messages")
        .and(warp::post())
        .and(json_body())
        .and(with_server(server.clone()))
        .and_then(publish::publish_message);

    let notify_route = warp::path!("users" / String / "notifications")
        .and(warp::post())
        .and(json_body())
        .and(with_server(server.clone()))
        .and_then(publish::notify_user);

    let stats_route = warp::path!("stats")
        .and(warp::get())
        .and(with_server(server))
        .and_then(stats);

    ws_route
        .or(health_route)
        .or(batch_route)
        .or(status_route)
        .or(offline_route)
        .or(publish_route)
        .or(notify_route)
        .or(stats_route)
}
