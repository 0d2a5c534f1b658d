//! Ingestion endpoints used by the persistence layer and other services
//!
//! Messages arrive here already stored; the hub only serializes and fans them out.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{self, Reply};

use crate::core::message::ChatMessage;
use crate::core::server::SharedChatServer;

#[derive(Debug, Serialize, Deserialize)]
pub struct PublishResponse {
    pub delivered: usize,
    pub evicted: usize,
}

#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn failure(message: String) -> reply::Response {
    reply::with_status(
        reply::json(&ErrorBody { error: message }),
        StatusCode::SERVICE_UNAVAILABLE,
    )
    .into_response()
}

pub async fn publish_message(message: ChatMessage, server: SharedChatServer) -> Result<reply::Response, Infallible> {
    let chat_id = message.chat_id;
    match server.publish_message(message).await {
        Ok(report) => {
            info!(
                "Broadcast message to {} clients in chat {} ({} evicted)",
                report.delivered,
                chat_id,
                report.evicted.len()
            );
            let body = PublishResponse {
                delivered: report.delivered,
                evicted: report.evicted.len(),
            };
            Ok(reply::with_status(reply::json(&body), StatusCode::ACCEPTED).into_response())
        }
        Err(e) => {
            error!("Failed to broadcast message to chat {}: {}", chat_id, e);
            Ok(failure(e.to_string()))
        }
    }
}

pub async fn notify_user(
    user_id: String,
    request: NotificationRequest,
    server: SharedChatServer,
) -> Result<reply::Response, Infallible> {
    match server.notify_user(&user_id, &request.message) {
        Ok(delivered) => {
            let body = PublishResponse {
                delivered,
                evicted: 0,
            };
            Ok(reply::with_status(reply::json(&body), StatusCode::ACCEPTED).into_response())
        }
        Err(e) => {
            error!("Failed to notify {}: {}", user_id, e);
            Ok(failure(e.to_string()))
        }
    }
}
