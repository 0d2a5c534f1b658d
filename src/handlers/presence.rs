//! HTTP status surface over the presence tracker
//!
//! A store failure is reported as 503 with `is_online: null` so callers can
//! tell "unknown" apart from "offline".

use log::{error, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::{self, Reply};

use crate::constants::MAX_PRESENCE_BATCH;
use crate::core::server::SharedChatServer;

#[derive(Debug, Serialize, Deserialize)]
pub struct PresenceStatus {
    pub user_id: String,
    pub is_online: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub user_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub statuses: HashMap<String, bool>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_reply(status: StatusCode, message: String) -> reply::Response {
    reply::with_status(reply::json(&ErrorBody { error: message }), status).into_response()
}

pub async fn get_status(user_id: String, server: SharedChatServer) -> Result<reply::Response, Infallible> {
    match server.presence().is_online(&user_id).await {
        Ok(is_online) => Ok(reply::json(&PresenceStatus {
            user_id,
            is_online: Some(is_online),
            error: None,
        })
        .into_response()),
        Err(e) => {
            error!("Presence lookup for {} failed: {}", user_id, e);
            let body = PresenceStatus {
                user_id,
                is_online: None,
                error: Some(e.to_string()),
            };
            Ok(reply::with_status(reply::json(&body), StatusCode::SERVICE_UNAVAILABLE).into_response())
        }
    }
}

pub async fn batch_status(request: BatchRequest, server: SharedChatServer) -> Result<reply::Response, Infallible> {
    if request.user_ids.len() > MAX_PRESENCE_BATCH {
        warn!("Rejected presence batch of {} ids", request.user_ids.len());
        return Ok(error_reply(
            StatusCode::BAD_REQUEST,
            format!("at most {} user ids per request", MAX_PRESENCE_BATCH),
        ));
    }

    match server.presence().online_statuses(&request.user_ids).await {
        Ok(statuses) => Ok(reply::json(&BatchResponse { statuses }).into_response()),
        Err(e) => {
            error!("Batched presence lookup failed: {}", e);
            Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

pub async fn set_offline(user_id: String, server: SharedChatServer) -> Result<reply::Response, Infallible> {
    match server.presence().set_offline(&user_id).await {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(e) => {
            error!("Failed to mark {} offline: {}", user_id, e);
            Ok(error_reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}
