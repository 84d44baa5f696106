// Copyright (c) 2026 dynamite contributors
// SPDX-License-Identifier: Apache-2.0
//! The Gateway's HTTP surface (spec §4.10, §6).

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::entities::{Cursor, GroupId, Topic, WorldItemType};
use crate::domain::mapper::{self, RPC_APPEND_REPLY, RPC_CREATE_TOPIC, RPC_GET_PRESENCE, RPC_LIST_WORLD, RPC_WHOAMI};
use crate::error::{DynamiteError, Result};
use crate::expander;
use crate::gateway::proxy::proxy_handler;
use crate::gateway::state::AppState;
use crate::gateway::ws::ws_handler;
use crate::wire;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/whoami", get(whoami))
        .route("/api/spaces", get(list_spaces))
        .route("/api/spaces/:id/threads", get(list_space_threads))
        .route("/api/spaces/:id/threads/:topic_id", get(get_thread))
        .route("/api/spaces/:id/messages", post(create_topic))
        .route("/api/spaces/:id/threads/:topic_id/replies", post(append_reply))
        .route("/api/dms", get(list_dms))
        .route("/api/dms/:id/threads", get(list_dm_threads))
        .route("/api/dms/:id/threads/:topic_id", get(get_thread))
        .route("/api/notifications", get(notifications))
        .route("/api/mark-read/:id", post(mark_read))
        .route("/api/presence", get(presence))
        .route("/api/proxy", get(proxy_handler))
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn whoami(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let entries = state.transport.call_json("whoami", json!([wire::request_header()])).await?;
    let entry = entries
        .first()
        .ok_or_else(|| DynamiteError::SchemaMismatch {
            rpc_id: RPC_WHOAMI.to_string(),
            detail: "empty whoami response".to_string(),
        })?;
    Ok(axum::Json(mapper::decode_whoami(entry)?))
}

async fn list_world(state: &AppState, only: WorldItemType) -> Result<Vec<crate::domain::entities::WorldItem>> {
    let entries = state
        .transport
        .call_json("list_world", json!([wire::request_header()]))
        .await?;
    let entry = entries
        .first()
        .ok_or_else(|| DynamiteError::SchemaMismatch {
            rpc_id: RPC_LIST_WORLD.to_string(),
            detail: "empty world roster response".to_string(),
        })?;
    let items = mapper::decode_world_page(entry)?;
    Ok(items.into_iter().filter(|i| i.item_type == only).collect())
}

async fn list_spaces(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(axum::Json(list_world(&state, WorldItemType::Space).await?))
}

async fn list_dms(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(axum::Json(list_world(&state, WorldItemType::Dm).await?))
}

async fn notifications(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let entries = state
        .transport
        .call_json("list_world", json!([wire::request_header()]))
        .await?;
    let entry = entries
        .first()
        .ok_or_else(|| DynamiteError::SchemaMismatch {
            rpc_id: RPC_LIST_WORLD.to_string(),
            detail: "empty world roster response".to_string(),
        })?;
    let items = mapper::decode_world_page(entry)?;
    let categorized: Vec<_> = items
        .into_iter()
        .filter(|i| i.notification_category != crate::domain::entities::NotificationCategory::None)
        .collect();
    Ok(axum::Json(categorized))
}

#[derive(Debug, Deserialize)]
struct ThreadsQuery {
    #[serde(rename = "pageSize")]
    page_size: Option<u32>,
    cursor: Option<String>,
    since: Option<String>,
    until: Option<String>,
    format: Option<String>,
    #[serde(rename = "maxPages")]
    max_pages: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ThreadsResponse {
    Threaded { topics: Vec<Topic>, next_cursors: Cursor },
    Messages { messages: Vec<crate::domain::entities::Message> },
}

async fn list_space_threads(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ThreadsQuery>,
) -> Result<impl IntoResponse> {
    list_threads(state, GroupId::Space(id), query).await
}

async fn list_dm_threads(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ThreadsQuery>,
) -> Result<impl IntoResponse> {
    list_threads(state, GroupId::Dm(id), query).await
}

async fn list_threads(
    state: AppState,
    group_id: GroupId,
    query: ThreadsQuery,
) -> Result<axum::Json<ThreadsResponse>> {
    let mut params = crate::cursor::ListTopicsParams::new(group_id.as_str());
    if let Some(page_size) = query.page_size {
        params.page_size = page_size;
    }
    if let Some(since) = query.since.as_deref() {
        params.since = Some(parse_time_input(since)?);
    }
    if let Some(until) = query.until.as_deref() {
        params.until = Some(parse_time_input(until)?);
    }
    if let Some(cursor_json) = query.cursor.as_deref() {
        params.cursors = Some(
            serde_json::from_str(cursor_json)
                .map_err(|e| DynamiteError::Other(format!("invalid cursor: {e}")))?,
        );
    }
    params.max_pages = query.max_pages.or(Some(1));

    let mut stream = Box::pin(state.cursor_engine.list_topics(params));
    let mut topics = Vec::new();
    let mut next_cursors = Cursor::default();
    while let Some(page) = stream.next().await {
        let page = page?;
        next_cursors = page.next_cursors.clone();
        topics.extend(page.topics);
    }

    let topics = state.expander.expand(topics).await;

    if query.format.as_deref() == Some("messages") {
        let mut messages: Vec<_> = topics.into_iter().flat_map(|t| t.replies).collect();
        messages.sort_by_key(|m| m.timestamp);
        Ok(axum::Json(ThreadsResponse::Messages { messages }))
    } else {
        Ok(axum::Json(ThreadsResponse::Threaded { topics, next_cursors }))
    }
}

async fn get_thread(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
) -> Result<impl IntoResponse> {
    let replies = expander::fetch_thread_replies(&state.transport, &topic_id, &id).await?;
    Ok(axum::Json(replies))
}

#[derive(Debug, Deserialize)]
struct CreateTopicBody {
    text: String,
}

async fn create_topic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreateTopicBody>,
) -> Result<impl IntoResponse> {
    let rpc_body = json!([wire::request_header(), id, body.text]);
    let entries = state.transport.call_batch(RPC_CREATE_TOPIC, rpc_body).await?;
    let entry = entries
        .first()
        .ok_or_else(|| DynamiteError::SchemaMismatch {
            rpc_id: RPC_CREATE_TOPIC.to_string(),
            detail: "empty create_topic response".to_string(),
        })?;
    let message = mapper::decode_message(&entry.payload, "", &id)?;
    Ok((StatusCode::CREATED, axum::Json(message)))
}

#[derive(Debug, Deserialize)]
struct AppendReplyBody {
    text: String,
}

async fn append_reply(
    State(state): State<AppState>,
    Path((id, topic_id)): Path<(String, String)>,
    Json(body): Json<AppendReplyBody>,
) -> Result<impl IntoResponse> {
    let rpc_body = json!([wire::request_header(), id, topic_id, body.text]);
    let entries = state.transport.call_batch(RPC_APPEND_REPLY, rpc_body).await?;
    let entry = entries
        .first()
        .ok_or_else(|| DynamiteError::SchemaMismatch {
            rpc_id: RPC_APPEND_REPLY.to_string(),
            detail: "empty append_reply response".to_string(),
        })?;
    let message = mapper::decode_message(&entry.payload, &topic_id, &id)?;
    Ok((StatusCode::CREATED, axum::Json(message)))
}

#[derive(Debug, Deserialize)]
struct MarkReadBody {
    #[serde(rename = "unreadCount", default)]
    unread_count: u32,
}

async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MarkReadBody>,
) -> impl IntoResponse {
    state.mark_read.enqueue(GroupId::from_raw(&id), body.unread_count).await;
    StatusCode::ACCEPTED
}

#[derive(Debug, Deserialize)]
struct PresenceQuery {
    #[serde(rename = "userIds")]
    user_ids: String,
}

async fn presence(
    State(state): State<AppState>,
    Query(query): Query<PresenceQuery>,
) -> Result<impl IntoResponse> {
    let user_ids: Vec<&str> = query.user_ids.split(',').filter(|s| !s.is_empty()).collect();
    let body = json!([wire::request_header(), user_ids]);
    let entries = state.transport.call_json("get_presence", body).await?;
    let entry = entries
        .first()
        .ok_or_else(|| DynamiteError::SchemaMismatch {
            rpc_id: RPC_GET_PRESENCE.to_string(),
            detail: "empty presence response".to_string(),
        })?;
    Ok(axum::Json(mapper::decode_presence_page(entry)?))
}

/// Parse a `since`/`until` query input per spec §6: integer < 10^13 is
/// seconds, integer >= 10^13 is microseconds, otherwise ISO-8601 with
/// timezone or a relative `\d+(m|h|d|w)` "ago" form. Always returns
/// microseconds.
pub fn parse_time_input(raw: &str) -> Result<i64> {
    if let Ok(n) = raw.parse::<i64>() {
        return Ok(if n < 10_000_000_000_000 { n * 1_000_000 } else { n });
    }

    if let Some(relative) = parse_relative(raw) {
        let now_micros = chrono::Utc::now().timestamp_micros();
        return Ok(now_micros - relative);
    }

    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_micros())
        .map_err(|_| DynamiteError::Other(format!("unrecognized time input: {raw}")))
}

fn parse_relative(raw: &str) -> Option<i64> {
    let unit = raw.chars().last()?;
    let digits = &raw[..raw.len() - 1];
    let count: i64 = digits.parse().ok()?;
    let unit_micros = match unit {
        'm' => 60_000_000,
        'h' => 3_600_000_000,
        'd' => 86_400_000_000,
        'w' => 7 * 86_400_000_000,
        _ => return None,
    };
    Some(count * unit_micros)
}

impl IntoResponse for DynamiteError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            DynamiteError::NotLoggedIn | DynamiteError::Unauthorized => StatusCode::UNAUTHORIZED,
            DynamiteError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            DynamiteError::CursorGroupMismatch { .. } | DynamiteError::Other(_) => StatusCode::BAD_REQUEST,
            DynamiteError::ServerError(_) | DynamiteError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_vs_microseconds_threshold() {
        assert_eq!(parse_time_input("1700000000").unwrap(), 1_700_000_000_000_000);
        assert_eq!(parse_time_input("1700000000000000").unwrap(), 1_700_000_000_000_000);
    }

    #[test]
    fn relative_form_is_subtracted_from_now() {
        let now = chrono::Utc::now().timestamp_micros();
        let parsed = parse_time_input("2h").unwrap();
        assert!(parsed <= now - 7_199_000_000 && parsed >= now - 7_201_000_000);
    }

    #[test]
    fn iso8601_with_timezone_parses() {
        let parsed = parse_time_input("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(parsed, 1_704_067_200_000_000);
    }

    #[test]
    fn garbage_input_is_rejected() {
        assert!(parse_time_input("not-a-time").is_err());
    }
}
