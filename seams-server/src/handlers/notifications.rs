//! Live notification stream (Server-Sent Events)
//!
//! Each SSE message carries `id` = sequence number and `event` = kind, so a
//! browser `EventSource` resumes from `Last-Event-ID` on reconnect.

use std::convert::Infallible;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use crate::auth::StreamUser;
use crate::handlers::AppState;
use crate::notify::{Frame, Room};

#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct StreamQuery {
    /// Resume after this sequence number (when `Last-Event-ID` cannot be sent)
    pub last_event_id: Option<u64>,
}

/// Resume point: `Last-Event-ID` header first, then the query parameter
fn resume_point(headers: &HeaderMap, query: &StreamQuery) -> Option<u64> {
    headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .or(query.last_event_id)
}

fn to_sse(frame: Frame) -> Event {
    match frame {
        Frame::Notification(n) => {
            let event = Event::default()
                .id(n.seq.to_string())
                .event(n.kind.as_str());
            match event.json_data(&*n) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(seq = n.seq, error = %e, "Failed to encode notification");
                    Event::default().comment("encoding error")
                }
            }
        }
        Frame::ResyncRequired { latest_seq } => Event::default()
            .id(latest_seq.to_string())
            .event("resync_required")
            .data(json!({ "latest_seq": latest_seq }).to_string()),
        Frame::Lagged { last_delivered } => Event::default()
            .event("lagged")
            .data(json!({ "last_delivered": last_delivered }).to_string()),
    }
}

/// Subscribe to live notifications
///
/// Authenticate with a Bearer header or `?access_token=`. Notifications
/// missed since `Last-Event-ID` are replayed first; if they are no longer
/// retained the first message is `resync_required`. A client that reads
/// too slowly receives `lagged` and is disconnected.
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    tag = "Notifications",
    params(
        StreamQuery,
        ("access_token" = Option<String>, Query, description = "Session token for clients that cannot set headers"),
        ("Last-Event-ID" = Option<String>, Header, description = "Last sequence number received")
    ),
    responses(
        (status = 200, description = "text/event-stream of notifications"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_token" = []))
)]
pub async fn notification_stream_handler(
    State(state): State<AppState>,
    StreamUser(user): StreamUser,
    headers: HeaderMap,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_seen = resume_point(&headers, &query);
    let rooms = Room::for_user(user.id(), user.role());
    let subscription = state.hub.subscribe(rooms, last_seen);

    tracing::info!(
        user_id = %user.id(),
        role = %user.role(),
        last_seen = ?last_seen,
        "Notification stream opened"
    );

    let stream = subscription.map(|frame| Ok(to_sse(frame)));
    Sse::new(stream).keep_alive(KeepAlive::default())
}
