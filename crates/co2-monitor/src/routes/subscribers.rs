//! Subscriber Routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::AppState;
use alerting::{Notifier, SubscriberInfo, UserId};

/// Response for the subscriber listing
#[derive(Debug, Serialize)]
pub struct SubscriberList {
    pub data: Vec<SubscriberInfo>,
    pub count: usize,
}

/// Response for subscribe
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub user: UserId,
    pub created: bool,
}

/// Body for the snooze endpoint
#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    /// Minutes to mute; zero or negative clears
    pub minutes: i64,
}

/// List active subscribers
pub async fn list<N: Notifier>(State(state): State<Arc<AppState<N>>>) -> Json<SubscriberList> {
    let data = state.registry.active_users().await;
    Json(SubscriberList { count: data.len(), data })
}

/// Subscribe a user; 201 when new, 200 when already active
pub async fn subscribe<N: Notifier>(
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<i64>,
) -> (StatusCode, Json<SubscribeResponse>) {
    let user = UserId(id);
    let created = state.registry.subscribe(user).await;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    (status, Json(SubscribeResponse { user, created }))
}

/// Unsubscribe a user; always 204
pub async fn unsubscribe<N: Notifier>(
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<i64>,
) -> StatusCode {
    state.registry.unsubscribe(UserId(id)).await;
    StatusCode::NO_CONTENT
}

/// Set or clear a user's snooze; 404 when not subscribed
pub async fn snooze<N: Notifier>(
    State(state): State<Arc<AppState<N>>>,
    Path(id): Path<i64>,
    Json(body): Json<SnoozeRequest>,
) -> StatusCode {
    if state.registry.set_snooze(UserId(id), body.minutes).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
