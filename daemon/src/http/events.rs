use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::stream::Stream;
use kview_core::change::ChangeQuery;
use kview_core::{ChangeRecord, ClusterEvent};
use serde::Deserialize;
use std::convert::Infallible;

use super::AppState;
use crate::error::ApiError;
use crate::event_fabric::Topic;

#[derive(Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub topics: Option<String>,
}

fn parse_topics(raw: Option<&str>) -> Vec<Topic> {
    let Some(raw) = raw else {
        return vec![Topic::Topology, Topic::Change, Topic::RawEvent, Topic::ContextProgress, Topic::Heartbeat];
    };
    raw.split(',')
        .filter_map(|name| match name.trim() {
            "topology" => Some(Topic::Topology),
            "change" => Some(Topic::Change),
            "raw_event" => Some(Topic::RawEvent),
            "context_progress" => Some(Topic::ContextProgress),
            "heartbeat" => Some(Topic::Heartbeat),
            _ => None,
        })
        .collect()
}

/// Server-Sent Events: `event: <topic>\ndata: <json>\n\n` per frame.
pub async fn stream(
    State(state): State<AppState>,
    Query(q): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let topics = parse_topics(q.topics.as_deref());
    let subscription = state.fabric.register(topics).await;
    let fabric = state.fabric.clone();
    let id = subscription.id;
    let mut receiver = subscription.receiver;

    let stream = async_stream::stream! {
        while let Some(frame) = receiver.recv().await {
            yield Ok(Event::default().event(frame.event_name()).data(frame.data()));
        }
        fabric.unregister(id).await;
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

pub async fn list_raw_events(State(state): State<AppState>) -> Result<Json<Vec<ClusterEvent>>, ApiError> {
    let query = ChangeQuery {
        include_raw_events: true,
        ..Default::default()
    };
    let (_records, events) = state.history.query(&query).await;
    Ok(Json(events))
}

#[derive(Deserialize, Default)]
pub struct ChangesQuery {
    pub since: Option<u64>,
    pub until: Option<u64>,
    pub namespace: Option<String>,
    pub kind: Option<String>,
    #[serde(default)]
    pub include_routine: bool,
    pub limit: Option<usize>,
}

pub async fn list_changes(
    State(state): State<AppState>,
    Query(q): Query<ChangesQuery>,
) -> Result<Json<Vec<ChangeRecord>>, ApiError> {
    let query = ChangeQuery {
        since: q.since,
        until: q.until,
        namespace: q.namespace,
        kind: q.kind,
        include_routine: q.include_routine,
        include_raw_events: false,
        limit: q.limit,
    };
    let (records, _events) = state.history.query(&query).await;
    Ok(Json(records))
}
