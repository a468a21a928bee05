use crate::errors::IntoErrorResponse;
use crate::recorder::InMemoryRecorder;
use serde::Deserialize;
use std::sync::Arc;
use warp::reply::{self, Response};
use warp::Reply;

const MAX_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<usize>,
}

impl LimitQuery {
    fn capped(&self) -> Option<usize> {
        self.limit.map(|limit| limit.min(MAX_LIMIT))
    }
}

/// GET /api/leaderboard?limit=N
pub async fn leaderboard(recorder: Arc<InMemoryRecorder>, query: LimitQuery) -> Response {
    match recorder.leaderboard(query.capped()) {
        Ok(standings) => reply::json(&standings).into_response(),
        Err(err) => err.into_http_response(),
    }
}

/// GET /api/matches?limit=N
/// Most recently finished matches first
pub async fn recent_matches(recorder: Arc<InMemoryRecorder>, query: LimitQuery) -> Response {
    match recorder.recent(query.capped().unwrap_or(20)) {
        Ok(summaries) => reply::json(&summaries).into_response(),
        Err(err) => err.into_http_response(),
    }
}
