use crate::game::{Conclusion, EndStatus, MatchId, PlayerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// What gets persisted about a finished match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSummary {
    pub match_id: MatchId,
    pub player1: PlayerId,
    pub player2: PlayerId,
    pub winner: Option<PlayerId>,
    pub status: EndStatus,
    pub vs_bot: bool,
    pub created_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl From<&Conclusion> for MatchSummary {
    fn from(conclusion: &Conclusion) -> Self {
        let [player1, player2] = conclusion.players.clone();
        Self {
            match_id: conclusion.match_id.clone(),
            player1,
            player2,
            winner: conclusion.outcome.winner().cloned(),
            status: conclusion.outcome.status(),
            vs_bot: conclusion.vs_bot,
            created_at: conclusion.created_at,
            duration_ms: conclusion.duration_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStanding {
    pub username: PlayerId,
    pub games_played: u64,
    pub games_won: u64,
    pub games_drawn: u64,
}

#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Match record storage poisoned")]
    StoragePoisoned,
    #[error("Match record sink unavailable: {0}")]
    Unavailable(String),
}

/// Sink for completed matches. Called at most once per match.
#[async_trait]
pub trait MatchRecorder: Send + Sync {
    async fn record_completed_match(&self, summary: MatchSummary) -> Result<(), RecorderError>;
}

#[derive(Debug, Default)]
struct RecorderState {
    summaries: Vec<MatchSummary>,
    standings: HashMap<PlayerId, PlayerStanding>,
}

/// Keeps summaries and per-player standings in memory.
#[derive(Debug)]
pub struct InMemoryRecorder {
    state: RwLock<RecorderState>,
    bot_identity: PlayerId,
}

impl InMemoryRecorder {
    pub fn new(bot_identity: impl Into<PlayerId>) -> Self {
        Self {
            state: RwLock::new(RecorderState::default()),
            bot_identity: bot_identity.into(),
        }
    }

    pub fn record(&self, summary: MatchSummary) -> Result<bool, RecorderError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RecorderError::StoragePoisoned)?;
        if state
            .summaries
            .iter()
            .any(|existing| existing.match_id == summary.match_id)
        {
            tracing::debug!(match_id = %summary.match_id, "ignoring duplicate match record");
            return Ok(false);
        }

        for player in [&summary.player1, &summary.player2] {
            let standing = state
                .standings
                .entry(player.clone())
                .or_insert_with(|| PlayerStanding {
                    username: player.clone(),
                    ..PlayerStanding::default()
                });
            standing.games_played += 1;
            match &summary.winner {
                Some(winner) if winner == player => standing.games_won += 1,
                None => standing.games_drawn += 1,
                Some(_) => {}
            }
        }
        state.summaries.push(summary);
        Ok(true)
    }

    /// Standings ordered by wins, then name. The bot never appears.
    pub fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<PlayerStanding>, RecorderError> {
        let state = self
            .state
            .read()
            .map_err(|_| RecorderError::StoragePoisoned)?;
        let mut standings: Vec<PlayerStanding> = state
            .standings
            .values()
            .filter(|standing| standing.username != self.bot_identity)
            .cloned()
            .collect();
        standings.sort_by(|a, b| {
            b.games_won
                .cmp(&a.games_won)
                .then_with(|| a.username.cmp(&b.username))
        });
        standings.truncate(limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT));
        Ok(standings)
    }

    /// Most recent first.
    pub fn recent(&self, limit: usize) -> Result<Vec<MatchSummary>, RecorderError> {
        let state = self
            .state
            .read()
            .map_err(|_| RecorderError::StoragePoisoned)?;
        Ok(state.summaries.iter().rev().take(limit).cloned().collect())
    }

    pub fn get(&self, match_id: &str) -> Result<Option<MatchSummary>, RecorderError> {
        let state = self
            .state
            .read()
            .map_err(|_| RecorderError::StoragePoisoned)?;
        Ok(state
            .summaries
            .iter()
            .find(|summary| summary.match_id == match_id)
            .cloned())
    }

    pub fn total_matches(&self) -> Result<usize, RecorderError> {
        let state = self
            .state
            .read()
            .map_err(|_| RecorderError::StoragePoisoned)?;
        Ok(state.summaries.len())
    }
}

#[async_trait]
impl MatchRecorder for InMemoryRecorder {
    async fn record_completed_match(&self, summary: MatchSummary) -> Result<(), RecorderError> {
        self.record(summary).map(|_| ())
    }
}

impl crate::errors::IntoErrorResponse for RecorderError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            RecorderError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            RecorderError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RecorderError::StoragePoisoned => "record_storage_error",
            RecorderError::Unavailable(_) => "record_sink_unavailable",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            RecorderError::StoragePoisoned => ErrorSeverity::Critical,
            RecorderError::Unavailable(_) => ErrorSeverity::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, p1: &str, p2: &str, winner: Option<&str>) -> MatchSummary {
        MatchSummary {
            match_id: id.into(),
            player1: p1.into(),
            player2: p2.into(),
            winner: winner.map(Into::into),
            status: if winner.is_some() {
                EndStatus::Win
            } else {
                EndStatus::Draw
            },
            vs_bot: p2 == "BOT",
            created_at: Utc::now(),
            duration_ms: 1_000,
        }
    }

    #[test]
    fn standings_accumulate_across_matches() {
        let recorder = InMemoryRecorder::new("BOT");
        recorder.record(summary("1", "alice", "bob", Some("alice"))).unwrap();
        recorder.record(summary("2", "bob", "alice", None)).unwrap();
        recorder.record(summary("3", "carol", "alice", Some("alice"))).unwrap();

        let board = recorder.leaderboard(None).unwrap();
        assert_eq!(board[0].username, "alice");
        assert_eq!(board[0].games_played, 3);
        assert_eq!(board[0].games_won, 2);
        assert_eq!(board[0].games_drawn, 1);
        assert_eq!(recorder.total_matches().unwrap(), 3);
    }

    #[test]
    fn duplicate_match_ids_are_ignored() {
        let recorder = InMemoryRecorder::new("BOT");
        assert!(recorder.record(summary("1", "alice", "bob", Some("bob"))).unwrap());
        assert!(!recorder.record(summary("1", "alice", "bob", Some("bob"))).unwrap());

        let board = recorder.leaderboard(None).unwrap();
        let bob = board.iter().find(|s| s.username == "bob").unwrap();
        assert_eq!(bob.games_won, 1);
        assert_eq!(bob.games_played, 1);
    }

    #[test]
    fn leaderboard_excludes_bot_and_honours_limit() {
        let recorder = InMemoryRecorder::new("BOT");
        recorder.record(summary("1", "alice", "BOT", Some("BOT"))).unwrap();
        recorder.record(summary("2", "dave", "BOT", Some("BOT"))).unwrap();
        recorder.record(summary("3", "erin", "frank", Some("frank"))).unwrap();

        let board = recorder.leaderboard(Some(2)).unwrap();
        assert_eq!(board.len(), 2);
        assert!(board.iter().all(|s| s.username != "BOT"));
        assert_eq!(board[0].username, "frank");
    }

    #[test]
    fn recent_is_newest_first() {
        let recorder = InMemoryRecorder::new("BOT");
        recorder.record(summary("1", "a", "b", None)).unwrap();
        recorder.record(summary("2", "a", "b", None)).unwrap();
        let recent = recorder.recent(5).unwrap();
        assert_eq!(recent[0].match_id, "2");
        assert_eq!(recorder.get("1").unwrap().map(|s| s.match_id), Some("1".into()));
        assert!(recorder.get("9").unwrap().is_none());
    }
}
