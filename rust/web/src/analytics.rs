use crate::game::{Conclusion, MatchId, Outcome, PlayerId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalyticsEventKind {
    MatchStarted,
    MatchCompleted,
    MatchForfeited,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    pub kind: AnalyticsEventKind,
    pub match_id: MatchId,
    pub players: [PlayerId; 2],
    pub vs_bot: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

impl AnalyticsEvent {
    pub fn started(
        match_id: MatchId,
        players: [PlayerId; 2],
        vs_bot: bool,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            kind: AnalyticsEventKind::MatchStarted,
            match_id,
            players,
            vs_bot,
            winner: None,
            duration_ms: None,
            timestamp,
        }
    }

    /// `MATCH_FORFEITED` for forfeits, `MATCH_COMPLETED` for wins and draws.
    pub fn finished(conclusion: &Conclusion) -> Self {
        let kind = match conclusion.outcome {
            Outcome::Forfeit { .. } => AnalyticsEventKind::MatchForfeited,
            Outcome::Win { .. } | Outcome::Draw => AnalyticsEventKind::MatchCompleted,
        };
        Self {
            kind,
            match_id: conclusion.match_id.clone(),
            players: conclusion.players.clone(),
            vs_bot: conclusion.vs_bot,
            winner: conclusion.outcome.winner().cloned(),
            duration_ms: Some(conclusion.duration_ms()),
            timestamp: conclusion.ended_at,
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Analytics sink unavailable: {0}")]
    Unavailable(String),
    #[error("Analytics state poisoned")]
    Poisoned,
}

/// Best-effort analytics stream. Failures are logged by the caller and otherwise ignored.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: AnalyticsEvent) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use connect4_engine::board::Board;

    fn conclusion(outcome: Outcome) -> Conclusion {
        let created_at = Utc::now();
        Conclusion {
            match_id: "m".into(),
            players: ["a".into(), "b".into()],
            outcome,
            board: Board::new(),
            winning_line: None,
            vs_bot: false,
            created_at,
            ended_at: created_at + chrono::Duration::milliseconds(250),
        }
    }

    #[test]
    fn forfeit_is_distinguished_from_completion() {
        let forfeit = AnalyticsEvent::finished(&conclusion(Outcome::Forfeit {
            winner: "a".into(),
            absent: "b".into(),
        }));
        assert_eq!(forfeit.kind, AnalyticsEventKind::MatchForfeited);
        assert_eq!(forfeit.winner.as_deref(), Some("a"));
        assert_eq!(forfeit.duration_ms, Some(250));

        let draw = AnalyticsEvent::finished(&conclusion(Outcome::Draw));
        assert_eq!(draw.kind, AnalyticsEventKind::MatchCompleted);
        assert!(draw.winner.is_none());
    }

    #[test]
    fn kind_serializes_in_screaming_case() {
        let event = AnalyticsEvent::started("m".into(), ["a".into(), "b".into()], true, Utc::now());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["kind"], "MATCH_STARTED");
        assert_eq!(value["vsBot"], true);
        assert!(value.get("winner").is_none());
    }
}
