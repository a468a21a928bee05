use crate::ai::{self, BotStrategy};
use crate::analytics::{AnalyticsEvent, EventPublisher};
use crate::errors::{ErrorSeverity, IntoErrorResponse};
use crate::events::{BroadcastError, Broadcaster, ServerEvent};
use crate::game::{
    Conclusion, ConnectionId, GameError, Match, MatchId, MoveOutcome, MoveResult, PlayerId,
};
use crate::recorder::{MatchRecorder, MatchSummary};
use crate::registry::{
    game_error_code, lock_match, DisconnectOutcome, JoinOutcome, MatchHandle, MatchRegistry,
    RegistryError, WaitingPlayer,
};
use crate::settings::GatewaySettings;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Malformed message: {0}")]
    Protocol(String),
    #[error("Join the queue before sending moves")]
    NotJoined,
    #[error("Connection already joined as {bound}, cannot join as {requested}")]
    IdentityMismatch { bound: PlayerId, requested: PlayerId },
}

impl IntoErrorResponse for GatewayError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            GatewayError::Registry(err) => err.status_code(),
            GatewayError::Game(GameError::NotYourTurn) => StatusCode::CONFLICT,
            GatewayError::Game(_) | GatewayError::Protocol(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotJoined => StatusCode::UNAUTHORIZED,
            GatewayError::IdentityMismatch { .. } => StatusCode::CONFLICT,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            GatewayError::Registry(err) => err.error_code(),
            GatewayError::Game(err) => game_error_code(err),
            GatewayError::Protocol(_) => "invalid_message",
            GatewayError::NotJoined => "not_joined",
            GatewayError::IdentityMismatch { .. } => "identity_mismatch",
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            GatewayError::Registry(err) => err.severity(),
            _ => ErrorSeverity::Client,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinReply {
    Queued,
    Started { match_id: MatchId },
    Reconnected { match_id: MatchId },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchView {
    pub match_id: MatchId,
    pub players: [PlayerId; 2],
    pub turn: PlayerId,
    pub vs_bot: bool,
    pub moves: usize,
    pub disconnected: Vec<PlayerId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Match> for MatchView {
    fn from(game: &Match) -> Self {
        Self {
            match_id: game.id().clone(),
            players: game.players().clone(),
            turn: game.turn().clone(),
            vs_bot: game.is_vs_bot(),
            moves: game.board().pieces(),
            disconnected: game.disconnected(),
            created_at: game.created_at(),
            updated_at: game.updated_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LobbySnapshot {
    pub waiting: Vec<WaitingPlayer>,
    pub matches: Vec<MatchView>,
}

/// Turns connection events into registry operations and player notifications.
///
/// Cloning is cheap; every clone drives the same registry. Timers hold a clone
/// and re-validate the match and their token when they fire.
#[derive(Clone)]
pub struct SessionGateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    registry: MatchRegistry,
    broadcaster: Arc<dyn Broadcaster>,
    recorder: Arc<dyn MatchRecorder>,
    publisher: Arc<dyn EventPublisher>,
    bot: Arc<dyn BotStrategy>,
    settings: GatewaySettings,
    next_connection: AtomicU64,
}

impl SessionGateway {
    pub fn new(
        settings: GatewaySettings,
        broadcaster: Arc<dyn Broadcaster>,
        recorder: Arc<dyn MatchRecorder>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let bot = ai::create_bot(&settings.bot_strategy);
        Self::with_bot(settings, broadcaster, recorder, publisher, bot)
    }

    pub fn with_bot(
        settings: GatewaySettings,
        broadcaster: Arc<dyn Broadcaster>,
        recorder: Arc<dyn MatchRecorder>,
        publisher: Arc<dyn EventPublisher>,
        bot: Arc<dyn BotStrategy>,
    ) -> Self {
        Self {
            inner: Arc::new(GatewayInner {
                registry: MatchRegistry::new(settings.bot_identity.clone()),
                broadcaster,
                recorder,
                publisher,
                bot,
                settings,
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    pub fn registry(&self) -> &MatchRegistry {
        &self.inner.registry
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.inner.settings
    }

    /// Identity for a new transport connection.
    pub fn open_connection(&self) -> ConnectionId {
        self.inner.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    pub fn join(&self, connection: ConnectionId, username: &str) -> Result<JoinReply, GatewayError> {
        let player = username.trim();
        match self.inner.registry.join(player, connection, Utc::now())? {
            JoinOutcome::Queued { ticket } => {
                self.send_queued(player);
                self.schedule_fallback(player.to_string(), ticket)?;
                Ok(JoinReply::Queued)
            }
            JoinOutcome::AlreadyQueued => {
                self.send_queued(player);
                Ok(JoinReply::Queued)
            }
            JoinOutcome::Paired(handle) => {
                let match_id = self.announce_start(&handle)?;
                Ok(JoinReply::Started { match_id })
            }
            JoinOutcome::Reconnected {
                handle,
                forfeit_canceled,
            } => {
                let game = lock_match(&handle)?;
                tracing::info!(
                    match_id = %game.id(),
                    player = %player,
                    forfeit_canceled,
                    "player reconnected"
                );
                self.deliver(player, self.start_event(&game, player));
                if let Some(opponent) = game.opponent_of(player) {
                    if game.bot() != Some(opponent) {
                        self.deliver(
                            opponent,
                            ServerEvent::PeerReconnected {
                                match_id: game.id().clone(),
                                player: player.to_string(),
                            },
                        );
                    }
                }
                Ok(JoinReply::Reconnected {
                    match_id: game.id().clone(),
                })
            }
        }
    }

    /// Apply a move for `player`. Rejections go back to the caller only.
    pub fn submit_move(
        &self,
        player: &str,
        match_id: &str,
        column: i64,
    ) -> Result<MoveOutcome, GatewayError> {
        let handle = self.inner.registry.get(match_id)?;
        let result = {
            let mut game = lock_match(&handle)?;
            let result = game.play(player, column, Utc::now())?;
            tracing::debug!(
                match_id = %match_id,
                player = %player,
                column,
                row = result.last_move.row,
                "move accepted"
            );
            self.notify_move(&game, &result);
            result
        };

        match result.conclusion {
            Some(conclusion) => self.retire(conclusion),
            None => self.schedule_bot_if_needed(&handle)?,
        }
        Ok(result.outcome)
    }

    /// The transport behind `connection` closed.
    pub fn disconnect(&self, player: &str, connection: ConnectionId) -> Result<(), GatewayError> {
        let handle = match self.inner.registry.disconnect(player, connection)? {
            DisconnectOutcome::InMatch(handle) => handle,
            DisconnectOutcome::LeftQueue | DisconnectOutcome::Unknown => return Ok(()),
        };

        let mut game = lock_match(&handle)?;
        let Some(token) = game.mark_disconnected(player, connection) else {
            tracing::debug!(match_id = %game.id(), player = %player, "ignoring stale disconnect");
            return Ok(());
        };
        let match_id = game.id().clone();
        let grace = self.inner.settings.reconnect_grace();
        tracing::info!(
            match_id = %match_id,
            player = %player,
            grace_ms = self.inner.settings.reconnect_grace_ms,
            "player disconnected, forfeit clock started"
        );

        for other in game.humans().filter(|p| p.as_str() != player) {
            self.deliver(
                other,
                ServerEvent::PeerDisconnected {
                    match_id: match_id.clone(),
                    player: player.to_string(),
                    grace_ms: self.inner.settings.reconnect_grace_ms,
                },
            );
        }

        let gateway = self.clone();
        let absent = player.to_string();
        let timer_match = match_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Err(err) = gateway.expire_forfeit(&timer_match, &absent, token) {
                log_timer_failure("forfeit", &timer_match, &err);
            }
        });
        game.attach_forfeit_timer(player, token, task.abort_handle());
        Ok(())
    }

    pub fn lobby(&self) -> Result<LobbySnapshot, GatewayError> {
        let waiting = self.inner.registry.waiting_players()?;
        let mut matches = Vec::new();
        for handle in self.inner.registry.active_matches()? {
            let game = lock_match(&handle)?;
            if game.is_active() {
                matches.push(MatchView::from(&*game));
            }
        }
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(LobbySnapshot { waiting, matches })
    }

    fn schedule_fallback(&self, player: PlayerId, ticket: u64) -> Result<(), GatewayError> {
        let gateway = self.clone();
        let wait = self.inner.settings.queue_wait();
        let waiting = player.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            if let Err(err) = gateway.expire_wait(&waiting, ticket) {
                log_timer_failure("queue fallback", &waiting, &err);
            }
        });
        self.inner
            .registry
            .attach_fallback(&player, ticket, task.abort_handle())?;
        Ok(())
    }

    fn expire_wait(&self, player: &str, ticket: u64) -> Result<(), GatewayError> {
        match self.inner.registry.expire_wait(player, ticket, Utc::now())? {
            Some(handle) => {
                self.announce_start(&handle)?;
            }
            None => tracing::debug!(player = %player, ticket, "queue fallback no longer current"),
        }
        Ok(())
    }

    fn announce_start(&self, handle: &MatchHandle) -> Result<MatchId, GatewayError> {
        let started = {
            let game = lock_match(handle)?;
            tracing::info!(
                match_id = %game.id(),
                player1 = %game.players()[0],
                player2 = %game.players()[1],
                vs_bot = game.is_vs_bot(),
                "match started"
            );
            for player in game.humans() {
                self.deliver(player, self.start_event(&game, player));
            }
            AnalyticsEvent::started(
                game.id().clone(),
                game.players().clone(),
                game.is_vs_bot(),
                game.created_at(),
            )
        };
        let match_id = started.match_id.clone();
        self.publish(started);
        self.schedule_bot_if_needed(handle)?;
        Ok(match_id)
    }

    fn schedule_bot_if_needed(&self, handle: &MatchHandle) -> Result<(), GatewayError> {
        let mut game = lock_match(handle)?;
        let Some(token) = game.arm_bot_timer() else {
            return Ok(());
        };
        let gateway = self.clone();
        let delay = self.inner.settings.bot_think_delay();
        let match_id = game.id().clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = gateway.play_bot_turn(&match_id, token) {
                log_timer_failure("bot move", &match_id, &err);
            }
        });
        game.attach_bot_timer(token, task.abort_handle());
        Ok(())
    }

    fn play_bot_turn(&self, match_id: &str, token: u64) -> Result<(), GatewayError> {
        let handle = match self.inner.registry.get(match_id) {
            Ok(handle) => handle,
            Err(RegistryError::MatchNotFound(_)) => {
                tracing::debug!(match_id = %match_id, "bot move for a retired match");
                return Ok(());
            }
            Err(err) => return Err(err.into()),
        };

        let result = {
            let mut game = lock_match(&handle)?;
            if !game.take_bot_turn(token) {
                tracing::debug!(match_id = %match_id, token, "stale bot move");
                return Ok(());
            }
            let Some(bot) = game.bot().cloned() else {
                return Ok(());
            };
            let Some(column) = ai::next_bot_column(self.inner.bot.as_ref(), &game) else {
                tracing::warn!(match_id = %match_id, "bot found no legal column");
                return Ok(());
            };
            let result = game.play(&bot, column as i64, Utc::now())?;
            tracing::debug!(
                match_id = %match_id,
                strategy = self.inner.bot.name(),
                column,
                "bot moved"
            );
            self.notify_move(&game, &result);
            result
        };

        match result.conclusion {
            Some(conclusion) => self.retire(conclusion),
            None => self.schedule_bot_if_needed(&handle)?,
        }
        Ok(())
    }

    fn expire_forfeit(&self, match_id: &str, absent: &str, token: u64) -> Result<(), GatewayError> {
        let handle = match self.inner.registry.get(match_id) {
            Ok(handle) => handle,
            Err(RegistryError::MatchNotFound(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        let conclusion = {
            let mut game = lock_match(&handle)?;
            let Some(conclusion) = game.forfeit(absent, token, Utc::now()) else {
                tracing::debug!(match_id = %match_id, player = %absent, "forfeit no longer current");
                return Ok(());
            };
            tracing::info!(match_id = %match_id, player = %absent, "player forfeited by absence");
            self.notify_end(&game, &conclusion);
            conclusion
        };
        self.retire(conclusion);
        Ok(())
    }

    fn notify_move(&self, game: &Match, result: &MoveResult) {
        for player in game.humans() {
            self.deliver(
                player,
                ServerEvent::StateUpdated {
                    match_id: game.id().clone(),
                    board: *game.board(),
                    turn: game.turn().clone(),
                    last_move: Some(result.last_move.clone()),
                },
            );
        }
        if let Some(conclusion) = &result.conclusion {
            self.notify_end(game, conclusion);
        }
    }

    fn notify_end(&self, game: &Match, conclusion: &Conclusion) {
        for player in game.humans() {
            self.deliver(
                player,
                ServerEvent::MatchEnded {
                    match_id: conclusion.match_id.clone(),
                    status: conclusion.outcome.status(),
                    winner: conclusion.outcome.winner().cloned(),
                    board: conclusion.board,
                    winning_line: conclusion.winning_line.clone(),
                },
            );
        }
    }

    fn start_event(&self, game: &Match, player: &str) -> ServerEvent {
        let symbol = game
            .symbol_of(player)
            .unwrap_or(connect4_engine::board::Symbol::Red);
        ServerEvent::MatchStarted {
            match_id: game.id().clone(),
            board: *game.board(),
            players: game.players().clone(),
            turn: game.turn().clone(),
            symbol,
            vs_bot: game.is_vs_bot(),
        }
    }

    /// Drop a finished match from the registry, then hand it to the recorder and publisher.
    ///
    /// Must not be called with a match lock held.
    fn retire(&self, conclusion: Conclusion) {
        if let Err(err) = self.inner.registry.remove(&conclusion.match_id) {
            tracing::error!(match_id = %conclusion.match_id, error = %err, "failed to remove finished match");
        }
        tracing::info!(
            match_id = %conclusion.match_id,
            status = ?conclusion.outcome.status(),
            winner = conclusion.outcome.winner().map(String::as_str).unwrap_or("-"),
            duration_ms = conclusion.duration_ms(),
            "match finished"
        );

        let recorder = Arc::clone(&self.inner.recorder);
        let summary = MatchSummary::from(&conclusion);
        tokio::spawn(async move {
            let match_id = summary.match_id.clone();
            if let Err(err) = recorder.record_completed_match(summary).await {
                tracing::warn!(match_id = %match_id, error = %err, "failed to record finished match");
            }
        });
        self.publish(AnalyticsEvent::finished(&conclusion));
    }

    fn publish(&self, event: AnalyticsEvent) {
        let publisher = Arc::clone(&self.inner.publisher);
        tokio::spawn(async move {
            let match_id = event.match_id.clone();
            let kind = event.kind;
            if let Err(err) = publisher.publish(event).await {
                tracing::warn!(match_id = %match_id, kind = ?kind, error = %err, "failed to publish analytics event");
            }
        });
    }

    fn send_queued(&self, player: &str) {
        self.deliver(
            player,
            ServerEvent::Queued {
                username: player.to_string(),
                wait_ms: self.inner.settings.queue_wait_ms,
            },
        );
    }

    fn deliver(&self, player: &str, event: ServerEvent) {
        let kind = event.kind();
        match self.inner.broadcaster.send(&player.to_string(), event) {
            Ok(()) => {}
            Err(BroadcastError::NoSubscriber(_)) => {
                tracing::debug!(player = %player, event = kind, "player not connected, event dropped")
            }
            Err(err) => {
                tracing::warn!(player = %player, event = kind, error = %err, "failed to notify player")
            }
        }
    }
}

fn log_timer_failure(timer: &str, subject: &str, err: &GatewayError) {
    match err.severity() {
        ErrorSeverity::Critical => {
            tracing::error!(timer, subject = %subject, error = %err, "timer failed")
        }
        _ => tracing::warn!(timer, subject = %subject, error = %err, "timer failed"),
    }
}
