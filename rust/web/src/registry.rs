use crate::game::{ConnectionId, GameError, Match, MatchId, PlayerId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use thiserror::Error;
use tokio::task::AbortHandle;
use uuid::Uuid;

pub type MatchHandle = Arc<Mutex<Match>>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),
    #[error("Username must not be empty")]
    EmptyIdentity,
    #[error("Username {0} is reserved")]
    ReservedIdentity(PlayerId),
    #[error("Match storage poisoned")]
    StoragePoisoned,
    #[error(transparent)]
    Game(#[from] GameError),
}

impl crate::errors::IntoErrorResponse for RegistryError {
    fn status_code(&self) -> warp::http::StatusCode {
        use warp::http::StatusCode;
        match self {
            RegistryError::MatchNotFound(_) => StatusCode::NOT_FOUND,
            RegistryError::EmptyIdentity | RegistryError::ReservedIdentity(_) => {
                StatusCode::BAD_REQUEST
            }
            RegistryError::StoragePoisoned => StatusCode::INTERNAL_SERVER_ERROR,
            RegistryError::Game(GameError::NotYourTurn) => StatusCode::CONFLICT,
            RegistryError::Game(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            RegistryError::MatchNotFound(_) => "match_not_found",
            RegistryError::EmptyIdentity => "empty_username",
            RegistryError::ReservedIdentity(_) => "reserved_username",
            RegistryError::StoragePoisoned => "match_storage_error",
            RegistryError::Game(err) => game_error_code(err),
        }
    }

    fn error_message(&self) -> String {
        self.to_string()
    }

    fn severity(&self) -> crate::errors::ErrorSeverity {
        use crate::errors::ErrorSeverity;
        match self {
            RegistryError::StoragePoisoned => ErrorSeverity::Critical,
            _ => ErrorSeverity::Client,
        }
    }
}

pub(crate) fn game_error_code(err: &GameError) -> &'static str {
    match err {
        GameError::NotYourTurn => "not_your_turn",
        GameError::IllegalMove(_) => "invalid_move",
        GameError::NotAParticipant(_) => "not_a_participant",
        GameError::MatchFinished(_) => "match_finished",
        GameError::DuplicatePlayer(_) => "duplicate_player",
    }
}

/// Lock one match, surfacing a poisoned mutex as an error.
pub fn lock_match(handle: &MatchHandle) -> Result<MutexGuard<'_, Match>, RegistryError> {
    handle.lock().map_err(|_| RegistryError::StoragePoisoned)
}

#[derive(Debug)]
pub enum JoinOutcome {
    /// Placed at the back of the queue; `ticket` identifies this wait.
    Queued { ticket: u64 },
    /// Already waiting; the connection binding was refreshed.
    AlreadyQueued,
    /// Paired with the player at the front of the queue, who opens.
    Paired(MatchHandle),
    /// Rebound to a match still in progress.
    Reconnected {
        handle: MatchHandle,
        forfeit_canceled: bool,
    },
}

#[derive(Debug)]
pub enum DisconnectOutcome {
    LeftQueue,
    InMatch(MatchHandle),
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WaitingPlayer {
    pub player: PlayerId,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug)]
struct WaitingEntry {
    player: PlayerId,
    connection: ConnectionId,
    joined_at: DateTime<Utc>,
    ticket: u64,
    fallback: Option<AbortHandle>,
}

impl WaitingEntry {
    fn cancel_fallback(&mut self) {
        if let Some(handle) = self.fallback.take() {
            handle.abort();
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    waiting: VecDeque<WaitingEntry>,
    matches: HashMap<MatchId, MatchHandle>,
    by_player: HashMap<PlayerId, MatchId>,
    next_ticket: u64,
}

/// Waiting queue plus every live match, behind one lock.
///
/// Lock order is registry, then match. Nothing here is called while a match
/// lock is held.
#[derive(Debug)]
pub struct MatchRegistry {
    state: RwLock<RegistryState>,
    bot_identity: PlayerId,
}

impl MatchRegistry {
    pub fn new(bot_identity: impl Into<PlayerId>) -> Self {
        Self {
            state: RwLock::new(RegistryState::default()),
            bot_identity: bot_identity.into(),
        }
    }

    pub fn bot_identity(&self) -> &PlayerId {
        &self.bot_identity
    }

    pub fn join(
        &self,
        player: &str,
        connection: ConnectionId,
        now: DateTime<Utc>,
    ) -> Result<JoinOutcome, RegistryError> {
        let player = player.trim();
        if player.is_empty() {
            return Err(RegistryError::EmptyIdentity);
        }
        if player == self.bot_identity {
            return Err(RegistryError::ReservedIdentity(player.to_string()));
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;

        if let Some(match_id) = state.by_player.get(player).cloned() {
            if let Some(handle) = state.matches.get(&match_id).cloned() {
                let mut game = lock_match(&handle)?;
                if game.is_active() {
                    let forfeit_canceled = game.reconnect(player, connection);
                    drop(game);
                    tracing::info!(
                        match_id = %match_id,
                        player = %player,
                        forfeit_canceled,
                        "player rejoined live match"
                    );
                    return Ok(JoinOutcome::Reconnected {
                        handle,
                        forfeit_canceled,
                    });
                }
            }
            tracing::debug!(match_id = %match_id, player = %player, "dropping stale match index");
            state.by_player.remove(player);
        }

        if let Some(entry) = state.waiting.iter_mut().find(|entry| entry.player == player) {
            entry.connection = connection;
            return Ok(JoinOutcome::AlreadyQueued);
        }

        if let Some(mut opener) = state.waiting.pop_front() {
            opener.cancel_fallback();
            let mut game = Match::new(
                Uuid::new_v4().to_string(),
                opener.player.clone(),
                player.to_string(),
                now,
            )?;
            game.bind_connection(&opener.player, opener.connection);
            game.bind_connection(player, connection);
            let match_id = game.id().clone();
            let handle = Arc::new(Mutex::new(game));

            state.matches.insert(match_id.clone(), Arc::clone(&handle));
            state.by_player.insert(opener.player.clone(), match_id.clone());
            state.by_player.insert(player.to_string(), match_id.clone());

            tracing::info!(
                match_id = %match_id,
                player1 = %opener.player,
                player2 = %player,
                "paired players from queue"
            );
            return Ok(JoinOutcome::Paired(handle));
        }

        state.next_ticket += 1;
        let ticket = state.next_ticket;
        state.waiting.push_back(WaitingEntry {
            player: player.to_string(),
            connection,
            joined_at: now,
            ticket,
            fallback: None,
        });
        tracing::debug!(player = %player, ticket, "player queued");
        Ok(JoinOutcome::Queued { ticket })
    }

    /// Store the abort handle of `player`'s bot-fallback timer. Aborts it if the wait already ended.
    pub fn attach_fallback(
        &self,
        player: &str,
        ticket: u64,
        handle: AbortHandle,
    ) -> Result<(), RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        match state
            .waiting
            .iter_mut()
            .find(|entry| entry.player == player && entry.ticket == ticket)
        {
            Some(entry) => entry.fallback = Some(handle),
            None => handle.abort(),
        }
        Ok(())
    }

    /// Turn a wait that ran out into a bot match, provided `ticket` still identifies it.
    pub fn expire_wait(
        &self,
        player: &str,
        ticket: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<MatchHandle>, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let Some(index) = state
            .waiting
            .iter()
            .position(|entry| entry.player == player && entry.ticket == ticket)
        else {
            return Ok(None);
        };
        let Some(entry) = state.waiting.remove(index) else {
            return Ok(None);
        };

        let mut game = Match::against_bot(
            Uuid::new_v4().to_string(),
            entry.player.clone(),
            self.bot_identity.clone(),
            now,
        )?;
        game.bind_connection(&entry.player, entry.connection);
        let match_id = game.id().clone();
        let handle = Arc::new(Mutex::new(game));

        state.matches.insert(match_id.clone(), Arc::clone(&handle));
        state.by_player.insert(entry.player.clone(), match_id.clone());

        tracing::info!(match_id = %match_id, player = %entry.player, "queue wait expired, starting bot match");
        Ok(Some(handle))
    }

    pub fn disconnect(
        &self,
        player: &str,
        connection: ConnectionId,
    ) -> Result<DisconnectOutcome, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;

        if let Some(index) = state.waiting.iter().position(|entry| entry.player == player) {
            if state.waiting[index].connection != connection {
                return Ok(DisconnectOutcome::Unknown);
            }
            if let Some(mut entry) = state.waiting.remove(index) {
                entry.cancel_fallback();
            }
            tracing::debug!(player = %player, "player left the queue");
            return Ok(DisconnectOutcome::LeftQueue);
        }

        let handle = state
            .by_player
            .get(player)
            .and_then(|match_id| state.matches.get(match_id))
            .cloned();
        Ok(match handle {
            Some(handle) => DisconnectOutcome::InMatch(handle),
            None => DisconnectOutcome::Unknown,
        })
    }

    pub fn get(&self, match_id: &str) -> Result<MatchHandle, RegistryError> {
        let state = self
            .state
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        state
            .matches
            .get(match_id)
            .cloned()
            .ok_or_else(|| RegistryError::MatchNotFound(match_id.to_string()))
    }

    pub fn match_of(&self, player: &str) -> Result<Option<MatchHandle>, RegistryError> {
        let state = self
            .state
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(state
            .by_player
            .get(player)
            .and_then(|match_id| state.matches.get(match_id))
            .cloned())
    }

    /// Drop a match and every index entry pointing at it.
    pub fn remove(&self, match_id: &str) -> Result<Option<MatchHandle>, RegistryError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        let removed = state.matches.remove(match_id);
        state.by_player.retain(|_, indexed| indexed != match_id);
        if removed.is_some() {
            tracing::debug!(match_id = %match_id, "match removed from registry");
        }
        Ok(removed)
    }

    pub fn active_matches(&self) -> Result<Vec<MatchHandle>, RegistryError> {
        let state = self
            .state
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(state.matches.values().cloned().collect())
    }

    pub fn waiting_players(&self) -> Result<Vec<WaitingPlayer>, RegistryError> {
        let state = self
            .state
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(state
            .waiting
            .iter()
            .map(|entry| WaitingPlayer {
                player: entry.player.clone(),
                joined_at: entry.joined_at,
            })
            .collect())
    }

    pub fn match_count(&self) -> Result<usize, RegistryError> {
        let state = self
            .state
            .read()
            .map_err(|_| RegistryError::StoragePoisoned)?;
        Ok(state.matches.len())
    }
}
