use chrono::{DateTime, Utc};
use connect4_engine::board::{Board, Position, Symbol};
use connect4_engine::errors::MoveError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::task::AbortHandle;

pub type MatchId = String;
pub type PlayerId = String;
pub type ConnectionId = u64;

const SEAT_SYMBOLS: [Symbol; 2] = [Symbol::Red, Symbol::Yellow];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Invalid move: {0}")]
    IllegalMove(#[from] MoveError),
    #[error("Player {0} is not part of this match")]
    NotAParticipant(PlayerId),
    #[error("Match {0} is already over")]
    MatchFinished(MatchId),
    #[error("A match needs two distinct players, got {0} twice")]
    DuplicatePlayer(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMove {
    pub player: PlayerId,
    pub symbol: Symbol,
    pub row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Continue,
    Win { winner: PlayerId },
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndStatus {
    Win,
    Draw,
    Forfeit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Win { winner: PlayerId },
    Draw,
    Forfeit { winner: PlayerId, absent: PlayerId },
}

impl Outcome {
    pub fn status(&self) -> EndStatus {
        match self {
            Outcome::Win { .. } => EndStatus::Win,
            Outcome::Draw => EndStatus::Draw,
            Outcome::Forfeit { .. } => EndStatus::Forfeit,
        }
    }

    pub fn winner(&self) -> Option<&PlayerId> {
        match self {
            Outcome::Win { winner } | Outcome::Forfeit { winner, .. } => Some(winner),
            Outcome::Draw => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchStatus {
    Active,
    Finished(Outcome),
}

/// Everything needed to announce and record a match that has just ended.
///
/// Produced at most once per match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conclusion {
    pub match_id: MatchId,
    pub players: [PlayerId; 2],
    pub outcome: Outcome,
    pub board: Board,
    pub winning_line: Option<Vec<Position>>,
    pub vs_bot: bool,
    pub created_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl Conclusion {
    pub fn duration_ms(&self) -> u64 {
        let elapsed = (self.ended_at - self.created_at).num_milliseconds();
        u64::try_from(elapsed).unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResult {
    pub last_move: LastMove,
    pub outcome: MoveOutcome,
    pub conclusion: Option<Conclusion>,
}

#[derive(Debug)]
struct PendingTimer {
    token: u64,
    handle: Option<AbortHandle>,
}

impl PendingTimer {
    fn cancel(self) {
        if let Some(handle) = self.handle {
            handle.abort();
        }
    }
}

/// One live game between two identities.
///
/// Seat 0 plays [`Symbol::Red`] and opens; seat 1 plays [`Symbol::Yellow`].
/// All mutation goes through `&mut self`; the registry wraps every match in its
/// own mutex, so each method runs inside that match's exclusive section.
#[derive(Debug)]
pub struct Match {
    id: MatchId,
    players: [PlayerId; 2],
    board: Board,
    turn: usize,
    status: MatchStatus,
    bot_seat: Option<usize>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_move: Option<LastMove>,
    connections: HashMap<PlayerId, ConnectionId>,
    forfeit_timers: HashMap<PlayerId, PendingTimer>,
    bot_timer: Option<PendingTimer>,
    next_token: u64,
}

impl Match {
    pub fn new(
        id: MatchId,
        first: PlayerId,
        second: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        Self::build(id, [first, second], None, now)
    }

    /// A match where `human` opens against the automated `bot` identity.
    pub fn against_bot(
        id: MatchId,
        human: PlayerId,
        bot: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        Self::build(id, [human, bot], Some(1), now)
    }

    fn build(
        id: MatchId,
        players: [PlayerId; 2],
        bot_seat: Option<usize>,
        now: DateTime<Utc>,
    ) -> Result<Self, GameError> {
        if players[0] == players[1] {
            return Err(GameError::DuplicatePlayer(players[0].clone()));
        }
        Ok(Self {
            id,
            players,
            board: Board::new(),
            turn: 0,
            status: MatchStatus::Active,
            bot_seat,
            created_at: now,
            updated_at: now,
            last_move: None,
            connections: HashMap::new(),
            forfeit_timers: HashMap::new(),
            bot_timer: None,
            next_token: 0,
        })
    }

    pub fn id(&self) -> &MatchId {
        &self.id
    }

    pub fn players(&self) -> &[PlayerId; 2] {
        &self.players
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Identity currently permitted to move.
    pub fn turn(&self) -> &PlayerId {
        &self.players[self.turn]
    }

    pub fn status(&self) -> &MatchStatus {
        &self.status
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, MatchStatus::Active)
    }

    pub fn is_vs_bot(&self) -> bool {
        self.bot_seat.is_some()
    }

    pub fn bot(&self) -> Option<&PlayerId> {
        self.bot_seat.map(|seat| &self.players[seat])
    }

    pub fn bot_to_move(&self) -> bool {
        self.is_active() && self.bot_seat == Some(self.turn)
    }

    /// Participants that can receive notifications.
    pub fn humans(&self) -> impl Iterator<Item = &PlayerId> + '_ {
        self.players
            .iter()
            .enumerate()
            .filter(move |(seat, _)| Some(*seat) != self.bot_seat)
            .map(|(_, player)| player)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn last_move(&self) -> Option<&LastMove> {
        self.last_move.as_ref()
    }

    pub fn is_participant(&self, player: &str) -> bool {
        self.seat_of(player).is_some()
    }

    pub fn symbol_of(&self, player: &str) -> Option<Symbol> {
        self.seat_of(player).map(|seat| SEAT_SYMBOLS[seat])
    }

    pub fn opponent_of(&self, player: &str) -> Option<&PlayerId> {
        self.seat_of(player).map(|seat| &self.players[1 - seat])
    }

    fn seat_of(&self, player: &str) -> Option<usize> {
        self.players.iter().position(|p| p == player)
    }

    /// Apply `player`'s move in `column`.
    ///
    /// Rejections leave the match untouched. On acceptance the turn passes to
    /// the other seat, then the placed cell is checked for a win before the
    /// board is checked for a draw. A terminal result comes back with its
    /// [`Conclusion`].
    pub fn play(
        &mut self,
        player: &str,
        column: i64,
        now: DateTime<Utc>,
    ) -> Result<MoveResult, GameError> {
        if !self.is_active() {
            return Err(GameError::MatchFinished(self.id.clone()));
        }
        let seat = self
            .seat_of(player)
            .ok_or_else(|| GameError::NotAParticipant(player.to_string()))?;
        if seat != self.turn {
            return Err(GameError::NotYourTurn);
        }

        let column = usize::try_from(column).map_err(|_| MoveError::ColumnOutOfRange { column })?;
        let symbol = SEAT_SYMBOLS[seat];
        let placed = self.board.apply_move(column, symbol)?;

        self.board = placed.board;
        self.turn = 1 - seat;
        self.updated_at = now;
        let last_move = LastMove {
            player: player.to_string(),
            symbol,
            row: placed.row,
            column: placed.column,
        };
        self.last_move = Some(last_move.clone());

        let (outcome, conclusion) = if let Some(line) =
            self.board.winning_line(placed.row, placed.column)
        {
            let winner = player.to_string();
            let conclusion = self.conclude(
                Outcome::Win {
                    winner: winner.clone(),
                },
                Some(line),
                now,
            );
            (MoveOutcome::Win { winner }, conclusion)
        } else if self.board.is_full() {
            (MoveOutcome::Draw, self.conclude(Outcome::Draw, None, now))
        } else {
            (MoveOutcome::Continue, None)
        };

        Ok(MoveResult {
            last_move,
            outcome,
            conclusion,
        })
    }

    pub fn bind_connection(&mut self, player: &str, connection: ConnectionId) {
        if self.is_participant(player) {
            self.connections.insert(player.to_string(), connection);
        }
    }

    pub fn connection_of(&self, player: &str) -> Option<ConnectionId> {
        self.connections.get(player).copied()
    }

    /// Rebind `player` to `connection`. Returns true when a pending forfeit was cancelled.
    pub fn reconnect(&mut self, player: &str, connection: ConnectionId) -> bool {
        self.bind_connection(player, connection);
        match self.forfeit_timers.remove(player) {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Start the forfeit clock for `player` if `connection` is still its bound transport.
    ///
    /// Returns the token the forfeit timer must present when it fires. `None`
    /// means the disconnect is stale or a clock is already running.
    pub fn mark_disconnected(&mut self, player: &str, connection: ConnectionId) -> Option<u64> {
        if !self.is_active() || self.bot().is_some_and(|bot| bot == player) {
            return None;
        }
        if self.connection_of(player) != Some(connection) {
            return None;
        }
        if self.forfeit_timers.contains_key(player) {
            return None;
        }
        let token = self.issue_token();
        self.forfeit_timers.insert(
            player.to_string(),
            PendingTimer {
                token,
                handle: None,
            },
        );
        Some(token)
    }

    pub fn attach_forfeit_timer(&mut self, player: &str, token: u64, handle: AbortHandle) {
        match self.forfeit_timers.get_mut(player) {
            Some(timer) if timer.token == token => timer.handle = Some(handle),
            _ => handle.abort(),
        }
    }

    pub fn is_disconnected(&self, player: &str) -> bool {
        self.forfeit_timers.contains_key(player)
    }

    pub fn disconnected(&self) -> Vec<PlayerId> {
        let mut players: Vec<PlayerId> = self.forfeit_timers.keys().cloned().collect();
        players.sort();
        players
    }

    /// End the match in the opponent's favour if `absent`'s forfeit clock `token` is still current.
    pub fn forfeit(&mut self, absent: &str, token: u64, now: DateTime<Utc>) -> Option<Conclusion> {
        if !self.is_active() {
            return None;
        }
        match self.forfeit_timers.get(absent) {
            Some(timer) if timer.token == token => {}
            _ => return None,
        }
        self.forfeit_timers.remove(absent);
        let winner = self.opponent_of(absent)?.clone();
        self.conclude(
            Outcome::Forfeit {
                winner,
                absent: absent.to_string(),
            },
            None,
            now,
        )
    }

    /// Reserve the bot's next move. `None` unless the bot is on turn and no move is pending.
    pub fn arm_bot_timer(&mut self) -> Option<u64> {
        if !self.bot_to_move() || self.bot_timer.is_some() {
            return None;
        }
        let token = self.issue_token();
        self.bot_timer = Some(PendingTimer {
            token,
            handle: None,
        });
        Some(token)
    }

    pub fn attach_bot_timer(&mut self, token: u64, handle: AbortHandle) {
        match self.bot_timer.as_mut() {
            Some(timer) if timer.token == token => timer.handle = Some(handle),
            _ => handle.abort(),
        }
    }

    /// Consume the pending bot move. False when `token` is stale or the bot is no longer on turn.
    pub fn take_bot_turn(&mut self, token: u64) -> bool {
        match &self.bot_timer {
            Some(timer) if timer.token == token => {
                self.bot_timer = None;
                self.bot_to_move()
            }
            _ => false,
        }
    }

    /// The single terminal transition. Only an active match concludes; later calls yield `None`.
    fn conclude(
        &mut self,
        outcome: Outcome,
        winning_line: Option<Vec<Position>>,
        now: DateTime<Utc>,
    ) -> Option<Conclusion> {
        if !self.is_active() {
            return None;
        }
        self.status = MatchStatus::Finished(outcome.clone());
        self.updated_at = now;
        for (_, timer) in self.forfeit_timers.drain() {
            timer.cancel();
        }
        if let Some(timer) = self.bot_timer.take() {
            timer.cancel();
        }

        Some(Conclusion {
            match_id: self.id.clone(),
            players: self.players.clone(),
            outcome,
            board: self.board,
            winning_line,
            vs_bot: self.is_vs_bot(),
            created_at: self.created_at,
            ended_at: now,
        })
    }

    fn issue_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}
