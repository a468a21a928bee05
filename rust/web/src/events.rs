use crate::game::{EndStatus, LastMove, MatchId, PlayerId};
use connect4_engine::board::{Board, Position, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::mpsc;

// Bounded so a stalled socket cannot grow memory without limit; a full
// channel gets the subscriber pruned.
const EVENT_CHANNEL_BUFFER: usize = 256;

pub type EventSender = mpsc::Sender<ServerEvent>;
pub type EventReceiver = mpsc::Receiver<ServerEvent>;

/// Messages a client sends over its connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientEvent {
    JoinQueue {
        username: String,
    },
    Move {
        #[serde(alias = "matchId")]
        match_id: MatchId,
        column: i64,
    },
}

/// Messages the server pushes to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    Queued {
        username: PlayerId,
        wait_ms: u64,
    },
    MatchStarted {
        match_id: MatchId,
        board: Board,
        players: [PlayerId; 2],
        turn: PlayerId,
        /// Symbol assigned to the recipient.
        symbol: Symbol,
        vs_bot: bool,
    },
    StateUpdated {
        match_id: MatchId,
        board: Board,
        turn: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_move: Option<LastMove>,
    },
    MatchEnded {
        match_id: MatchId,
        status: EndStatus,
        winner: Option<PlayerId>,
        board: Board,
        winning_line: Option<Vec<Position>>,
    },
    PeerDisconnected {
        match_id: MatchId,
        player: PlayerId,
        grace_ms: u64,
    },
    PeerReconnected {
        match_id: MatchId,
        player: PlayerId,
    },
    Error {
        code: String,
        message: String,
    },
}

impl ServerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Queued { .. } => "QUEUED",
            ServerEvent::MatchStarted { .. } => "MATCH_STARTED",
            ServerEvent::StateUpdated { .. } => "STATE_UPDATED",
            ServerEvent::MatchEnded { .. } => "MATCH_ENDED",
            ServerEvent::PeerDisconnected { .. } => "PEER_DISCONNECTED",
            ServerEvent::PeerReconnected { .. } => "PEER_RECONNECTED",
            ServerEvent::Error { .. } => "ERROR",
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerEvent::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BroadcastError {
    #[error("No live connection for player {0}")]
    NoSubscriber(PlayerId),
    #[error("Subscriber registry poisoned")]
    Poisoned,
}

/// Delivers server events to whoever is currently connected as a player.
pub trait Broadcaster: Send + Sync {
    fn send(&self, player: &PlayerId, event: ServerEvent) -> Result<(), BroadcastError>;
}

pub struct EventSubscription {
    bus: EventBus,
    player: PlayerId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn player(&self) -> &PlayerId {
        &self.player
    }

    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.player, self.subscriber_id);
    }
}

/// In-process [`Broadcaster`]: per-player lists of bounded channels.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<HashMap<PlayerId, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, player: PlayerId) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(player.clone());
        EventSubscription {
            bus: self.clone(),
            player,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, player: PlayerId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(player.clone()).or_default().push((id, tx));

        tracing::debug!(player = %player, subscriber_id = id, "connection subscribed to player events");

        (id, rx)
    }

    pub fn unsubscribe(&self, player: &PlayerId, subscriber_id: usize) {
        self.remove_subscribers(player, &[subscriber_id]);
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.values().map(|list| list.len()).sum()
    }

    pub fn is_connected(&self, player: &PlayerId) -> bool {
        let guard = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(player).is_some_and(|list| !list.is_empty())
    }

    fn remove_subscribers(&self, player: &PlayerId, ids: &[usize]) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = guard.get_mut(player) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(player);
            }
        }
    }
}

impl Broadcaster for EventBus {
    fn send(&self, player: &PlayerId, event: ServerEvent) -> Result<(), BroadcastError> {
        tracing::debug!(player = %player, event = event.kind(), "sending player event");

        let subscribers = {
            let guard = self
                .inner
                .subscribers
                .read()
                .map_err(|_| BroadcastError::Poisoned)?;
            guard.get(player).cloned()
        };
        let Some(list) = subscribers else {
            return Err(BroadcastError::NoSubscriber(player.clone()));
        };

        let mut failed = Vec::new();
        for (id, sender) in &list {
            // try_send: a slow subscriber never blocks the match that is notifying.
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    player = %player,
                    subscriber_id = id,
                    error = %e,
                    "dropping subscriber that cannot take events"
                );
                failed.push(*id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(player, &failed);
        }
        if failed.len() == list.len() {
            return Err(BroadcastError::NoSubscriber(player.clone()));
        }
        Ok(())
    }
}
