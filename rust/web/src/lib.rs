//! # connect4_web: live Connect Four matches over WebSockets
//!
//! Matchmaking, the per-match state machine, disconnect handling and the bot
//! fallback, plus the thin warp surface that exposes them.
//!
//! - [`game`] - one match: board, turn, timers, terminal guard
//! - [`registry`] - waiting queue and live matches behind one lock
//! - [`gateway`] - connection events in, notifications and records out
//! - [`events`] - wire protocol and the in-process [`EventBus`]
//! - [`recorder`], [`analytics`], [`metrics`] - end-of-match collaborators
//! - [`server`], [`handlers`] - HTTP and WebSocket routes

pub mod ai;
pub mod analytics;
pub mod errors;
pub mod events;
pub mod game;
pub mod gateway;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod recorder;
pub mod registry;
pub mod server;
pub mod settings;

pub use ai::{create_bot, BotStrategy};
pub use analytics::{AnalyticsEvent, AnalyticsEventKind, EventPublisher, PublishError};
pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use events::{
    BroadcastError, Broadcaster, ClientEvent, EventBus, EventSubscription, ServerEvent,
};
pub use game::{
    Conclusion, ConnectionId, EndStatus, GameError, LastMove, Match, MatchId, MatchStatus,
    MoveOutcome, Outcome, PlayerId,
};
pub use gateway::{GatewayError, JoinReply, LobbySnapshot, MatchView, SessionGateway};
pub use logging::{init_logging, LogCapture, LogEntry, LogFormat};
pub use metrics::{MetricsCollector, MetricsSnapshot};
pub use recorder::{InMemoryRecorder, MatchRecorder, MatchSummary, PlayerStanding, RecorderError};
pub use registry::{DisconnectOutcome, JoinOutcome, MatchHandle, MatchRegistry, RegistryError};
pub use server::{AppContext, ServerConfig, ServerError, ServerHandle, WebServer};
pub use settings::{GatewaySettings, SettingsError};
