#![allow(dead_code)]

use async_trait::async_trait;
use connect4_web::{
    EventBus, EventSubscription, GatewaySettings, InMemoryRecorder, MatchRecorder, MatchSummary,
    MetricsCollector, RecorderError, ServerEvent, SessionGateway,
};
use std::sync::Arc;
use std::time::Duration;

/// Column order that fills the board, Red first, without a line of four.
pub const DRAW_SEQUENCE: [i64; 42] = [
    0, 1, 0, 1, 1, 0, 1, 0, 0, 1, 1, 0, //
    2, 3, 2, 3, 3, 2, 3, 2, 2, 3, 3, 2, //
    4, 5, 4, 5, 5, 4, 6, 4, 6, 6, 5, 6, 4, 4, 6, 5, 5, 6,
];

pub struct Harness {
    pub gateway: SessionGateway,
    pub bus: EventBus,
    pub recorder: Arc<InMemoryRecorder>,
    pub metrics: MetricsCollector,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(GatewaySettings::default())
    }

    pub fn with_settings(settings: GatewaySettings) -> Self {
        let bus = EventBus::new();
        let recorder = Arc::new(InMemoryRecorder::new(settings.bot_identity.clone()));
        let metrics = MetricsCollector::new();
        let gateway = SessionGateway::new(
            settings,
            Arc::new(bus.clone()),
            Arc::clone(&recorder) as Arc<dyn MatchRecorder>,
            Arc::new(metrics.clone()),
        );
        Self {
            gateway,
            bus,
            recorder,
            metrics,
        }
    }

    /// Subscribe `name` and join the queue on a fresh connection.
    pub fn connect(&self, name: &str) -> Client {
        let subscription = self.bus.subscribe(name.to_string());
        let connection = self.gateway.open_connection();
        self.gateway.join(connection, name).expect("join accepted");
        Client {
            name: name.to_string(),
            connection,
            subscription,
        }
    }

    /// Pair two players and return them with the match id, both inboxes drained.
    pub fn pair(&self, first: &str, second: &str) -> (Client, Client, String) {
        let mut a = self.connect(first);
        let mut b = self.connect(second);
        let match_id = match b.drain().pop() {
            Some(ServerEvent::MatchStarted { match_id, .. }) => match_id,
            other => panic!("expected MATCH_STARTED, got {other:?}"),
        };
        a.drain();
        (a, b, match_id)
    }
}

pub struct Client {
    pub name: String,
    pub connection: u64,
    pub subscription: EventSubscription,
}

impl Client {
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.subscription.receiver.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn kinds(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::kind).collect()
    }
}

/// Let spawned collaborator tasks run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub struct FailingRecorder;

#[async_trait]
impl MatchRecorder for FailingRecorder {
    async fn record_completed_match(&self, _summary: MatchSummary) -> Result<(), RecorderError> {
        Err(RecorderError::Unavailable("database offline".into()))
    }
}
