use crate::analytics::{AnalyticsEvent, AnalyticsEventKind, EventPublisher, PublishError};
use crate::game::PlayerId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Aggregates the analytics stream into in-memory counters.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    matches_started: AtomicU64,
    matches_completed: AtomicU64,
    matches_forfeited: AtomicU64,
    bot_matches: AtomicU64,
    live_matches: AtomicU64,
    total_duration_ms: AtomicU64,
    tallies: Mutex<Tallies>,
}

#[derive(Debug, Default)]
struct Tallies {
    winners: HashMap<PlayerId, u64>,
    per_day: BTreeMap<String, u64>,
    per_hour: BTreeMap<String, u64>,
}

/// UTC bucket keys for a finish timestamp: `YYYY-MM-DD` and `YYYY-MM-DDTHH`.
fn day_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d").to_string()
}

fn hour_key(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H").to_string()
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub fn record(&self, event: &AnalyticsEvent) -> Result<(), PublishError> {
        match event.kind {
            AnalyticsEventKind::MatchStarted => {
                self.inner.matches_started.fetch_add(1, Ordering::Relaxed);
                if event.vs_bot {
                    self.inner.bot_matches.fetch_add(1, Ordering::Relaxed);
                }
                let live = self.inner.live_matches.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::trace!(live_matches = live, "match started");
            }
            AnalyticsEventKind::MatchCompleted | AnalyticsEventKind::MatchForfeited => {
                let counter = if event.kind == AnalyticsEventKind::MatchForfeited {
                    &self.inner.matches_forfeited
                } else {
                    &self.inner.matches_completed
                };
                counter.fetch_add(1, Ordering::Relaxed);
                self.inner
                    .total_duration_ms
                    .fetch_add(event.duration_ms.unwrap_or(0), Ordering::Relaxed);
                self.decrement_live_matches();

                let mut tallies = self
                    .inner
                    .tallies
                    .lock()
                    .map_err(|_| PublishError::Poisoned)?;
                *tallies.per_day.entry(day_key(event.timestamp)).or_insert(0) += 1;
                *tallies.per_hour.entry(hour_key(event.timestamp)).or_insert(0) += 1;
                if let Some(winner) = &event.winner {
                    *tallies.winners.entry(winner.clone()).or_insert(0) += 1;
                }
            }
        }
        Ok(())
    }

    fn decrement_live_matches(&self) {
        let mut current = self.inner.live_matches.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                tracing::warn!("match finished without a recorded start");
                return;
            }
            match self.inner.live_matches.compare_exchange(
                current,
                current - 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (winner_counts, games_per_day, games_per_hour) = self
            .inner
            .tallies
            .lock()
            .map(|tallies| {
                (
                    tallies.winners.clone(),
                    tallies.per_day.clone(),
                    tallies.per_hour.clone(),
                )
            })
            .unwrap_or_default();
        MetricsSnapshot {
            matches_started: self.inner.matches_started.load(Ordering::Relaxed),
            matches_completed: self.inner.matches_completed.load(Ordering::Relaxed),
            matches_forfeited: self.inner.matches_forfeited.load(Ordering::Relaxed),
            bot_matches: self.inner.bot_matches.load(Ordering::Relaxed),
            live_matches: self.inner.live_matches.load(Ordering::Relaxed),
            total_duration_ms: self.inner.total_duration_ms.load(Ordering::Relaxed),
            winner_counts,
            games_per_day,
            games_per_hour,
        }
    }

    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        tracing::info!(
            matches_started = snapshot.matches_started,
            matches_completed = snapshot.matches_completed,
            matches_forfeited = snapshot.matches_forfeited,
            bot_matches = snapshot.bot_matches,
            live_matches = snapshot.live_matches,
            avg_duration_ms = snapshot.average_duration_ms(),
            games_today = snapshot.games_on(Utc::now()),
            "match metrics"
        );
    }
}

#[async_trait]
impl EventPublisher for MetricsCollector {
    async fn publish(&self, event: AnalyticsEvent) -> Result<(), PublishError> {
        self.record(&event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub matches_started: u64,
    pub matches_completed: u64,
    pub matches_forfeited: u64,
    pub bot_matches: u64,
    pub live_matches: u64,
    pub total_duration_ms: u64,
    pub winner_counts: HashMap<PlayerId, u64>,
    /// Finished matches per UTC day.
    pub games_per_day: BTreeMap<String, u64>,
    /// Finished matches per UTC hour.
    pub games_per_hour: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn finished(&self) -> u64 {
        self.matches_completed + self.matches_forfeited
    }

    pub fn average_duration_ms(&self) -> u64 {
        match self.finished() {
            0 => 0,
            finished => self.total_duration_ms / finished,
        }
    }

    /// Matches finished on the UTC day containing `timestamp`.
    pub fn games_on(&self, timestamp: DateTime<Utc>) -> u64 {
        self.games_per_day
            .get(&day_key(timestamp))
            .copied()
            .unwrap_or(0)
    }
}
