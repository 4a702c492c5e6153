use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::conversion::OrderConversionService;
use crate::engine::session::{OrderSession, OrderState};
use crate::observability::metrics::Metrics;

pub type SharedSession = Arc<Mutex<OrderSession>>;

pub struct AppState {
    pub service: OrderConversionService,
    pub sessions: DashMap<Uuid, SharedSession>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(service: OrderConversionService, metrics: Metrics) -> Self {
        Self {
            service,
            sessions: DashMap::new(),
            metrics,
        }
    }

    pub fn insert_session(&self, session: OrderSession) -> SharedSession {
        let id = session.id;
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id, shared.clone());
        shared
    }

    pub fn session(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Forgets sessions that were committed or abandoned, or that saw no transition for longer
    /// than `max_idle`. Sessions busy with a request are kept.
    pub fn prune_sessions(&self, now: DateTime<Utc>, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, shared| match shared.try_lock() {
            Ok(session) => {
                let finished = matches!(
                    session.state(),
                    OrderState::Committed | OrderState::Abandoned
                );
                !finished && now.signed_duration_since(session.touched_at()) < max_idle
            }
            Err(_) => true,
        });
        before.saturating_sub(self.sessions.len())
    }
}
