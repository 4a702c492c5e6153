use std::sync::Arc;

use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info};

use crate::state::AppState;

/// Periodically drops expired local holds and finished or idle sessions.
pub async fn run_housekeeping(state: Arc<AppState>, every: Duration) {
    info!(every_secs = every.as_secs(), "housekeeping started");

    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let holds = state.service.purge_expired_holds();
        let sessions =
            state.prune_sessions(Utc::now(), state.service.config().local_hold_ttl);

        debug!(holds, sessions, "housekeeping pass finished");
    }
}
