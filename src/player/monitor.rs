use std::sync::Arc;

use tracing::debug;

use crate::player::PlayerManager;

/// Periodic idle sweep: disconnect sessions whose voice channel has been
/// empty of listeners for the configured threshold.
///
/// Runs for the process lifetime; each tick re-checks elapsed wall-clock
/// time, so a delayed tick cannot postpone a due disconnect.
pub async fn run(manager: Arc<PlayerManager>) {
    let period = manager.idle_sweep_period();
    debug!("Idle monitor running every {:?}", period);

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        manager.sweep_idle().await;
    }
}
