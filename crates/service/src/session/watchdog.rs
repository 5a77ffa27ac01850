use super::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Spawns the background task that ages every live session once per
/// second, the sole timeout mechanism in the broker: there are no
/// per-operation timers, only this tick decrementing `hp` until a
/// session's owning task notices it has been cancelled.
pub fn spawn_watchdog(registry: Arc<Registry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            interval.tick().await;
            registry.tick();
        }
    })
}
