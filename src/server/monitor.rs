use parking_lot::Mutex;
use serde::Serialize;
use service::Registry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Sender};
use tokio::task::JoinHandle;

const REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Bound on the event channel; a full channel just drops the sample
/// rather than block the session task that's trying to record it.
const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub enum Event {
    Login,
    Connect,
    Disconnect,
    BytesRelayed(u64),
}

/// Process-wide counters, aggregated from the event channel by a
/// single background task.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub logins: u64,
    pub connects: u64,
    pub disconnects: u64,
    pub bytes_relayed: u64,
}

impl Stats {
    fn apply(&mut self, event: Event) {
        match event {
            Event::Login => self.logins += 1,
            Event::Connect => self.connects += 1,
            Event::Disconnect => self.disconnects += 1,
            Event::BytesRelayed(n) => self.bytes_relayed += n,
        }
    }
}

/// Process-wide counters, logged periodically by
/// [`Monitor::spawn_reporter`]. Never affects control flow; purely
/// observational.
///
/// Every [`Monitor::record`] call is a non-blocking channel send; a
/// single background task owns the actual [`Stats`] and applies events
/// to it in order, so callers never contend on a lock.
pub struct Monitor {
    stats: Arc<Mutex<Stats>>,
    sender: Sender<Event>,
}

impl Monitor {
    pub fn new() -> Arc<Self> {
        let (sender, mut receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let stats: Arc<Mutex<Stats>> = Default::default();

        let stats_for_task = stats.clone();
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                stats_for_task.lock().apply(event);
            }
        });

        Arc::new(Self { stats, sender })
    }

    pub fn record(&self, event: Event) {
        let _ = self.sender.try_send(event);
    }

    pub fn snapshot(&self) -> Stats {
        *self.stats.lock()
    }

    pub fn spawn_reporter(self: &Arc<Self>, registry: Arc<Registry>) -> JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REPORT_INTERVAL);
            loop {
                interval.tick().await;
                let stats = this.snapshot();
                log::info!(
                    "live_sessions={} logins={} connects={} disconnects={} bytes_relayed={}",
                    registry.len(),
                    stats.logins,
                    stats.connects,
                    stats.disconnects,
                    stats.bytes_relayed,
                );
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_are_aggregated_in_order() {
        let monitor = Monitor::new();
        monitor.record(Event::Login);
        monitor.record(Event::Connect);
        monitor.record(Event::BytesRelayed(100));
        monitor.record(Event::Disconnect);

        // the aggregator task is a separate tokio task; yield until it
        // has drained the channel.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let stats = monitor.snapshot();
        assert_eq!(stats.logins, 1);
        assert_eq!(stats.connects, 1);
        assert_eq!(stats.disconnects, 1);
        assert_eq!(stats.bytes_relayed, 100);
    }
}
