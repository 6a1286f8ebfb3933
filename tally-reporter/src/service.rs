use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::reporter::Reporter;

/// The shortest supported reporting interval.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl Reporter {
    /// Starts reporting in the background, once per configured interval.
    ///
    /// The first cycle runs one interval after the start. Each cycle runs on the blocking thread
    /// pool, since senders perform blocking I/O, and the task waits for it before the next tick,
    /// so cycles never overlap. Dropping the returned handle ends the task without closing the
    /// sender.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a tokio runtime.
    pub fn start(self) -> ReporterHandle {
        let reporter = Arc::new(self);
        let period = reporter.config().interval().max(MIN_INTERVAL);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = Arc::clone(&reporter);
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tally_log::info!(interval = ?period, "metrics reporter started");

            loop {
                tokio::select! {
                    biased;

                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        let cycle = Arc::clone(&task);
                        let result = tokio::task::spawn_blocking(move || cycle.report()).await;
                        if let Err(error) = result {
                            tally_log::error!(
                                error = &error as &dyn std::error::Error,
                                "metrics reporting cycle failed"
                            );
                        }
                    }
                }
            }

            tally_log::info!("metrics reporter shutting down");
        });

        ReporterHandle {
            reporter,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

/// A handle to a [`Reporter`] running in the background.
///
/// Use [`stop`](Self::stop) to end reporting and close the sender.
#[derive(Debug)]
pub struct ReporterHandle {
    reporter: Arc<Reporter>,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl ReporterHandle {
    /// Returns the running reporter.
    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Stops the background task, waits for a running cycle to finish, and closes the sender.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            shutdown.send(()).ok();
        }

        if let Some(join) = self.join.take() {
            if let Err(error) = join.await {
                tally_log::error!(
                    error = &error as &dyn std::error::Error,
                    "metrics reporter task failed"
                );
            }
        }

        self.reporter.stop();
    }
}

#[cfg(test)]
mod tests {
    use tally_common::ManualClock;
    use tally_metrics::Registry;

    use super::*;
    use crate::config::ReporterConfig;
    use crate::reporter::ReporterState;
    use crate::testutils::CapturingSender;

    fn start(interval: Duration) -> (Arc<Registry>, Arc<CapturingSender>, ReporterHandle) {
        tally_log::init_test!();

        let clock = Arc::new(ManualClock::at_millis(1_700_000_040_000));
        let registry = Arc::new(Registry::with_clock(clock.clone()));
        let sender = Arc::new(CapturingSender::new());
        let config = ReporterConfig::builder()
            .interval(interval)
            .clock(clock)
            .build();

        let handle = Reporter::new(registry.clone(), sender.clone(), config).start();
        (registry, sender, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reports_every_interval() {
        let (registry, sender, handle) = start(Duration::from_secs(60));
        registry.counter("requests").unwrap().inc();

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(sender.points().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sender.names(), vec!["requests.count"]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sender.points().len(), 2);

        handle.stop().await;
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_cycles_run_off_the_runtime_thread() {
        let (registry, sender, handle) = start(Duration::from_secs(1));
        registry.counter("requests").unwrap();

        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.stop().await;

        assert_eq!(sender.names(), vec!["requests.count"]);
        let threads = sender.send_threads();
        assert_eq!(threads.len(), 1);
        assert!(!threads.contains(&std::thread::current().id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop() {
        let (registry, sender, handle) = start(Duration::from_secs(60));
        registry.counter("requests").unwrap();
        let reporter = Arc::clone(handle.reporter());

        handle.stop().await;
        assert_eq!(reporter.state(), ReporterState::Stopped);
        assert_eq!(sender.close_count(), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(sender.points().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_handle_ends_task() {
        let (registry, sender, handle) = start(Duration::from_secs(10));
        registry.counter("requests").unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(sender.points().is_empty());
        assert_eq!(sender.close_count(), 0);
    }
}
