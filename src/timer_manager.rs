//! Periodic timer scheduling with graceful shutdown.
//!
//! Each registered timer runs as its own task on an independent interval;
//! firings of different timers may overlap, but a single timer's callback
//! always runs to completion before its next firing is processed. Shutdown
//! cancels every timer and joins the tasks, so no callback is in flight once
//! [`TimerManager::shutdown_all`] returns.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

pub struct TimerManager {
    timers: HashMap<String, TimerInfo>,
    global_token: CancellationToken,
}

struct TimerInfo {
    handle: JoinHandle<()>,
    #[allow(dead_code)] // Retained for selective cancellation later
    cancel_token: CancellationToken,
}

impl TimerManager {
    pub fn new() -> Self {
        Self {
            timers: HashMap::new(),
            global_token: CancellationToken::new(),
        }
    }

    /// Registers and starts a named periodic timer.
    ///
    /// The callback is awaited on every tick; an `Err` is logged and the
    /// timer keeps running. Failures never escape the timer task.
    pub fn register_timer<F, Fut>(&mut self, name: &str, interval: Duration, mut tick_fn: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let token = self.global_token.child_token();
        let task_token = token.clone();
        let timer_name = name.to_string();

        let handle = tokio::spawn(async move {
            info!("Timer '{timer_name}' started, interval {interval:?}");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = task_token.cancelled() => {
                        info!("Timer '{timer_name}' cancelled");
                        break;
                    }
                    _instant = ticker.tick() => {
                        if let Err(e) = tick_fn().await {
                            error!("Timer '{timer_name}' callback failed: {e:#}");
                        }
                    }
                }
            }
        });

        self.timers.insert(
            name.to_string(),
            TimerInfo {
                handle,
                cancel_token: token,
            },
        );
    }

    /// Stops every timer and waits for in-progress callbacks to finish.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping all {} timers", self.timers.len());
        self.global_token.cancel();

        let mut first_error = None;
        let handles: Vec<_> = self.timers.drain().map(|(_, info)| info.handle).collect();
        for handle in handles {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    let error = anyhow::anyhow!("Timer task panicked: {e}");
                    error!("{error}");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
                Err(_) => {
                    let error = anyhow::anyhow!("Timer shutdown timeout exceeded");
                    warn!("{error}");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error).context("One or more timers failed during shutdown"),
            None => {
                info!("All timers stopped");
                Ok(())
            }
        }
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    #[cfg(test)]
    pub fn is_running(&self, name: &str) -> bool {
        self.timers.contains_key(name)
    }
}

impl Default for TimerManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::sleep;

    #[tokio::test]
    async fn timer_fires_periodically() {
        let mut manager = TimerManager::new();
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();

        manager.register_timer("test", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        sleep(Duration::from_millis(100)).await;
        manager.shutdown_all().await.unwrap();
        assert!(ticks.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn callback_error_does_not_stop_timer() {
        let mut manager = TimerManager::new();
        let ticks = Arc::new(AtomicU32::new(0));
        let counter = ticks.clone();

        manager.register_timer("flaky", Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("tick failure")
            }
        });

        sleep(Duration::from_millis(80)).await;
        assert!(manager.is_running("flaky"));
        manager.shutdown_all().await.unwrap();
        assert!(ticks.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn same_timer_never_overlaps_itself() {
        let mut manager = TimerManager::new();
        let in_flight = Arc::new(AtomicU32::new(0));
        let overlap_seen = Arc::new(AtomicU32::new(0));
        let (in_flight_c, overlap_c) = (in_flight.clone(), overlap_seen.clone());

        manager.register_timer("slow", Duration::from_millis(5), move || {
            let in_flight = in_flight_c.clone();
            let overlap = overlap_c.clone();
            async move {
                if in_flight.fetch_add(1, Ordering::SeqCst) > 0 {
                    overlap.fetch_add(1, Ordering::SeqCst);
                }
                sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
        });

        sleep(Duration::from_millis(120)).await;
        manager.shutdown_all().await.unwrap();
        assert_eq!(overlap_seen.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_progress_callback() {
        let mut manager = TimerManager::new();
        let finished = Arc::new(AtomicU32::new(0));
        let finished_c = finished.clone();

        manager.register_timer("long", Duration::from_millis(1), move || {
            let finished = finished_c.clone();
            async move {
                sleep(Duration::from_millis(50)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        // Let the first callback start, then shut down.
        sleep(Duration::from_millis(10)).await;
        manager.shutdown_all().await.unwrap();
        assert_eq!(manager.active_count(), 0);
        assert!(finished.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn independent_timers_run_concurrently() {
        let mut manager = TimerManager::new();
        let fast_ticks = Arc::new(AtomicU32::new(0));
        let fast_c = fast_ticks.clone();

        manager.register_timer("blocked", Duration::from_millis(5), move || async move {
            sleep(Duration::from_millis(200)).await;
            Ok(())
        });
        manager.register_timer("fast", Duration::from_millis(5), move || {
            let fast = fast_c.clone();
            async move {
                fast.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        sleep(Duration::from_millis(80)).await;
        // A stalled timer must not prevent the other from firing.
        assert!(fast_ticks.load(Ordering::SeqCst) >= 5);
        let _ = manager.shutdown_all().await;
    }
}
