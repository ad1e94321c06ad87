//! Background maintenance tasks: the active-expiry sweeper and the defrag
//! pass, both driven by an adaptive interval against the sharded
//! [`KeyspaceEngine`].
//!
//! ## Why Do We Need This?
//!
//! Lazy expiry (checking on access) is efficient but has a problem: if a key
//! expires and is never accessed again, it stays in memory forever. The
//! background sweeper solves this by periodically cleaning up expired keys.
//!
//! ## Adaptive Frequency
//!
//! If many keys are expiring, the sweeper runs more frequently. If few keys
//! are expiring, it backs off to save CPU, via a speedup/slowdown threshold
//! scheme driven by [`KeyspaceEngine::reap_expired`] sampling each shard in
//! turn rather than scanning one flat map.

use crate::storage::KeyspaceEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, trace};

/// Configuration for the expiry sweeper.
#[derive(Debug, Clone)]
pub struct ExpiryConfig {
    /// Base interval between sweeps (default: 100ms)
    pub base_interval: Duration,

    /// Minimum interval between sweeps (default: 10ms)
    pub min_interval: Duration,

    /// Maximum interval between sweeps (default: 1s)
    pub max_interval: Duration,

    /// If this fraction of a sample is expired, speed up sweeping
    pub speedup_threshold: f64,

    /// If this fraction of a sample is expired, slow down sweeping
    pub slowdown_threshold: f64,

    /// Keys sampled per shard per tick.
    pub sample_size_per_shard: usize,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_millis(100),
            min_interval: Duration::from_millis(10),
            max_interval: Duration::from_secs(1),
            speedup_threshold: 0.25,
            slowdown_threshold: 0.01,
            sample_size_per_shard: 20,
        }
    }
}

/// A handle to the running expiry sweeper. Dropping it stops the task.
#[derive(Debug)]
pub struct ExpirySweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl ExpirySweeper {
    pub fn start(engine: Arc<KeyspaceEngine>, config: ExpiryConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(sweeper_loop(engine, config, shutdown_rx));
        info!("background expiry sweeper started");
        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("background expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweeper_loop(
    engine: Arc<KeyspaceEngine>,
    config: ExpiryConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut current_interval = config.base_interval;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(current_interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        let (sampled, expired) = engine.reap_sample(config.sample_size_per_shard);

        if sampled > 0 {
            let expiry_rate = expired as f64 / sampled as f64;

            if expiry_rate > config.speedup_threshold {
                current_interval = (current_interval / 2).max(config.min_interval);
                debug!(
                    expired = expired,
                    sampled = sampled,
                    rate = %format!("{:.2}%", expiry_rate * 100.0),
                    new_interval_ms = current_interval.as_millis(),
                    "high expiry rate, speeding up sweeper"
                );
            } else if expiry_rate < config.slowdown_threshold && expired == 0 {
                current_interval = (current_interval * 2).min(config.max_interval);
                trace!(
                    new_interval_ms = current_interval.as_millis(),
                    "low expiry rate, slowing down sweeper"
                );
            }
        }

        if expired > 0 {
            debug!(expired = expired, keys_remaining = engine.dbsize(), "expired keys cleaned up");
        }
    }
}

/// Starts the expiry sweeper with default configuration.
pub fn start_expiry_sweeper(engine: Arc<KeyspaceEngine>) -> ExpirySweeper {
    ExpirySweeper::start(engine, ExpiryConfig::default())
}

/// Configuration for the background defrag task.
#[derive(Debug, Clone, Copy)]
pub struct DefragSchedule {
    pub interval: Duration,
    pub fill_ratio_threshold: f64,
}

/// A handle to the running defrag task. Dropping it stops the task.
#[derive(Debug)]
pub struct DefragTask {
    shutdown_tx: watch::Sender<bool>,
}

impl DefragTask {
    pub fn start(engine: Arc<KeyspaceEngine>, schedule: DefragSchedule) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(defrag_loop(engine, schedule, shutdown_rx));
        info!("background defrag task started");
        Self { shutdown_tx }
    }

    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        info!("background defrag task stopped");
    }
}

impl Drop for DefragTask {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn defrag_loop(engine: Arc<KeyspaceEngine>, schedule: DefragSchedule, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(schedule.interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("defrag task received shutdown signal");
                    return;
                }
            }
        }

        let shrunk = engine.defrag_pass(schedule.fill_ratio_threshold);
        if shrunk > 0 {
            debug!(shards_shrunk = shrunk, "defrag pass reclaimed shard capacity");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use crate::storage::entry::Kind;
    use crate::error::CoreError;
    use std::time::Duration;

    fn engine() -> Arc<KeyspaceEngine> {
        Arc::new(KeyspaceEngine::new(16))
    }

    fn set_with_ttl(engine: &KeyspaceEngine, key: &Bytes, ttl: Duration) {
        engine
            .with_write_or_insert(key, || Kind::Str(Bytes::from("value")), |_| Ok::<_, CoreError>(()))
            .unwrap();
        engine.expire_at(key, Some(std::time::Instant::now() + ttl));
    }

    #[tokio::test]
    async fn sweeper_cleans_expired_keys() {
        let engine = engine();
        for i in 0..10 {
            set_with_ttl(&engine, &Bytes::from(format!("key{}", i)), Duration::from_millis(50));
        }
        engine
            .with_write_or_insert(&Bytes::from("persistent"), || Kind::Str(Bytes::from("v")), |_| Ok::<_, CoreError>(()))
            .unwrap();
        assert_eq!(engine.dbsize(), 11);

        let config = ExpiryConfig { base_interval: Duration::from_millis(10), ..Default::default() };
        let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(engine.dbsize(), 1);
        assert!(engine.exists(&Bytes::from("persistent")));
    }

    #[tokio::test]
    async fn sweeper_stops_on_drop() {
        let engine = engine();
        let config = ExpiryConfig { base_interval: Duration::from_millis(10), ..Default::default() };
        {
            let _sweeper = ExpirySweeper::start(Arc::clone(&engine), config);
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        set_with_ttl(&engine, &Bytes::from("key"), Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!engine.exists(&Bytes::from("key")));
    }

    #[tokio::test]
    async fn defrag_task_shrinks_underfull_shards() {
        let engine = engine();
        for i in 0..200 {
            let key = Bytes::from(format!("k{}", i));
            engine
                .with_write_or_insert(&key, || Kind::Str(Bytes::new()), |_| Ok::<_, CoreError>(()))
                .unwrap();
        }
        engine.del(&(0..190).map(|i| Bytes::from(format!("k{}", i))).collect::<Vec<_>>());

        let schedule = DefragSchedule { interval: Duration::from_millis(10), fill_ratio_threshold: 0.9 };
        let _task = DefragTask::start(Arc::clone(&engine), schedule);
        tokio::time::sleep(Duration::from_millis(60)).await;
    }
}
