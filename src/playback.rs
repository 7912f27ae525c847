//! Playback position sampling
//!
//! A spawned task reads the host's media position on a fixed cadence and
//! caches it as f64 bits in an atomic, so readers never block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::messages::Event;

/// Movement, in seconds, that triggers a `PlaybackTime` event
pub const PUBLISH_THRESHOLD_SECS: f64 = 0.5;

/// Source of the live media position
pub trait PlaybackHost: Send + Sync {
    /// Current position in seconds, or `None` while unavailable
    fn current_position(&self) -> Option<f64>;
}

/// Position set by hand, for the CLI and tests
#[derive(Debug, Default)]
pub struct ManualPlaybackHost {
    position: RwLock<Option<f64>>,
}

impl ManualPlaybackHost {
    pub fn new(position: f64) -> Self {
        Self {
            position: RwLock::new(Some(position)),
        }
    }

    pub fn set(&self, position: f64) {
        *self.position.write().unwrap_or_else(|e| e.into_inner()) = Some(position);
    }

    /// Make the position unavailable, as while a player reloads
    pub fn clear(&self) {
        *self.position.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

impl PlaybackHost for ManualPlaybackHost {
    fn current_position(&self) -> Option<f64> {
        *self.position.read().unwrap_or_else(|e| e.into_inner())
    }
}

fn load(cell: &AtomicU64) -> f64 {
    f64::from_bits(cell.load(Ordering::Acquire))
}

fn store(cell: &AtomicU64, value: f64) {
    cell.store(value.to_bits(), Ordering::Release);
}

/// Cached last-known playback position
#[derive(Clone)]
pub struct PlaybackTracker {
    host: Arc<dyn PlaybackHost>,
    cached: Arc<AtomicU64>,
    published: Arc<AtomicU64>,
}

impl PlaybackTracker {
    pub fn new(host: Arc<dyn PlaybackHost>) -> Self {
        Self {
            host,
            cached: Arc::new(AtomicU64::new(0f64.to_bits())),
            published: Arc::new(AtomicU64::new(0f64.to_bits())),
        }
    }

    /// Last good position in seconds; at most one polling interval stale
    pub fn current_time(&self) -> f64 {
        load(&self.cached)
    }

    /// Read the host once and update the cache.
    ///
    /// Unavailable or non-finite readings keep the previous value. Returns
    /// the new position when it moved far enough from the last published
    /// one to be worth announcing.
    pub fn sample(&self) -> Option<f64> {
        let position = self
            .host
            .current_position()
            .filter(|p| p.is_finite())
            .map(|p| p.max(0.0))?;

        store(&self.cached, position);

        if (position - load(&self.published)).abs() > PUBLISH_THRESHOLD_SECS {
            store(&self.published, position);
            Some(position)
        } else {
            None
        }
    }

    /// Forget the cached position, e.g. when a new video starts
    pub fn reset(&self) {
        store(&self.cached, 0.0);
        store(&self.published, 0.0);
    }

    /// Start sampling every `period`, publishing significant moves on `events`
    pub fn spawn(&self, period: Duration, events: Option<mpsc::Sender<Event>>) -> PollingHandle {
        let tracker = self.clone();
        info!("⏱️ Playback sampling every {:?}", period);

        let task = tokio::spawn(async move {
            let mut cadence = interval(period);
            cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                cadence.tick().await;

                let Some(time) = tracker.sample() else {
                    continue;
                };
                if let Some(tx) = &events {
                    if let Err(e) = tx.try_send(Event::PlaybackTime { time }) {
                        debug!("Dropped playback update at {:.1}s: {}", time, e);
                    }
                }
            }
        });

        PollingHandle { task }
    }
}

/// Running sampler; stops when dropped
#[derive(Debug)]
pub struct PollingHandle {
    task: JoinHandle<()>,
}

impl PollingHandle {
    pub fn stop(self) {}
}

impl Drop for PollingHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
