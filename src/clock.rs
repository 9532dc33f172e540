//! Time source for the discovery poll loop.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;

    async fn sleep(&self, duration: Duration);

    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

/// Wall clock backed by tokio timers.
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Virtual clock: `sleep` advances time instantly.
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    today: NaiveDate,
    sleeps: Mutex<u32>,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            today,
            sleeps: Mutex::new(0),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sleeps(&self) -> u32 {
        *self.sleeps.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += duration;
        *self.sleeps.lock().unwrap_or_else(|e| e.into_inner()) += 1;
    }

    fn today(&self) -> NaiveDate {
        self.today
    }
}
