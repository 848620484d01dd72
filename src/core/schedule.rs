// core/schedule.rs

// Fixed-rate tick loop. Deadlines advance by one period per tick from the loop
// start; a tick that overruns is followed immediately by the next one, and
// missed deadlines are dropped rather than replayed in a burst.

use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::{Result, SimError};

/// Runs a callback at a fixed rate until shut down
pub struct TickScheduler {
    period: Duration,
    max_ticks: Option<u64>,
    shutdown: Arc<AtomicBool>,
}

impl TickScheduler {
    /// Scheduler ticking at `rate_hz`
    pub fn new(rate_hz: f64) -> Result<Self> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return Err(SimError::Config(format!(
                "tick rate must be positive, got {}",
                rate_hz
            )));
        }
        Ok(TickScheduler {
            period: Duration::from_secs_f64(1.0 / rate_hz),
            max_ticks: None,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Stop after `ticks` ticks
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Flag that stops the loop before its next tick once set
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run `tick` until shutdown, the tick limit, or a tick error.
    ///
    /// Returns the number of ticks executed.
    pub fn run<F>(&self, mut tick: F) -> Result<u64>
    where
        F: FnMut() -> Result<()>,
    {
        info!("Tick loop started at {:.2} Hz", 1.0 / self.period.as_secs_f64());

        let mut deadline = Instant::now();
        let mut count = 0u64;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Tick loop shut down after {} ticks", count);
                break;
            }
            if self.max_ticks.is_some_and(|max| count >= max) {
                debug!("Tick limit of {} reached", count);
                break;
            }

            tick()?;
            count += 1;

            deadline += self.period;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                let behind = now - deadline;
                if behind > self.period {
                    warn!(
                        "Tick {} overran by {:.1} ms, dropping missed deadlines",
                        count,
                        behind.as_secs_f64() * 1000.0
                    );
                }
                deadline = now;
            }
        }

        Ok(count)
    }
}
