//! Background watchdog enforcing a deadline and a memory ceiling
//!
//! The watchdog never interrupts the guarded work directly. It trips an
//! [`AbortToken`] that backends and callbacks poll at unit boundaries, and the
//! limiter turns a tripped token into an error once the work returns.

use crate::limiter::token::{AbortReason, AbortToken};
use crate::telemetry::SharedProbe;
use std::io;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// What the watchdog should watch
#[derive(Clone)]
pub struct WatchdogSpec {
    /// Trip once this instant passes
    pub deadline: Option<Instant>,

    /// Trip once process RSS exceeds this many bytes (needs a probe)
    pub memory_ceiling: Option<u64>,

    /// Memory telemetry source
    pub probe: Option<SharedProbe>,

    /// How often memory is sampled
    pub poll_interval: Duration,
}

impl WatchdogSpec {
    fn watches_memory(&self) -> bool {
        self.memory_ceiling.is_some() && self.probe.is_some()
    }

    /// Whether there is anything to watch at all
    pub fn is_active(&self) -> bool {
        self.deadline.is_some() || self.watches_memory()
    }
}

/// Armed watchdog thread; disarmed on drop
pub struct Watchdog {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Spawn the watchdog thread
    pub fn arm(spec: WatchdogSpec, token: AbortToken) -> io::Result<Self> {
        let (stop, stopped) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("budgetfit-watchdog".to_string())
            .spawn(move || loop {
                let now = Instant::now();

                if let Some(deadline) = spec.deadline {
                    if now >= deadline {
                        token.trip(AbortReason::Deadline);
                        return;
                    }
                }

                if let (Some(ceiling), Some(probe)) = (spec.memory_ceiling, spec.probe.as_ref()) {
                    let used = probe.snapshot().process_rss;
                    if used > ceiling {
                        token.trip(AbortReason::Memory { used });
                        return;
                    }
                }

                let until_deadline = spec.deadline.map(|d| d.saturating_duration_since(now));
                let wait = match (until_deadline, spec.watches_memory()) {
                    (Some(left), true) => left.min(spec.poll_interval),
                    (Some(left), false) => left,
                    (None, _) => spec.poll_interval,
                };

                match stopped.recv_timeout(wait) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                }
            })?;

        Ok(Self {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop watching and wait for the thread to exit
    pub fn disarm(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.shutdown();
    }
}
