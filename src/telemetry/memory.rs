//! Memory telemetry probes
//!
//! The trainer treats memory telemetry as an optional capability: an estimator
//! without a probe skips every memory-based decision instead of assuming zero.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use sysinfo::{Pid, System};

/// Point-in-time view of system and process memory, all values in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemorySnapshot {
    /// Memory available to new allocations system-wide
    pub available: u64,

    /// Total physical memory
    pub total: u64,

    /// Resident set size of the current process
    pub process_rss: u64,
}

impl MemorySnapshot {
    /// Fraction of total memory still available (0.0 to 1.0)
    pub fn available_fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.available as f64 / self.total as f64
    }
}

/// Source of memory telemetry
pub trait MemoryProbe: Send + Sync {
    /// Take a fresh snapshot
    fn snapshot(&self) -> MemorySnapshot;
}

/// Shared handle to a probe
pub type SharedProbe = Arc<dyn MemoryProbe>;

/// Probe backed by the `sysinfo` crate
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    /// Create a probe for the current process
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    /// Create a shared probe handle
    pub fn shared() -> SharedProbe {
        Arc::new(Self::new())
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn snapshot(&self) -> MemorySnapshot {
        let mut system = self.system.lock().unwrap_or_else(PoisonError::into_inner);
        system.refresh_memory();

        let process_rss = match self.pid {
            Some(pid) if system.refresh_process(pid) => {
                system.process(pid).map(|p| p.memory()).unwrap_or(0)
            }
            _ => 0,
        };

        MemorySnapshot {
            available: system.available_memory(),
            total: system.total_memory(),
            process_rss,
        }
    }
}

/// Probe that always reports the same snapshot
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe {
    snapshot: MemorySnapshot,
}

impl StaticProbe {
    pub fn new(available: u64, total: u64, process_rss: u64) -> Self {
        Self {
            snapshot: MemorySnapshot {
                available,
                total,
                process_rss,
            },
        }
    }
}

impl MemoryProbe for StaticProbe {
    fn snapshot(&self) -> MemorySnapshot {
        self.snapshot
    }
}

/// Probe replaying a fixed sequence of snapshots.
///
/// Once the script runs out the last snapshot repeats forever.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<MemorySnapshot>>,
    last: Mutex<MemorySnapshot>,
}

impl ScriptedProbe {
    pub fn new(script: Vec<MemorySnapshot>) -> Self {
        let last = script.last().copied().unwrap_or_default();
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(last),
        }
    }

    /// Script only the available-memory readings against a fixed total
    pub fn from_available(total: u64, available: &[u64]) -> Self {
        Self::new(
            available
                .iter()
                .map(|&a| MemorySnapshot {
                    available: a,
                    total,
                    process_rss: 0,
                })
                .collect(),
        )
    }

    /// Number of scripted snapshots not yet consumed
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl MemoryProbe for ScriptedProbe {
    fn snapshot(&self) -> MemorySnapshot {
        let next = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(snapshot) = next {
            *last = snapshot;
        }
        *last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_fraction() {
        let snapshot = MemorySnapshot {
            available: 25,
            total: 100,
            process_rss: 0,
        };
        assert!((snapshot.available_fraction() - 0.25).abs() < 1e-12);
        assert_eq!(MemorySnapshot::default().available_fraction(), 1.0);
    }

    #[test]
    fn test_sysinfo_probe_reports_total() {
        let probe = SysinfoProbe::new();
        let snapshot = probe.snapshot();
        assert!(snapshot.total > 0);
        assert!(snapshot.available <= snapshot.total);
    }

    #[test]
    fn test_scripted_probe_repeats_last() {
        let probe = ScriptedProbe::from_available(1000, &[900, 800]);
        assert_eq!(probe.remaining(), 2);
        assert_eq!(probe.snapshot().available, 900);
        assert_eq!(probe.snapshot().available, 800);
        assert_eq!(probe.snapshot().available, 800);
        assert_eq!(probe.remaining(), 0);
    }

    #[test]
    fn test_static_probe() {
        let probe = StaticProbe::new(10, 20, 5);
        assert_eq!(probe.snapshot().process_rss, 5);
        assert_eq!(probe.snapshot().available, 10);
    }
}
