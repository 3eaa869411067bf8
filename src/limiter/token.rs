//! Abort token shared between a limited scope and the work inside it

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

const CLEAR: u8 = 0;
const DEADLINE: u8 = 1;
const MEMORY: u8 = 2;

/// Why a limited scope was aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// Wall-clock limit reached
    Deadline,

    /// Process memory grew past the ceiling
    Memory { used: u64 },
}

#[derive(Debug, Default)]
struct TokenState {
    reason: AtomicU8,
    observed_bytes: AtomicU64,
}

/// Cooperative cancellation flag.
///
/// Cloning shares the same flag. Only the first trip is recorded.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    state: Arc<TokenState>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token; returns false if it was already tripped
    pub fn trip(&self, reason: AbortReason) -> bool {
        let (code, bytes) = match reason {
            AbortReason::Deadline => (DEADLINE, 0),
            AbortReason::Memory { used } => (MEMORY, used),
        };
        // Bytes are written first so a reader that sees MEMORY also sees them.
        if code == MEMORY {
            self.state.observed_bytes.store(bytes, Ordering::SeqCst);
        }
        self.state
            .reason
            .compare_exchange(CLEAR, code, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Reason for the trip, if any
    pub fn tripped(&self) -> Option<AbortReason> {
        match self.state.reason.load(Ordering::SeqCst) {
            DEADLINE => Some(AbortReason::Deadline),
            MEMORY => Some(AbortReason::Memory {
                used: self.state.observed_bytes.load(Ordering::SeqCst),
            }),
            _ => None,
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.state.reason.load(Ordering::SeqCst) != CLEAR
    }
}
