//! Per-context cooldown gate.
//!
//! Throttles how often the bot replies inside one conversation thread. State
//! is in-memory only; a restart clears all cooldowns.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::time::{Duration, Instant};

/// Tracks the last handled timestamp per context id.
pub struct CooldownGate {
    state: Mutex<GateState>,
}

struct GateState {
    last: HashMap<String, Instant>,
    /// Largest window seen so far. Entries older than this can never
    /// throttle again under any configured window.
    max_window: Duration,
}

impl CooldownGate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                last: HashMap::new(),
                max_window: Duration::ZERO,
            }),
        }
    }

    /// Returns true when the context is still cooling down.
    ///
    /// When the context is clear, the current instant is recorded so the next
    /// message inside `window` gets throttled, and entries past every window
    /// are swept out. A zero window disables the gate entirely.
    pub async fn check_and_touch(&self, context_id: &str, window: Duration) -> bool {
        if window.is_zero() {
            return false;
        }
        let mut state = self.state.lock().await;
        if window > state.max_window {
            state.max_window = window;
        }
        if let Some(ts) = state.last.get(context_id) {
            if ts.elapsed() < window {
                return true;
            }
        }
        let max_window = state.max_window;
        state.last.retain(|_, ts| ts.elapsed() < max_window);
        state.last.insert(context_id.to_string(), Instant::now());
        false
    }

    #[cfg(test)]
    pub(crate) async fn tracked(&self) -> usize {
        self.state.lock().await.last.len()
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_message_passes() {
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("ctx", Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_second_message_within_window_is_throttled() {
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("ctx", Duration::from_secs(10)).await);
        assert!(gate.check_and_touch("ctx", Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_contexts_are_independent() {
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("a", Duration::from_secs(10)).await);
        assert!(!gate.check_and_touch("b", Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_zero_window_never_throttles() {
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("ctx", Duration::ZERO).await);
        assert!(!gate.check_and_touch("ctx", Duration::ZERO).await);
    }

    #[tokio::test]
    async fn test_gate_reopens_after_window() {
        tokio::time::pause();
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("ctx", Duration::from_secs(5)).await);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(!gate.check_and_touch("ctx", Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_swept() {
        tokio::time::pause();
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("a", Duration::from_secs(5)).await);
        tokio::time::advance(Duration::from_secs(6)).await;
        // Touching another context drops "a", which can no longer throttle.
        assert!(!gate.check_and_touch("b", Duration::from_secs(5)).await);
        assert_eq!(gate.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_live_entries_survive_sweep() {
        tokio::time::pause();
        let gate = CooldownGate::new();
        assert!(!gate.check_and_touch("a", Duration::from_secs(10)).await);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!gate.check_and_touch("b", Duration::from_secs(10)).await);
        assert_eq!(gate.tracked().await, 2);
        assert!(gate.check_and_touch("a", Duration::from_secs(10)).await);
    }
}
