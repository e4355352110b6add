//! Per-key state registry.
//!
//! Each conversation key maps to one slot behind its own async mutex; holding a [`StateGuard`] is
//! the only way to read or change that key's state. Slots are removed from the map only while
//! their mutex is held and are marked retired first, so a task that looked a slot up before the
//! removal re-resolves the key instead of acting on a detached state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use super::state::{ConversationKey, ConversationState};

#[derive(Debug, Default)]
struct Slot {
    retired: bool,
    state: Option<ConversationState>,
}

pub struct StateRegistry {
    slots: DashMap<ConversationKey, Arc<Mutex<Slot>>>,
    ttl_seconds: i64,
}

/// Exclusive access to one key's state for the duration of a critical section.
pub struct StateGuard {
    key: ConversationKey,
    slot: Arc<Mutex<Slot>>,
    guard: OwnedMutexGuard<Slot>,
    ttl_seconds: i64,
}

impl StateGuard {
    fn expire(&mut self, now: DateTime<Utc>) {
        let expired = self
            .guard
            .state
            .as_ref()
            .is_some_and(|state| state.is_expired(now));
        if !expired {
            return;
        }
        if let Some(state) = self.guard.state.take() {
            debug!(
                "Conversation {} expired after {} transitions",
                state.key, state.transitions
            );
        }
    }

    /// The live state, if any. An expired state is dropped and reported as absent.
    pub fn current(&mut self, now: DateTime<Utc>) -> Option<&mut ConversationState> {
        self.expire(now);
        self.guard.state.as_mut()
    }

    /// The live state, starting a fresh one when none exists or the old one expired.
    pub fn state(&mut self, now: DateTime<Utc>) -> &mut ConversationState {
        self.expire(now);
        let key = &self.key;
        let ttl_seconds = self.ttl_seconds;
        self.guard
            .state
            .get_or_insert_with(|| ConversationState::new(key.clone(), now, ttl_seconds))
    }
}

impl StateRegistry {
    pub fn new(ttl_seconds: i64) -> Self {
        Self {
            slots: DashMap::new(),
            ttl_seconds,
        }
    }

    pub async fn lock(&self, key: &ConversationKey) -> StateGuard {
        loop {
            let slot = self
                .slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
                .clone();

            let guard = slot.clone().lock_owned().await;
            if guard.retired {
                continue;
            }
            return StateGuard {
                key: key.clone(),
                slot,
                guard,
                ttl_seconds: self.ttl_seconds,
            };
        }
    }

    /// Destroys the key's state and releases the slot. Returns whether a live state existed.
    pub fn end(&self, mut guard: StateGuard, now: DateTime<Utc>) -> bool {
        let existed = guard.current(now).is_some();
        guard.guard.state = None;
        guard.guard.retired = true;
        self.slots
            .remove_if(&guard.key, |_, slot| Arc::ptr_eq(slot, &guard.slot));
        existed
    }

    /// Removes expired and empty slots. Slots busy with an in-flight transition are skipped.
    pub fn sweep(&self, now: DateTime<Utc>) -> usize {
        let slots: Vec<(ConversationKey, Arc<Mutex<Slot>>)> = self
            .slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut removed = 0;
        for (key, slot) in slots {
            let Ok(mut guard) = slot.try_lock() else {
                continue;
            };
            let stale = guard
                .state
                .as_ref()
                .map_or(true, |state| state.is_expired(now));
            if !stale {
                continue;
            }
            guard.state = None;
            guard.retired = true;
            if self
                .slots
                .remove_if(&key, |_, current| Arc::ptr_eq(current, &slot))
                .is_some()
            {
                removed += 1;
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Copy of the stored state without applying expiry.
    #[cfg(test)]
    pub async fn snapshot(&self, key: &ConversationKey) -> Option<ConversationState> {
        let slot = self.slots.get(key).map(|entry| entry.value().clone())?;
        let guard = slot.lock().await;
        guard.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn test_state_is_created_once_and_reused() {
        let registry = StateRegistry::new(180);
        let key = ConversationKey::direct("u1");
        let now = Utc::now();

        registry.lock(&key).await.state(now).touch(now);
        registry.lock(&key).await.state(now).touch(now);

        let state = registry.snapshot(&key).await.unwrap();
        assert_eq!(state.transitions, 2);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_state_is_replaced_on_access() {
        let registry = StateRegistry::new(180);
        let key = ConversationKey::direct("u1");
        let t0 = Utc::now();

        registry.lock(&key).await.state(t0).touch(t0);

        let later = t0 + Duration::seconds(181);
        let mut guard = registry.lock(&key).await;
        assert!(guard.current(later).is_none());
        assert_eq!(guard.state(later).transitions, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_access_creates_one_state_per_key() {
        let registry = Arc::new(StateRegistry::new(180));
        let now = Utc::now();

        let mut handles = Vec::new();
        for i in 0..200 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                let key = ConversationKey::direct(format!("u{}", i % 10));
                registry.lock(&key).await.state(now).touch(now);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.len(), 10);
        for i in 0..10 {
            let key = ConversationKey::direct(format!("u{i}"));
            assert_eq!(registry.snapshot(&key).await.unwrap().transitions, 20);
        }
    }

    #[tokio::test]
    async fn test_end_removes_state_immediately() {
        let registry = StateRegistry::new(180);
        let key = ConversationKey::direct("u1");
        let now = Utc::now();

        registry.lock(&key).await.state(now).touch(now);
        let guard = registry.lock(&key).await;
        assert!(registry.end(guard, now));
        assert_eq!(registry.len(), 0);

        let guard = registry.lock(&key).await;
        assert!(!registry.end(guard, now));
    }

    #[tokio::test]
    async fn test_sweep_skips_live_and_busy_slots() {
        let registry = StateRegistry::new(180);
        let t0 = Utc::now();
        let stale = ConversationKey::direct("stale");
        let live = ConversationKey::direct("live");
        let busy = ConversationKey::direct("busy");

        registry.lock(&stale).await.state(t0).touch(t0);
        registry.lock(&busy).await.state(t0).touch(t0);
        let later = t0 + Duration::seconds(200);
        registry.lock(&live).await.state(later).touch(later);

        let held = registry.lock(&busy).await;
        assert_eq!(registry.sweep(later), 1);
        drop(held);

        assert!(registry.snapshot(&stale).await.is_none());
        assert!(registry.snapshot(&live).await.is_some());
        assert_eq!(registry.sweep(later), 1);
        assert_eq!(registry.len(), 1);
    }
}
