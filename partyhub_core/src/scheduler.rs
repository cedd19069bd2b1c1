//! Per-room timer facility (C4).
//!
//! One Tokio task per active countdown — the same "one logical
//! single-threaded worker per room" shape the teacher's `table/actor.rs`
//! uses for table state, just without the mpsc inbox: a timer has no inbound
//! commands besides cancel, so a shared atomic flag checked between awaits
//! is enough to make cancellation race-free without message passing.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tracing::error;

use crate::room::RoomId;

struct TimerEntry {
    cancel: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

/// Per-room countdown timers and one-shot delayed actions.
#[derive(Clone, Default)]
pub struct Scheduler {
    timers: Arc<Mutex<HashMap<RoomId, TimerEntry>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or replace) the countdown for `room_id`. `on_tick` fires once
    /// per wall-clock second with the post-decrement remaining count;
    /// `on_complete` fires exactly once when it reaches zero, unless
    /// cancelled first. A non-positive duration fires nothing.
    pub fn start_timer<FT, FutT, FC, FutC>(
        &self,
        room_id: RoomId,
        duration_sec: i64,
        on_tick: FT,
        on_complete: FC,
    ) where
        FT: Fn(u32) -> FutT + Send + Sync + 'static,
        FutT: Future<Output = ()> + Send + 'static,
        FC: FnOnce() -> FutC + Send + 'static,
        FutC: Future<Output = ()> + Send + 'static,
    {
        if duration_sec <= 0 {
            return;
        }
        self.cancel_timer(&room_id);

        let cancel = Arc::new(AtomicBool::new(false));
        let task_cancel = cancel.clone();
        let timers = self.timers.clone();
        let task_room_id = room_id.clone();
        let mut remaining = duration_sec as u32;

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(1)).await;
                if task_cancel.load(Ordering::SeqCst) {
                    break;
                }
                remaining -= 1;
                on_tick(remaining).await;
                if remaining == 0 {
                    if !task_cancel.load(Ordering::SeqCst) {
                        on_complete().await;
                    }
                    break;
                }
            }
            Self::retire(&timers, &task_room_id, &task_cancel);
        });

        let mut guard = self.timers.lock().unwrap();
        guard.insert(room_id, TimerEntry { cancel, handle });
    }

    /// Remove this room's timer entry from the map, but only if it's still
    /// the one we started (a later `start_timer` may have replaced it).
    fn retire(
        timers: &Arc<Mutex<HashMap<RoomId, TimerEntry>>>,
        room_id: &RoomId,
        cancel: &Arc<AtomicBool>,
    ) {
        let mut guard = timers.lock().unwrap();
        if let Some(entry) = guard.get(room_id) {
            if Arc::ptr_eq(&entry.cancel, cancel) {
                guard.remove(room_id);
            }
        }
    }

    /// Idempotent. Future ticks and the completion callback will not fire.
    pub fn cancel_timer(&self, room_id: &RoomId) {
        let mut guard = self.timers.lock().unwrap();
        if let Some(entry) = guard.remove(room_id) {
            entry.cancel.store(true, Ordering::SeqCst);
        }
    }

    /// One-shot, independent of any running countdown on the room. Panics
    /// inside `action` are caught and logged rather than propagated.
    pub fn schedule_delayed<A, Fut>(&self, room_id: RoomId, delay_millis: u64, action: A)
    where
        A: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_millis)).await;
            if let Err(err) = tokio::spawn(action()).await {
                error!(room_id = %room_id, error = %err, "scheduled action panicked");
            }
        });
    }

    /// Cancel this room's timer and drop its entry; delayed one-shots
    /// already in flight are left to finish since they hold no shared state.
    pub fn cleanup(&self, room_id: &RoomId) {
        let mut guard = self.timers.lock().unwrap();
        if let Some(entry) = guard.remove(room_id) {
            entry.cancel.store(true, Ordering::SeqCst);
            entry.handle.abort();
        }
    }

    pub fn has_active_timer(&self, room_id: &RoomId) -> bool {
        self.timers.lock().unwrap().contains_key(room_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[tokio::test(start_paused = true)]
    async fn zero_duration_fires_nothing() {
        let scheduler = Scheduler::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_clone = fired.clone();
        scheduler.start_timer(
            "AAAA".into(),
            0,
            |_| async {},
            move || {
                let fired = fired_clone.clone();
                async move {
                    fired.store(true, Ordering::SeqCst);
                }
            },
        );
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_count_down_then_completes() {
        let scheduler = Scheduler::new();
        let room: RoomId = "AAAA".into();
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let ticks_clone = ticks.clone();
        let completed = Arc::new(AtomicBool::new(false));
        let completed_clone = completed.clone();

        scheduler.start_timer(
            room.clone(),
            3,
            move |remaining| {
                let ticks = ticks_clone.clone();
                async move {
                    ticks.lock().unwrap().push(remaining);
                }
            },
            move || {
                let completed = completed_clone.clone();
                async move {
                    completed.store(true, Ordering::SeqCst);
                }
            },
        );

        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(1)).await;
            tokio::task::yield_now().await;
        }

        assert_eq!(*ticks.lock().unwrap(), vec![2, 1, 0]);
        assert!(completed.load(Ordering::SeqCst));
        assert!(!scheduler.has_active_timer(&room));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_future_ticks_and_completion() {
        let scheduler = Scheduler::new();
        let room: RoomId = "AAAA".into();
        let tick_count = Arc::new(AtomicU32::new(0));
        let tick_count_clone = tick_count.clone();
        let completed = Arc::new(AtomicBool::new(false));
        let completed_clone = completed.clone();

        scheduler.start_timer(
            room.clone(),
            5,
            move |_| {
                let tick_count = tick_count_clone.clone();
                async move {
                    tick_count.fetch_add(1, Ordering::SeqCst);
                }
            },
            move || {
                let completed = completed_clone.clone();
                async move {
                    completed.store(true, Ordering::SeqCst);
                }
            },
        );

        tokio::time::advance(Duration::from_secs(1)).await;
        tokio::task::yield_now().await;
        scheduler.cancel_timer(&room);
        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(tick_count.load(Ordering::SeqCst), 1);
        assert!(!completed.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn starting_a_new_timer_replaces_the_old_one() {
        let scheduler = Scheduler::new();
        let room: RoomId = "AAAA".into();
        let old_completed = Arc::new(AtomicBool::new(false));
        let old_completed_clone = old_completed.clone();
        let new_completed = Arc::new(AtomicBool::new(false));
        let new_completed_clone = new_completed.clone();

        scheduler.start_timer(room.clone(), 5, |_| async {}, move || {
            let old_completed = old_completed_clone.clone();
            async move {
                old_completed.store(true, Ordering::SeqCst);
            }
        });
        scheduler.start_timer(room.clone(), 2, |_| async {}, move || {
            let new_completed = new_completed_clone.clone();
            async move {
                new_completed.store(true, Ordering::SeqCst);
            }
        });

        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;

        assert!(!old_completed.load(Ordering::SeqCst));
        assert!(new_completed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cleanup_is_idempotent_on_unknown_room() {
        let scheduler = Scheduler::new();
        scheduler.cleanup(&"ZZZZ".into());
    }
}
