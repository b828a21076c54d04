use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time;

pub use sketchboard_types::TimerKind;

/// Per-room single-slot timer. At most one timer is active per room: starting
/// a new one bumps a generation counter that every in-flight tick/expiry task
/// checks before invoking its callback, so a stale timer can never fire after
/// `stop_timer` or a subsequent `start_timer` for the same room.
///
/// Grounded on the tick-scheduling shape `arcforge-tick` documents for a
/// room actor's `tokio::select!` loop, adapted here to push callbacks back
/// through a caller-supplied closure rather than requiring the caller to poll.
#[derive(Clone, Default)]
pub struct TimerService {
    generations: Arc<Mutex<HashMap<String, u64>>>,
}

impl TimerService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels any existing timer for `room_code`, then spawns a task that
    /// fires `on_tick` once per elapsed second and exactly one `on_expiry`
    /// at `duration` after start, unless cancelled first.
    pub fn start_timer<OnTick, OnExpiry>(
        &self,
        room_code: String,
        kind: TimerKind,
        duration: Duration,
        on_tick: OnTick,
        on_expiry: OnExpiry,
    ) where
        OnTick: Fn(TimerKind, u32) + Send + Sync + 'static,
        OnExpiry: FnOnce(TimerKind) + Send + 'static,
    {
        let generations = self.generations.clone();
        let room_for_task = room_code.clone();

        tokio::spawn(async move {
            let my_generation = {
                let mut gens = generations.lock().await;
                let next = gens.get(&room_for_task).copied().unwrap_or(0) + 1;
                gens.insert(room_for_task.clone(), next);
                next
            };

            let total_secs = duration.as_secs().max(1);
            let mut interval = time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick fires immediately; consume it

            for elapsed in 1..=total_secs {
                interval.tick().await;

                let still_current = {
                    let gens = generations.lock().await;
                    gens.get(&room_for_task).copied() == Some(my_generation)
                };
                if !still_current {
                    return;
                }

                let remaining = total_secs - elapsed;
                if remaining > 0 {
                    if let Err(panic) =
                        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            on_tick(kind, remaining)
                        }))
                    {
                        tracing::error!(room = %room_for_task, ?panic, "timer tick callback panicked");
                    }
                }
            }

            let still_current = {
                let gens = generations.lock().await;
                gens.get(&room_for_task).copied() == Some(my_generation)
            };
            if still_current {
                if let Err(panic) =
                    std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| on_expiry(kind)))
                {
                    tracing::error!(room = %room_for_task, ?panic, "timer expiry callback panicked");
                }
            }
        });
    }

    /// Idempotent, eventual: bumps the generation counter so any in-flight
    /// ticks/expiry for this room observe themselves as stale and return.
    pub async fn stop_timer(&self, room_code: &str) {
        let mut gens = self.generations.lock().await;
        let next = gens.get(room_code).copied().unwrap_or(0) + 1;
        gens.insert(room_code.to_string(), next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::mpsc;

    #[tokio::test(start_paused = true)]
    async fn fires_one_tick_per_second_then_expiry() {
        let service = TimerService::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticks = Arc::new(AtomicU32::new(0));
        let ticks_clone = ticks.clone();

        service.start_timer(
            "ROOM1".into(),
            TimerKind::Drawing,
            Duration::from_secs(3),
            move |_kind, _remaining| {
                ticks_clone.fetch_add(1, Ordering::SeqCst);
            },
            move |kind| {
                let _ = tx.send(kind);
            },
        );

        time::advance(Duration::from_secs(4)).await;
        let fired = rx.recv().await;
        assert!(matches!(fired, Some(TimerKind::Drawing)));
        assert_eq!(ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_timer_prevents_expiry_callback() {
        let service = TimerService::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerKind>();

        service.start_timer(
            "ROOM2".into(),
            TimerKind::WordSelection,
            Duration::from_secs(2),
            |_, _| {},
            move |kind| {
                let _ = tx.send(kind);
            },
        );

        service.stop_timer("ROOM2").await;
        time::advance(Duration::from_secs(3)).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn starting_new_timer_cancels_the_old_one() {
        let service = TimerService::new();
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerKind>();

        service.start_timer(
            "ROOM3".into(),
            TimerKind::WordSelection,
            Duration::from_secs(10),
            |_, _| {},
            |_| panic!("old timer must not fire"),
        );

        let tx2 = tx.clone();
        service.start_timer(
            "ROOM3".into(),
            TimerKind::Drawing,
            Duration::from_secs(1),
            |_, _| {},
            move |kind| {
                let _ = tx2.send(kind);
            },
        );

        time::advance(Duration::from_secs(2)).await;
        let fired = rx.recv().await;
        assert!(matches!(fired, Some(TimerKind::Drawing)));
    }
}
