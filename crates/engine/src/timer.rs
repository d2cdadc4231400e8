//! Deferred actions driven by the simulation tick.
//!
//! A [`TimerScheduler`] owns an arena of pending tasks keyed by handle. Each task
//! carries an action payload and an absolute expiry time. Nothing fires from
//! [`TimerScheduler::schedule`]; tasks only come back out of
//! [`TimerScheduler::advance`], ordered by expiry and then by scheduling order, so
//! callers dispatch them without mutating a collection they are iterating.

use std::collections::BTreeMap;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimerHandle(u64);

#[derive(Debug, Clone)]
struct PendingTimer<A> {
    expires_at: f64,
    action: A,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FiredTimer<A> {
    pub handle: TimerHandle,
    pub expired_at: f64,
    pub action: A,
}

#[derive(Debug)]
pub struct TimerScheduler<A> {
    now: f64,
    next_handle: u64,
    pending: BTreeMap<TimerHandle, PendingTimer<A>>,
}

impl<A> Default for TimerScheduler<A> {
    fn default() -> Self {
        Self {
            now: 0.0,
            next_handle: 0,
            pending: BTreeMap::new(),
        }
    }
}

impl<A> TimerScheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seconds elapsed across all calls to [`TimerScheduler::advance`].
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Queues `action` to fire once `duration_seconds` have elapsed.
    ///
    /// Non-positive or non-finite durations fire on the next `advance`, never
    /// synchronously.
    pub fn schedule(&mut self, duration_seconds: f32, action: A) -> TimerHandle {
        let duration = if duration_seconds.is_finite() && duration_seconds > 0.0 {
            duration_seconds as f64
        } else {
            0.0
        };
        let handle = TimerHandle(self.next_handle);
        self.next_handle = self.next_handle.saturating_add(1);
        self.pending.insert(
            handle,
            PendingTimer {
                expires_at: self.now + duration,
                action,
            },
        );
        handle
    }

    /// Removes a pending task without firing it. Returns the action when the task
    /// was still pending; fired or already-cancelled handles are a no-op.
    pub fn cancel(&mut self, handle: TimerHandle) -> Option<A> {
        self.pending.remove(&handle).map(|timer| timer.action)
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    pub fn remaining(&self, handle: TimerHandle) -> Option<f32> {
        self.pending
            .get(&handle)
            .map(|timer| (timer.expires_at - self.now).max(0.0) as f32)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Moves the clock forward by `dt_seconds` and returns every task whose expiry
    /// has been reached, earliest first. Ties keep scheduling order.
    pub fn advance(&mut self, dt_seconds: f32) -> Vec<FiredTimer<A>> {
        if dt_seconds.is_finite() && dt_seconds > 0.0 {
            self.now += dt_seconds as f64;
        }
        let now = self.now;
        let due = self
            .pending
            .iter()
            .filter(|(_, timer)| timer.expires_at <= now)
            .map(|(handle, _)| *handle)
            .collect::<Vec<_>>();

        let mut fired = due
            .into_iter()
            .filter_map(|handle| {
                self.pending.remove(&handle).map(|timer| FiredTimer {
                    handle,
                    expired_at: timer.expires_at,
                    action: timer.action,
                })
            })
            .collect::<Vec<_>>();
        fired.sort_by(|a, b| {
            a.expired_at
                .total_cmp(&b.expired_at)
                .then_with(|| a.handle.cmp(&b.handle))
        });
        fired
    }
}
