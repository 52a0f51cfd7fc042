//! Transient operator notifications and the timers that expire them.
//!
//! Raising a notification schedules two independent one-shot events: one
//! hides it, a later one removes it. Timers are never cancelled; an event
//! for a notification that is already gone is ignored.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub type NotificationId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub visible: bool,
}

/// A deferred notification state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerEvent {
    Hide(NotificationId),
    Remove(NotificationId),
}

/// Delays measured from a notification's creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTiming {
    pub hide_after: Duration,
    pub remove_after: Duration,
}

impl Default for NotificationTiming {
    fn default() -> Self {
        Self {
            hide_after: Duration::from_millis(5000),
            remove_after: Duration::from_millis(5500),
        }
    }
}

/// Delivers a [`TimerEvent`] back to the engine after a delay.
pub trait Scheduler {
    fn schedule(&mut self, delay: Duration, event: TimerEvent);
}

/// Virtual-clock scheduler; time only moves when [`advance`](Self::advance)
/// is called.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    now: Duration,
    seq: u64,
    pending: BTreeMap<(Duration, u64), TimerEvent>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Move the clock forward and return every event that became due, in
    /// deadline order (ties in scheduling order).
    pub fn advance(&mut self, by: Duration) -> Vec<TimerEvent> {
        self.now += by;
        let later = self.pending.split_off(&(self.now, u64::MAX));
        let due = std::mem::replace(&mut self.pending, later);
        due.into_values().collect()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        self.seq += 1;
        self.pending.insert((self.now + delay, self.seq), event);
    }
}

/// The live notification set.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    next_id: NotificationId,
    timing: NotificationTiming,
    notifications: Vec<Notification>,
}

impl NotificationCenter {
    pub fn new(timing: NotificationTiming) -> Self {
        Self {
            next_id: 0,
            timing,
            notifications: Vec::new(),
        }
    }

    pub fn timing(&self) -> NotificationTiming {
        self.timing
    }

    /// Show `message` and schedule its expiry.
    pub fn raise(
        &mut self,
        message: impl Into<String>,
        scheduler: &mut dyn Scheduler,
    ) -> NotificationId {
        self.next_id += 1;
        let id = self.next_id;
        let message = message.into();
        tracing::warn!("Notification {id}: {message}");
        self.notifications.push(Notification {
            id,
            message,
            visible: true,
        });
        scheduler.schedule(self.timing.hide_after, TimerEvent::Hide(id));
        scheduler.schedule(self.timing.remove_after, TimerEvent::Remove(id));
        id
    }

    /// Apply a fired timer.
    pub fn handle(&mut self, event: TimerEvent) {
        match event {
            TimerEvent::Hide(id) => {
                if let Some(n) = self.notifications.iter_mut().find(|n| n.id == id) {
                    n.visible = false;
                }
            }
            TimerEvent::Remove(id) => self.notifications.retain(|n| n.id != id),
        }
    }

    pub fn get(&self, id: NotificationId) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn all(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn visible(&self) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(|n| n.visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pump(center: &mut NotificationCenter, sched: &mut ManualScheduler, ms: u64) {
        for event in sched.advance(Duration::from_millis(ms)) {
            center.handle(event);
        }
    }

    #[test]
    fn test_hide_then_remove() {
        let mut sched = ManualScheduler::new();
        let mut center = NotificationCenter::default();
        let id = center.raise("boom", &mut sched);
        assert_eq!(sched.pending(), 2);

        pump(&mut center, &mut sched, 4999);
        assert!(center.get(id).unwrap().visible);

        pump(&mut center, &mut sched, 1);
        assert!(!center.get(id).unwrap().visible);

        pump(&mut center, &mut sched, 499);
        assert!(center.get(id).is_some());

        pump(&mut center, &mut sched, 1);
        assert!(center.get(id).is_none());
        assert_eq!(sched.pending(), 0);
    }

    #[test]
    fn test_notifications_expire_independently() {
        let mut sched = ManualScheduler::new();
        let mut center = NotificationCenter::default();
        let first = center.raise("one", &mut sched);
        pump(&mut center, &mut sched, 3000);
        let second = center.raise("one", &mut sched);
        assert_eq!(center.all().len(), 2);

        pump(&mut center, &mut sched, 2500);
        assert!(center.get(first).is_none());
        assert!(center.get(second).unwrap().visible);

        pump(&mut center, &mut sched, 3000);
        assert!(center.all().is_empty());
    }

    #[test]
    fn test_custom_timing() {
        let mut sched = ManualScheduler::new();
        let mut center = NotificationCenter::new(NotificationTiming {
            hide_after: Duration::from_millis(10),
            remove_after: Duration::from_millis(20),
        });
        center.raise("fast", &mut sched);
        pump(&mut center, &mut sched, 10);
        assert_eq!(center.visible().count(), 0);
        pump(&mut center, &mut sched, 10);
        assert!(center.all().is_empty());
    }

    #[test]
    fn test_stale_event_ignored() {
        let mut center = NotificationCenter::default();
        center.handle(TimerEvent::Hide(42));
        center.handle(TimerEvent::Remove(42));
        assert!(center.all().is_empty());
    }

    #[test]
    fn test_advance_orders_by_deadline() {
        let mut sched = ManualScheduler::new();
        sched.schedule(Duration::from_millis(20), TimerEvent::Remove(1));
        sched.schedule(Duration::from_millis(10), TimerEvent::Hide(1));
        sched.schedule(Duration::from_millis(10), TimerEvent::Hide(2));
        let due = sched.advance(Duration::from_millis(30));
        assert_eq!(
            due,
            vec![TimerEvent::Hide(1), TimerEvent::Hide(2), TimerEvent::Remove(1)]
        );
    }
}
