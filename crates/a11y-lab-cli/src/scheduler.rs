//! Tokio-backed notification timers.
//!
//! Each scheduled event sleeps on the runtime and is then sent over a
//! channel. The session owning the engine drains the channel, so engine
//! state is only ever touched from one thread.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use a11y_lab::{Scheduler, TimerEvent};

use crate::types::{SessionError, SessionResult};

pub struct TokioScheduler {
    handle: Handle,
    tx: UnboundedSender<TimerEvent>,
}

impl TokioScheduler {
    /// Create a scheduler on the current runtime and the receiver its events
    /// arrive on.
    pub fn new() -> SessionResult<(Self, UnboundedReceiver<TimerEvent>)> {
        let handle = Handle::try_current().map_err(|e| SessionError::Runtime(e.to_string()))?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok((Self { handle, tx }, rx))
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, event: TimerEvent) {
        let tx = self.tx.clone();
        self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone once the session is dropped.
            let _ = tx.send(event);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_deadline_order() {
        let (mut sched, mut rx) = TokioScheduler::new().unwrap();
        sched.schedule(Duration::from_millis(40), TimerEvent::Remove(1));
        sched.schedule(Duration::from_millis(10), TimerEvent::Hide(1));

        assert_eq!(rx.recv().await, Some(TimerEvent::Hide(1)));
        assert_eq!(rx.recv().await, Some(TimerEvent::Remove(1)));
    }

    #[test]
    fn test_requires_runtime() {
        assert!(matches!(TokioScheduler::new(), Err(SessionError::Runtime(_))));
    }
}
