// src/core/events.rs

//! The per-unit event queue (§5): single-threaded cooperative handler
//! scheduling with deferral-as-reschedule and bounded exponential backoff.

use std::time::Duration;
use tracing::{debug, warn};

/// The three internal lifecycle events (§4.2), plus a tick used to drive
/// periodic reconciliation (relation refresh, quorum re-check).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StartOpenSearch { ignore_lock: bool, after_upgrade: bool },
    RestartOpenSearch,
    UpgradeOpenSearch { ignore_lock: bool },
    Tick,
}

/// Why a handler deferred rather than completing (surfaced in logs/metrics).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferReason(pub String);

/// Result of running one event handler to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutcome {
    Done,
    Defer(DeferReason),
}

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Doubles the previous backoff, capped at 30s (reused from the reconnect
/// backoff shape: start at 1s, double, cap at 30s).
pub fn next_backoff(previous: Duration) -> Duration {
    previous.saturating_mul(2).min(MAX_BACKOFF)
}

/// One queued event awaiting (re)processing.
#[derive(Debug, Clone)]
struct Pending {
    event: Event,
    backoff: Duration,
}

/// A FIFO queue of deferred events with per-event backoff state. All
/// handlers run to completion and never overlap (§5 "single-threaded
/// cooperative per process").
#[derive(Debug, Default)]
pub struct EventQueue {
    pending: Vec<Pending>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: Event) {
        self.pending.push(Pending {
            event,
            backoff: INITIAL_BACKOFF,
        });
    }

    /// Applies a handler's outcome: on `Done`, the event is dropped from the
    /// queue; on `Defer`, it's re-enqueued with doubled backoff.
    pub fn apply_outcome(&mut self, event: Event, outcome: HandlerOutcome) {
        match outcome {
            HandlerOutcome::Done => {
                debug!("event completed: {:?}", event);
                self.pending.retain(|p| p.event != event);
            }
            HandlerOutcome::Defer(reason) => {
                let backoff = self
                    .pending
                    .iter()
                    .find(|p| p.event == event)
                    .map(|p| next_backoff(p.backoff))
                    .unwrap_or(INITIAL_BACKOFF);
                warn!("event deferred ({:?}): {}", event, reason.0);
                self.pending.retain(|p| p.event != event);
                self.pending.push(Pending { event, backoff });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn backoff_for(&self, event: &Event) -> Option<Duration> {
        self.pending.iter().find(|p| &p.event == event).map(|p| p.backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_30s() {
        let mut b = INITIAL_BACKOFF;
        for _ in 0..10 {
            b = next_backoff(b);
        }
        assert_eq!(b, MAX_BACKOFF);
    }

    #[test]
    fn deferred_event_backoff_increases_on_repeat_deferral() {
        let mut queue = EventQueue::new();
        let event = Event::Tick;
        queue.push(event.clone());
        assert_eq!(queue.backoff_for(&event), Some(INITIAL_BACKOFF));

        queue.apply_outcome(event.clone(), HandlerOutcome::Defer(DeferReason("not ready".into())));
        assert_eq!(queue.backoff_for(&event), Some(Duration::from_secs(2)));

        queue.apply_outcome(event.clone(), HandlerOutcome::Defer(DeferReason("still not ready".into())));
        assert_eq!(queue.backoff_for(&event), Some(Duration::from_secs(4)));
    }

    #[test]
    fn done_outcome_drops_event_tracking() {
        let mut queue = EventQueue::new();
        let event = Event::RestartOpenSearch;
        queue.push(event.clone());
        queue.apply_outcome(event.clone(), HandlerOutcome::Done);
        assert!(queue.is_empty());
    }
}
