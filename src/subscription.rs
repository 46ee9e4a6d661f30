//! Live event subscription
//!
//! Backed by a bounded broadcast channel: the engine never waits for a subscriber, and a
//! subscriber that falls behind loses its oldest undelivered events.

use crate::types::BehaviorEvent;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

#[derive(Debug)]
pub struct EventSubscription {
    rx: broadcast::Receiver<BehaviorEvent>,
    lagged: u64,
}

impl EventSubscription {
    pub(crate) fn new(rx: broadcast::Receiver<BehaviorEvent>) -> Self {
        Self { rx, lagged: 0 }
    }

    /// Next event in ingestion order; `None` once the engine is dropped
    pub async fn next(&mut self) -> Option<BehaviorEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.lagged += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next buffered event without waiting
    pub fn try_next(&mut self) -> Option<BehaviorEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => self.lagged += skipped,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Blocking variant of [`next`](Self::next) for non-async consumers.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_next(&mut self) -> Option<BehaviorEvent> {
        loop {
            match self.rx.blocking_recv() {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => self.lagged += skipped,
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Everything currently buffered
    pub fn drain(&mut self) -> Vec<BehaviorEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Events dropped because this subscriber fell behind
    pub fn lagged(&self) -> u64 {
        self.lagged
    }

    /// A fresh subscription starting at the next ingested event
    pub fn resubscribe(&self) -> Self {
        Self::new(self.rx.resubscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BehaviorEventType, EventTimestamp};
    use chrono::Utc;

    fn tap(ms: u64) -> BehaviorEvent {
        BehaviorEvent::new(BehaviorEventType::Tap, EventTimestamp::new(ms, Utc::now()))
    }

    #[test]
    fn test_drop_oldest_when_lagging() {
        let (tx, rx) = broadcast::channel(2);
        let mut sub = EventSubscription::new(rx);
        for ms in 0..5 {
            tx.send(tap(ms)).unwrap();
        }

        let times: Vec<u64> = sub.drain().iter().map(|e| e.timestamp.monotonic_ms).collect();
        assert_eq!(times, vec![3, 4]);
        assert_eq!(sub.lagged(), 3);
    }

    #[test]
    fn test_closed_after_sender_dropped() {
        let (tx, rx) = broadcast::channel(4);
        let mut sub = EventSubscription::new(rx);
        tx.send(tap(1)).unwrap();
        drop(tx);

        assert!(sub.try_next().is_some());
        assert!(sub.try_next().is_none());
        assert!(sub.blocking_next().is_none());
    }

    #[tokio::test]
    async fn test_async_next_in_order() {
        let (tx, rx) = broadcast::channel(8);
        let mut sub = EventSubscription::new(rx);
        let mut restarted = sub.resubscribe();

        tx.send(tap(1)).unwrap();
        tx.send(tap(2)).unwrap();

        assert_eq!(sub.next().await.unwrap().timestamp.monotonic_ms, 1);
        assert_eq!(sub.next().await.unwrap().timestamp.monotonic_ms, 2);
        assert_eq!(restarted.next().await.unwrap().timestamp.monotonic_ms, 1);
    }
}
