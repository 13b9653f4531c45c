use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use crate::types::{Quote, SubscriptionId};

pub type QuoteCallback = Arc<dyn Fn(&Quote) + Send + Sync>;

const BROADCAST_CAPACITY: usize = 64;

/// Observers of published aggregates: callbacks keyed by handle, invoked in
/// registration order, plus a broadcast channel for stream consumers.
pub struct SubscriberRegistry {
    callbacks: Mutex<Vec<(SubscriptionId, QuoteCallback)>>,
    channel: broadcast::Sender<Quote>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        let (channel, _) = broadcast::channel(BROADCAST_CAPACITY);
        SubscriberRegistry {
            callbacks: Mutex::new(Vec::new()),
            channel,
        }
    }

    pub fn subscribe(&self, callback: QuoteCallback) -> SubscriptionId {
        let id = SubscriptionId::new();
        self.lock().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn watch(&self) -> broadcast::Receiver<Quote> {
        self.channel.subscribe()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every callback once, in registration order. Iterates a snapshot so a
    /// callback may unsubscribe (itself or others) without deadlocking.
    pub fn notify(&self, quote: &Quote) {
        let snapshot: Vec<QuoteCallback> = self.lock().iter().map(|(_, cb)| cb.clone()).collect();
        for callback in snapshot {
            callback(quote);
        }
        // No receivers is not an error.
        let _ = self.channel.send(quote.clone());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, QuoteCallback)>> {
        self.callbacks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn quote(value: f64) -> Quote {
        Quote::new(value, Utc::now(), "aggregated", None).unwrap()
    }

    #[test]
    fn test_notifies_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            registry.subscribe(Arc::new(move |q: &Quote| {
                seen.lock().unwrap().push((tag, q.value()));
            }));
        }

        registry.notify(&quote(42.0));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("first", 42.0), ("second", 42.0), ("third", 42.0)]
        );
    }

    #[test]
    fn test_same_callback_twice_gets_distinct_handles() {
        let registry = SubscriberRegistry::new();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let callback: QuoteCallback = Arc::new(move |_| *counter.lock().unwrap() += 1);

        let a = registry.subscribe(callback.clone());
        let b = registry.subscribe(callback);
        assert_ne!(a, b);

        assert!(registry.unsubscribe(a));
        assert!(!registry.unsubscribe(a));
        registry.notify(&quote(1.0));
        assert_eq!(*hits.lock().unwrap(), 1);
        assert!(registry.unsubscribe(b));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_callback_may_unsubscribe_during_notify() {
        let registry = Arc::new(SubscriberRegistry::new());
        let handle = Arc::new(Mutex::new(None));

        let reg = registry.clone();
        let own = handle.clone();
        let id = registry.subscribe(Arc::new(move |_| {
            if let Some(id) = own.lock().unwrap().take() {
                reg.unsubscribe(id);
            }
        }));
        *handle.lock().unwrap() = Some(id);

        registry.notify(&quote(1.0));
        assert_eq!(registry.len(), 0);
    }

    #[tokio::test]
    async fn test_watch_receives_published_quotes() {
        let registry = SubscriberRegistry::new();
        let mut rx = registry.watch();
        registry.notify(&quote(7.5));
        assert_eq!(rx.recv().await.unwrap().value(), 7.5);
    }
}
