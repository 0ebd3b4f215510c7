//! Category work queue
//!
//! An unbounded FIFO of category identifiers. Any number of producers push
//! without blocking; a single consumer pops, waiting until an item arrives or
//! every producer has been dropped, at which point the queue is closed.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Creates a connected producer/consumer pair
pub fn category_queue() -> (CategoryProducer, CategoryQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (CategoryProducer { tx }, CategoryQueue { rx })
}

/// Pushing half of the queue; clone it for each concurrent producer
#[derive(Debug, Clone)]
pub struct CategoryProducer {
    tx: UnboundedSender<String>,
}

impl CategoryProducer {
    /// Appends a category identifier
    ///
    /// Returns false if the consumer is gone.
    pub fn push(&self, category_id: impl Into<String>) -> bool {
        self.tx.send(category_id.into()).is_ok()
    }
}

/// Consuming half of the queue
#[derive(Debug)]
pub struct CategoryQueue {
    rx: UnboundedReceiver<String>,
}

impl CategoryQueue {
    /// Waits for the next identifier
    ///
    /// Returns `None` once the queue is empty and all producers are dropped.
    /// Items from one producer come out in the order that producer pushed
    /// them; there is no ordering across producers.
    pub async fn pop(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

/// Pushes every identifier from its own task and returns the consumer
///
/// The queue closes once all the producer tasks have finished.
pub fn fan_out(category_ids: &[String]) -> CategoryQueue {
    let (producer, queue) = category_queue();
    for category_id in category_ids {
        let producer = producer.clone();
        let category_id = category_id.clone();
        tokio::spawn(async move {
            producer.push(category_id);
        });
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_single_producer_order() {
        let (producer, mut queue) = category_queue();
        producer.push("C1");
        producer.push("C2");
        producer.push("C3");
        drop(producer);

        assert_eq!(queue.pop().await.as_deref(), Some("C1"));
        assert_eq!(queue.pop().await.as_deref(), Some("C2"));
        assert_eq!(queue.pop().await.as_deref(), Some("C3"));
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let (producer, mut queue) = category_queue();

        let handle = tokio::spawn(async move {
            tokio::task::yield_now().await;
            producer.push("late");
        });

        assert_eq!(queue.pop().await.as_deref(), Some("late"));
        handle.await.unwrap();
        assert_eq!(queue.pop().await, None);
    }

    #[tokio::test]
    async fn test_fan_out_delivers_every_category_then_closes() {
        let ids: Vec<String> = (0..20).map(|i| format!("C{i}")).collect();
        let mut queue = fan_out(&ids);

        let mut seen = HashSet::new();
        while let Some(id) = queue.pop().await {
            assert!(seen.insert(id));
        }
        assert_eq!(seen.len(), ids.len());
    }

    #[test]
    fn test_push_after_consumer_dropped() {
        let (producer, queue) = category_queue();
        drop(queue);
        assert!(!producer.push("C1"));
    }
}
