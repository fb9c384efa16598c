use std::{
    collections::BTreeMap,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use tokio::sync::oneshot;

use super::report::Report;

pub type Tags = BTreeMap<String, String>;

/// Delivers reports to the error tracking service.
///
/// Implementations are shared by every core derived from the same configuration, so both
/// operations must be safe to call concurrently.
pub trait Transport: Send + Sync {
    /// Queues `report` for delivery and returns immediately.
    fn capture(&self, report: Report, tags: &Tags) -> Delivery;

    /// Blocks until every report captured so far has been acknowledged or has failed.
    fn wait(&self) -> eyre::Result<()>;
}

/// Completion handle for one captured report. Resolves to the event id once the service
/// acknowledged the report.
///
/// Dropping the handle does not cancel delivery.
#[derive(Debug)]
pub struct Delivery {
    receiver: oneshot::Receiver<eyre::Result<String>>,
}

impl Delivery {
    pub fn channel() -> (oneshot::Sender<eyre::Result<String>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    pub fn ready(result: eyre::Result<String>) -> Self {
        let (sender, delivery) = Self::channel();
        let _ = sender.send(result);
        delivery
    }

    /// Waits for the outcome from synchronous code. Must not be called from within an async
    /// runtime; await the handle there instead.
    pub fn blocking_recv(self) -> eyre::Result<String> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(eyre::eyre!("transport dropped the report")))
    }
}

impl Future for Delivery {
    type Output = eyre::Result<String>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(|result| {
            result.unwrap_or_else(|_| Err(eyre::eyre!("transport dropped the report")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_delivery_resolves_immediately() {
        let delivery = Delivery::ready(Ok("abc".to_string()));
        assert_eq!(delivery.blocking_recv().unwrap(), "abc");
    }

    #[test]
    fn dropped_sender_is_an_error() {
        let (sender, delivery) = Delivery::channel();
        drop(sender);
        assert!(delivery.blocking_recv().is_err());
    }

    #[tokio::test]
    async fn delivery_can_be_awaited() {
        let (sender, delivery) = Delivery::channel();
        tokio::spawn(async move {
            let _ = sender.send(Ok("id".to_string()));
        });
        assert_eq!(delivery.await.unwrap(), "id");
    }
}
