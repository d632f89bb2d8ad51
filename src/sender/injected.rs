use super::client::{DeliveryClient, DeliveryError, DeliveryReceipt};
use super::serialization::LogDocument;
use crate::buffer::Batch;
use futures::FutureExt;
use futures::future::BoxFuture;
use std::future::Future;
use std::time::Instant;

type DeliverFn =
    dyn Fn(LogDocument) -> BoxFuture<'static, Result<(), DeliveryError>> + Send + Sync;

/// Transport backed by a caller-supplied async function.
///
/// The function receives the same document the HTTP client would post and
/// decides success or failure itself.
pub struct FnDeliveryClient {
    deliver: Box<DeliverFn>,
}

impl FnDeliveryClient {
    pub fn new<F, Fut>(deliver: F) -> Self
    where
        F: Fn(LogDocument) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DeliveryError>> + Send + 'static,
    {
        Self {
            deliver: Box::new(move |document| deliver(document).boxed()),
        }
    }
}

impl DeliveryClient for FnDeliveryClient {
    fn send<'a>(&'a self, batch: &'a Batch) -> BoxFuture<'a, Result<DeliveryReceipt, DeliveryError>> {
        let start = Instant::now();
        let pending = (self.deliver)(batch.document().clone());

        Box::pin(async move {
            pending.await?;
            Ok(DeliveryReceipt {
                batch_id: batch.id().to_string(),
                records: batch.size(),
                status_code: None,
                bytes_sent: 0,
                latency: start.elapsed(),
            })
        })
    }

    fn name(&self) -> &'static str {
        "injected"
    }
}

impl std::fmt::Debug for FnDeliveryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDeliveryClient").finish_non_exhaustive()
    }
}
