//! Port interfaces for invoking calls

use std::sync::Arc;

use apiq_domain::{CallDescriptor, CallOutcome, Failure};
use async_trait::async_trait;

/// Trait for executing one call against a remote API
///
/// Implementations classify their own failures: the dispatcher retries
/// exactly the failures marked retriable.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Decoded response handed back to the caller
    type Payload: Send;

    /// Execute the call once
    async fn invoke(&self, call: &CallDescriptor) -> CallOutcome<Self::Payload>;

    /// Acquire the underlying resource (client, connection pool)
    async fn open(&self) -> Result<(), Failure> {
        Ok(())
    }

    /// Release the underlying resource
    async fn close(&self) {}
}

#[async_trait]
impl<T: Transport> Transport for Arc<T> {
    type Payload = T::Payload;

    async fn invoke(&self, call: &CallDescriptor) -> CallOutcome<Self::Payload> {
        (**self).invoke(call).await
    }

    async fn open(&self) -> Result<(), Failure> {
        (**self).open().await
    }

    async fn close(&self) {
        (**self).close().await
    }
}

/// Thread-blocking counterpart of [`Transport`]
pub trait BlockingTransport: Send + Sync {
    type Payload;

    /// Execute the call once, blocking the calling thread
    fn invoke(&self, call: &CallDescriptor) -> CallOutcome<Self::Payload>;

    fn open(&self) -> Result<(), Failure> {
        Ok(())
    }

    fn close(&self) {}
}

impl<T: BlockingTransport> BlockingTransport for Arc<T> {
    type Payload = T::Payload;

    fn invoke(&self, call: &CallDescriptor) -> CallOutcome<Self::Payload> {
        (**self).invoke(call)
    }

    fn open(&self) -> Result<(), Failure> {
        (**self).open()
    }

    fn close(&self) {
        (**self).close()
    }
}
