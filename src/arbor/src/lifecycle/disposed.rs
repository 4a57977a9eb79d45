use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::FutureExt;

use crate::lifecycle::{Completion, DisposeError, Driver, LifecycleShared};

/// Resolves once the participant has been disposed.
///
/// Awaiting it also drives a teardown that could not be handed to a runtime.
#[must_use = "futures do nothing unless polled"]
pub struct Disposed {
    shared: Arc<LifecycleShared>,
    completion: Completion,
    driver: Option<Driver>,
}

impl Disposed {
    pub(super) fn new(shared: Arc<LifecycleShared>, completion: Completion) -> Self {
        Self {
            shared,
            completion,
            driver: None,
        }
    }
}

impl Future for Disposed {
    type Output = Result<(), DisposeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        if this.driver.is_none() {
            this.driver = this.shared.parked_or_register(cx.waker());
        }
        if let Some(driver) = &mut this.driver {
            if driver.poll_unpin(cx).is_ready() {
                this.driver = None;
            }
        }
        this.completion.poll_unpin(cx)
    }
}

impl Debug for Disposed {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Disposed").finish_non_exhaustive()
    }
}
