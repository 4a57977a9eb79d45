//! Idempotent asynchronous disposal.
//!
//! Every disposable participant owns a [`Lifecycle`]. Disposal is requested
//! at most once, may be deferred while usage guards are outstanding, and
//! completes exactly once. Completion is observed through [`Disposed`],
//! which can be awaited any number of times, before or after disposal is
//! requested.

mod disposed;

use std::error::Error;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::mem;
use std::sync::Arc;
use std::task::{Context, Waker};

use futures::future::{BoxFuture, FutureExt, Shared};
use futures::task::noop_waker_ref;
use parking_lot::Mutex;
use snafu::prelude::*;

pub use disposed::Disposed;

/// The core teardown step of a participant.
pub type Teardown = BoxFuture<'static, Result<(), DisposeError>>;

type Completion = Shared<BoxFuture<'static, Result<(), DisposeError>>>;

/// A teardown driver nobody has handed to a runtime. Every [`Disposed`]
/// polls its own clone, so each of them stays registered for wakeups.
type Driver = Shared<BoxFuture<'static, ()>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Alive,
    DisposeRequested,
    Suspended,
    Disposing,
    Disposed,
}

pub struct Lifecycle {
    shared: Arc<LifecycleShared>,
    completion: Completion,
}

struct LifecycleShared {
    state: Mutex<State>,
    parked: Mutex<Parked>,
}

#[derive(Default)]
struct Parked {
    driver: Option<Driver>,
    /// Tasks which polled a [`Disposed`] before any driver was parked.
    waiters: Vec<Waker>,
}

struct State {
    phase: Phase,
    usage: usize,
    sender: Option<oneshot::Sender<Result<(), DisposeError>>>,
    pending: Option<Pending>,
}

struct Pending {
    teardown: Box<dyn FnOnce() -> Teardown + Send>,
    hook_error: Option<DisposeError>,
    sender: oneshot::Sender<Result<(), DisposeError>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        let completion = receiver
            .map(|res| res.unwrap_or_else(|_| Err(DisposeError::Abandoned)))
            .boxed()
            .shared();
        let state = State {
            phase: Phase::Alive,
            usage: 0,
            sender: Some(sender),
            pending: None,
        };
        Self {
            shared: Arc::new(LifecycleShared {
                state: Mutex::new(state),
                parked: Mutex::new(Parked::default()),
            }),
            completion,
        }
    }

    pub fn phase(&self) -> Phase {
        self.shared.state.lock().phase
    }

    pub fn is_alive(&self) -> bool {
        self.phase() == Phase::Alive
    }

    /// Requests disposal.
    ///
    /// Only the first call has any effect. `hook` runs while the lifetime
    /// lock is held, so it must not call back into this lifecycle. An error
    /// returned by the hook is reported through [`Lifecycle::disposed`] after
    /// `teardown` has completed.
    pub fn start<H, F>(&self, hook: H, teardown: F)
    where
        H: FnOnce() -> Result<(), DisposeError>,
        F: FnOnce() -> Teardown + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Alive {
            return;
        }
        state.phase = Phase::DisposeRequested;
        let hook_error = hook().err();
        let Some(sender) = state.sender.take() else {
            unreachable!("an alive lifecycle should still own its completion sender");
        };
        let pending = Pending {
            teardown: Box::new(teardown),
            hook_error,
            sender,
        };
        if state.usage > 0 {
            state.phase = Phase::Suspended;
            state.pending = Some(pending);
            return;
        }
        state.phase = Phase::Disposing;
        drop(state);
        LifecycleShared::run(&self.shared, pending);
    }

    /// Acquires a usage guard, which defers the teardown step until it is
    /// dropped. Returns `None` once disposal has been requested.
    pub fn usage(&self) -> Option<UsageGuard> {
        let mut state = self.shared.state.lock();
        if state.phase != Phase::Alive {
            return None;
        }
        state.usage += 1;
        Some(UsageGuard {
            shared: Arc::clone(&self.shared),
        })
    }

    pub fn disposed(&self) -> Disposed {
        Disposed::new(Arc::clone(&self.shared), self.completion.clone())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Lifecycle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let state = self.shared.state.lock();
        f.debug_struct("Lifecycle")
            .field("phase", &state.phase)
            .field("usage", &state.usage)
            .finish()
    }
}

impl LifecycleShared {
    fn run(this: &Arc<Self>, pending: Pending) {
        let shared = Arc::clone(this);
        let Pending {
            teardown,
            hook_error,
            sender,
        } = pending;
        let driver = async move {
            let res = match (teardown().await, hook_error) {
                (Err(err), _) => Err(err),
                (Ok(()), Some(err)) => Err(err),
                (Ok(()), None) => Ok(()),
            };
            shared.state.lock().phase = Phase::Disposed;
            let _ = sender.send(res);
        }
        .boxed();
        this.drive(driver);
    }

    /// Polls the driver once inline, so teardowns which never suspend finish
    /// before `start` returns. Unfinished drivers go to the ambient runtime
    /// if there is one, otherwise they are parked for [`Disposed`] to poll.
    fn drive(&self, mut driver: BoxFuture<'static, ()>) {
        let mut cx = Context::from_waker(noop_waker_ref());
        if driver.poll_unpin(&mut cx).is_ready() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(driver);
            }
            Err(_) => self.park(driver.shared()),
        }
    }

    /// Parks `driver` and wakes the tasks that polled before it existed, so
    /// they come back to poll it.
    fn park(&self, driver: Driver) {
        let waiters = {
            let mut parked = self.parked.lock();
            parked.driver = Some(driver);
            mem::take(&mut parked.waiters)
        };
        for waiter in waiters {
            waiter.wake();
        }
    }

    /// A clone of the parked driver. Without one, `waker` is woken once a
    /// driver is parked.
    fn parked_or_register(&self, waker: &Waker) -> Option<Driver> {
        let mut parked = self.parked.lock();
        if let Some(driver) = &parked.driver {
            return Some(driver.clone());
        }
        if !parked.waiters.iter().any(|waiter| waiter.will_wake(waker)) {
            parked.waiters.push(waker.clone());
        }
        None
    }
}

/// Keeps a participant in use. Dropping the last guard of a participant whose
/// disposal was requested starts its teardown.
pub struct UsageGuard {
    shared: Arc<LifecycleShared>,
}

impl Drop for UsageGuard {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.usage -= 1;
        if state.usage > 0 || state.phase != Phase::Suspended {
            return;
        }
        state.phase = Phase::Disposing;
        let Some(pending) = state.pending.take() else {
            unreachable!("a suspended lifecycle should hold its pending teardown");
        };
        drop(state);
        LifecycleShared::run(&self.shared, pending);
    }
}

impl Debug for UsageGuard {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("UsageGuard").finish_non_exhaustive()
    }
}

/// A participant whose disposal can be requested and observed.
pub trait Disposable: Send + Sync {
    /// Requests disposal. Idempotent and never fails synchronously.
    fn start_dispose(&self);

    fn disposed(&self) -> Disposed;
}

/// Implemented by types which carry a [`Lifecycle`] and know how to tear
/// themselves down. `Arc<T>` then implements [`Disposable`].
pub trait Lifecycled: Send + Sync + Sized + 'static {
    fn lifecycle(&self) -> &Lifecycle;

    fn on_dispose_started(&self) -> Result<(), DisposeError> {
        Ok(())
    }

    fn teardown(self: Arc<Self>) -> Teardown;
}

impl<T: Lifecycled> Disposable for Arc<T> {
    fn start_dispose(&self) {
        let this = Arc::clone(self);
        self.lifecycle()
            .start(|| self.on_dispose_started(), move || this.teardown());
    }

    fn disposed(&self) -> Disposed {
        self.lifecycle().disposed()
    }
}

#[derive(Debug, Clone, Snafu)]
#[non_exhaustive]
pub enum DisposeError {
    #[snafu(display("the dispose handler of {object} failed"))]
    #[non_exhaustive]
    Handler {
        object: &'static str,
        source: Arc<dyn Error + Send + Sync>,
    },
    #[snafu(display("the dispose hook failed"))]
    #[non_exhaustive]
    Hook { source: Arc<dyn Error + Send + Sync> },
    #[snafu(display("the lock {lock} has already been released"))]
    #[non_exhaustive]
    LockReleased { lock: u64 },
    #[snafu(display("the teardown was dropped before it completed"))]
    Abandoned,
}

impl DisposeError {
    /// Whether the error comes from user code rather than from a broken
    /// internal invariant.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::Handler { .. } | Self::Hook { .. })
    }
}

/// Reports a disposal error that has no awaiting observer.
pub(crate) fn report_unobserved(err: &DisposeError) {
    if err.is_expected() {
        tracing::warn!(error = %err, "disposal failed");
    } else {
        tracing::error!(error = %err, "disposal failed unexpectedly");
        debug_assert!(false, "unexpected disposal error: {err}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use futures::executor::block_on;

    use super::*;

    fn counting_teardown(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> Teardown + Send + 'static {
        let counter = Arc::clone(counter);
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[test]
    fn start_runs_teardown_once() {
        let lifecycle = Lifecycle::new();
        let counter = Arc::new(AtomicUsize::new(0));

        lifecycle.start(|| Ok(()), counting_teardown(&counter));
        lifecycle.start(|| Ok(()), counting_teardown(&counter));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.phase(), Phase::Disposed);
        assert!(block_on(lifecycle.disposed()).is_ok());
    }

    #[test]
    fn synchronous_teardown_completes_inline() {
        let lifecycle = Lifecycle::new();
        let disposed = lifecycle.disposed();

        lifecycle.start(|| Ok(()), || async { Ok(()) }.boxed());

        assert!(matches!(disposed.now_or_never(), Some(Ok(()))));
    }

    #[test]
    fn usage_guard_defers_teardown() {
        let lifecycle = Lifecycle::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let guard = lifecycle.usage().unwrap();

        lifecycle.start(|| Ok(()), counting_teardown(&counter));
        assert_eq!(lifecycle.phase(), Phase::Suspended);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(lifecycle.usage().is_none());

        drop(guard);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(lifecycle.phase(), Phase::Disposed);
    }

    #[test]
    fn hook_error_is_reported_after_teardown() {
        let lifecycle = Lifecycle::new();
        let counter = Arc::new(AtomicUsize::new(0));

        lifecycle.start(
            || {
                Err(DisposeError::Hook {
                    source: Arc::from(Box::<dyn Error + Send + Sync>::from("hook")),
                })
            },
            counting_teardown(&counter),
        );

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let err = block_on(lifecycle.disposed()).unwrap_err();
        assert!(matches!(err, DisposeError::Hook { .. }));
    }

    #[test]
    fn pending_teardown_without_runtime_is_driven_by_awaiting() {
        let lifecycle = Lifecycle::new();
        let (tx, rx) = oneshot::channel::<()>();

        lifecycle.start(
            || Ok(()),
            move || {
                async move {
                    let _ = rx.await;
                    Ok(())
                }
                .boxed()
            },
        );
        assert_eq!(lifecycle.phase(), Phase::Disposing);

        tx.send(()).unwrap();
        assert!(block_on(lifecycle.disposed()).is_ok());
        assert_eq!(lifecycle.phase(), Phase::Disposed);
    }

    #[tokio::test]
    async fn pending_teardown_is_spawned_on_ambient_runtime() {
        let lifecycle = Lifecycle::new();
        let (tx, rx) = oneshot::channel::<()>();

        lifecycle.start(
            || Ok(()),
            move || {
                async move {
                    let _ = rx.await;
                    Ok(())
                }
                .boxed()
            },
        );

        tx.send(()).unwrap();
        lifecycle.disposed().await.unwrap();
    }

    fn gated_teardown(gate: oneshot::Receiver<()>) -> impl FnOnce() -> Teardown + Send + 'static {
        move || {
            async move {
                let _ = gate.await;
                Ok(())
            }
            .boxed()
        }
    }

    #[test]
    fn pending_teardown_wakes_waiter_when_polling_waiter_is_dropped() {
        let lifecycle = Lifecycle::new();
        let (tx, rx) = oneshot::channel::<()>();
        lifecycle.start(|| Ok(()), gated_teardown(rx));

        let waiter = {
            let disposed = lifecycle.disposed();
            thread::spawn(move || block_on(disposed))
        };
        thread::sleep(Duration::from_millis(20));

        let mut dropped = lifecycle.disposed();
        let mut cx = Context::from_waker(noop_waker_ref());
        assert!(dropped.poll_unpin(&mut cx).is_pending());
        drop(dropped);

        tx.send(()).unwrap();
        assert!(waiter.join().unwrap().is_ok());
        assert_eq!(lifecycle.phase(), Phase::Disposed);
    }

    #[test]
    fn pending_teardown_wakes_waiter_that_polled_before_start() {
        let lifecycle = Lifecycle::new();
        let waiter = {
            let disposed = lifecycle.disposed();
            thread::spawn(move || block_on(disposed))
        };
        thread::sleep(Duration::from_millis(20));

        let (tx, rx) = oneshot::channel::<()>();
        lifecycle.start(|| Ok(()), gated_teardown(rx));
        tx.send(()).unwrap();
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn dispose_error_is_expected_only_for_user_failures() {
        let hook = DisposeError::Hook {
            source: Arc::from(Box::<dyn Error + Send + Sync>::from("hook")),
        };
        assert!(hook.is_expected());
        assert!(!DisposeError::LockReleased { lock: 3 }.is_expected());
        assert!(!DisposeError::Abandoned.is_expected());

        report_unobserved(&hook);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "unexpected disposal error")]
    fn report_unobserved_asserts_on_broken_invariants() {
        report_unobserved(&DisposeError::LockReleased { lock: 3 });
    }
}
