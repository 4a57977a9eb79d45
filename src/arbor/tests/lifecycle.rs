mod common;

use std::convert::Infallible;
use std::sync::Arc;
use std::task::Context;
use std::thread;
use std::time::Duration;

use arbor::prelude::*;
use arbor::provider::BoxError;
use futures::executor::block_on;
use futures::future::{BoxFuture, FutureExt};
use futures::task::noop_waker_ref;
use parking_lot::Mutex;

use common::{host, Counter, Journal};

#[derive(Clone)]
struct Database {
    journal: Journal,
}

impl Dispose for Database {
    fn dispose(&self) {
        self.journal.record("database");
    }
}

struct Repository {
    journal: Journal,
    _database: Database,
}

impl Dispose for Repository {
    fn dispose(&self) {
        self.journal.record("repository");
    }
}

struct Connection {
    closed: Counter,
}

impl AsyncDispose for Connection {
    fn dispose_async(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.closed.bump();
            Ok(())
        }
        .boxed()
    }
}

struct Session {
    closed: Counter,
}

impl Dispose for Session {
    fn dispose(&self) {
        self.closed.bump();
    }
}

/// Holds its teardown until the gate is opened.
#[derive(Clone)]
struct Gate(Arc<Mutex<Option<oneshot::Receiver<()>>>>);

impl AsyncDispose for Gate {
    fn dispose_async(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        let gate = self.0.lock().take();
        async move {
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(())
        }
        .boxed()
    }
}

struct Flaky;

impl AsyncDispose for Flaky {
    fn dispose_async(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        async { Err(BoxError::from("flush failed")) }.boxed()
    }
}

fn layered_host(journal: &Journal) -> Host {
    let journal = journal.clone();
    host(move |configurer| {
        let database = journal.clone();
        bind::<Database>()
            .to_factory(move || {
                let journal = database.clone();
                async move { Ok::<_, Infallible>(Database { journal }) }
            })
            .disposable()
            .set_on(configurer);
        let repository = journal.clone();
        bind::<Repository>()
            .to_factory(move |database: Database| {
                let journal = repository.clone();
                async move {
                    Ok::<_, Infallible>(Repository {
                        journal,
                        _database: database,
                    })
                }
            })
            .disposable()
            .set_on(configurer);
    })
}

#[test]
fn shutdown_disposes_dependents_first() {
    let journal = Journal::default();
    let host = layered_host(&journal);

    block_on(host.warm_up(key::of::<Repository>())).unwrap();
    block_on(host.shutdown()).unwrap();

    assert_eq!(journal.entries(), vec!["repository", "database"]);
    assert_eq!(host.stats().instances, 0);
}

#[test]
fn shutdown_disposes_once() {
    let journal = Journal::default();
    let host = layered_host(&journal);

    block_on(host.warm_up(key::of::<Repository>())).unwrap();
    host.start_dispose();
    host.start_dispose();
    block_on(host.disposed()).unwrap();
    block_on(host.shutdown()).unwrap();

    assert_eq!(journal.entries().len(), 2);
}

#[test]
fn releasing_transient_lease_disposes_it() {
    let closed = Counter::default();
    let host = host({
        let closed = closed.clone();
        move |configurer| {
            let closed = closed.clone();
            bind::<Session>()
                .to_factory(move || {
                    let closed = closed.clone();
                    async move { Ok::<_, Infallible>(Session { closed }) }
                })
                .transient()
                .disposable()
                .set_on(configurer);
        }
    });

    let first = block_on(host.get(key::of::<Session>())).unwrap();
    let second = block_on(host.get(key::of::<Session>())).unwrap();
    block_on(first.release()).unwrap();
    assert_eq!(closed.get(), 1);

    drop(second);
    assert_eq!(closed.get(), 2);
    assert_eq!(host.stats().instances, 1);
}

#[test]
fn singleton_outlives_its_leases() {
    let closed = Counter::default();
    let host = host({
        let closed = closed.clone();
        move |configurer| {
            let closed = closed.clone();
            bind::<Session>()
                .to_factory(move || {
                    let closed = closed.clone();
                    async move { Ok::<_, Infallible>(Session { closed }) }
                })
                .disposable()
                .set_on(configurer);
        }
    });

    let lease = block_on(host.get(key::of::<Session>())).unwrap();
    block_on(lease.release()).unwrap();
    assert_eq!(closed.get(), 0);

    block_on(host.shutdown()).unwrap();
    assert_eq!(closed.get(), 1);
}

#[test]
fn resolver_fails_after_shutdown() {
    struct Holder {
        resolver: Resolver,
    }

    #[component]
    impl Holder {
        #[inject]
        fn new(resolver: Resolver) -> Self {
            Self { resolver }
        }
    }

    let host = host(|configurer| {
        bind::<u32>().to_instance(3).set_on(configurer);
        bind::<Holder>().to_component::<Holder>().set_on(configurer);
    });

    let holder = block_on(host.get(key::of::<Holder>())).unwrap();
    let resolver = holder.resolver.clone();
    assert_eq!(*block_on(resolver.get(key::of::<u32>())).unwrap(), 3);
    drop(holder);

    block_on(host.shutdown()).unwrap();
    let err = block_on(resolver.get(key::of::<u32>())).unwrap_err();
    assert!(matches!(err, ResolveError::Disposed { .. }));
}

#[tokio::test]
async fn shutdown_awaits_async_dispose() {
    let closed = Counter::default();
    let host = host({
        let closed = closed.clone();
        move |configurer| {
            let closed = closed.clone();
            bind::<Connection>()
                .to_factory(move || {
                    let closed = closed.clone();
                    async move { Ok::<_, Infallible>(Connection { closed }) }
                })
                .async_disposable()
                .set_on(configurer);
        }
    });

    host.warm_up(key::of::<Connection>()).await.unwrap();
    host.shutdown().await.unwrap();
    assert_eq!(closed.get(), 1);
    assert_eq!(host.stats().instances, 0);
}

#[test]
fn shutdown_without_runtime_completes_for_every_waiter() {
    let (tx, rx) = oneshot::channel::<()>();
    let gate = Gate(Arc::new(Mutex::new(Some(rx))));
    let host = host(move |configurer| {
        bind::<Gate>()
            .to_instance(gate.clone())
            .async_disposable()
            .set_on(configurer);
    });
    block_on(host.warm_up(key::of::<Gate>())).unwrap();

    host.start_dispose();
    let waiter = {
        let host = host.clone();
        thread::spawn(move || block_on(host.disposed()))
    };
    thread::sleep(Duration::from_millis(20));

    let mut dropped = host.disposed();
    let mut cx = Context::from_waker(noop_waker_ref());
    assert!(dropped.poll_unpin(&mut cx).is_pending());
    drop(dropped);

    tx.send(()).unwrap();
    assert!(waiter.join().unwrap().is_ok());
    assert_eq!(host.stats().instances, 0);
}

#[test]
fn releasing_lease_returns_dispose_failure() {
    let host = host(|configurer| {
        bind::<Flaky>()
            .to_factory(|| async { Ok::<_, Infallible>(Flaky) })
            .transient()
            .async_disposable()
            .set_on(configurer);
    });

    let lease = block_on(host.get(key::of::<Flaky>())).unwrap();
    let err = block_on(lease.release()).unwrap_err();
    assert!(matches!(err, DisposeError::Handler { .. }));
    assert!(err.is_expected());
    assert_eq!(host.stats().instances, 1);
}

#[test]
fn shutdown_completes_when_dispose_handler_fails() {
    let host = host(|configurer| {
        bind::<Flaky>()
            .to_factory(|| async { Ok::<_, Infallible>(Flaky) })
            .async_disposable()
            .set_on(configurer);
    });

    block_on(host.warm_up(key::of::<Flaky>())).unwrap();
    block_on(host.shutdown()).unwrap();
    assert_eq!(host.stats().instances, 0);
}

#[test]
fn dispose_is_skipped_without_opt_in() {
    let closed = Counter::default();
    let host = host({
        let closed = closed.clone();
        move |configurer| {
            let closed = closed.clone();
            bind::<Session>()
                .to_factory(move || {
                    let closed = closed.clone();
                    async move { Ok::<_, Infallible>(Session { closed }) }
                })
                .set_on(configurer);
        }
    });

    block_on(host.warm_up(key::of::<Session>())).unwrap();
    block_on(host.shutdown()).unwrap();
    assert_eq!(closed.get(), 0);
    assert_eq!(host.stats().instances, 0);
}
