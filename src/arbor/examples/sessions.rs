//! One transcript per accepted session, closed as soon as the session ends.

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor::config::FilterConfig;
use arbor::prelude::*;

type BoxError = Box<dyn Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let host = Host::init(ChatModule { room: "lobby" })?;

    let server = host.get(key::of::<Arc<Server>>()).await?;
    for user in ["ada", "grace", "linus"] {
        server.accept(user).await?;
    }
    drop(server);

    host.shutdown().await?;
    Ok(())
}

struct ChatModule {
    room: &'static str,
}

impl Module for ChatModule {
    fn configure(&self, configurer: &mut dyn Configurer) -> Result<(), BoxError> {
        bind::<&'static str>()
            .to_instance(self.room)
            .named("room")
            .set_on(configurer);

        bind::<Arc<dyn Audit>>()
            .to_component::<StderrAudit>()
            .set_on(configurer);

        bind::<Arc<Tickets>>()
            .to_instance(Arc::new(Tickets::default()))
            .set_on(configurer);

        scope::<Session>()
            .transient()
            .child(bind::<Transcript>().to_component::<Transcript>().disposable())
            .exporting_to_parent(FilterConfig::AllowAll)
            .set_on(configurer);

        bind::<Arc<Server>>().to_component::<Server>().set_on(configurer);
        Ok(())
    }
}

struct Session;

trait Audit: Send + Sync + 'static {
    fn record(&self, line: String);
}

struct StderrAudit {
    room: &'static str,
}

#[component(Arc<dyn Audit>, Arc::new)]
impl StderrAudit {
    #[inject]
    fn new(#[named("room")] room: &'static str) -> Self {
        Self { room }
    }
}

impl Audit for StderrAudit {
    fn record(&self, line: String) {
        eprintln!("#{} {line}", self.room);
    }
}

#[derive(Default)]
struct Tickets(AtomicUsize);

struct Transcript {
    ticket: usize,
    audit: Arc<dyn Audit>,
}

#[component]
impl Transcript {
    #[inject]
    fn open(audit: Arc<dyn Audit>, tickets: Arc<Tickets>) -> Self {
        let ticket = tickets.0.fetch_add(1, Ordering::Relaxed);
        audit.record(format!("transcript {ticket} opened"));
        Self { ticket, audit }
    }

    fn write(&self, user: &str) {
        self.audit.record(format!("transcript {}: {user} joined", self.ticket));
    }
}

impl Dispose for Transcript {
    fn dispose(&self) {
        self.audit.record(format!("transcript {} closed", self.ticket));
    }
}

struct Server {
    resolver: Resolver,
}

#[component(Arc<Server>, Arc::new)]
impl Server {
    #[inject]
    fn new(resolver: Resolver) -> Self {
        Self { resolver }
    }

    async fn accept(&self, user: &str) -> Result<(), BoxError> {
        let transcript = self.resolver.get(key::of::<Transcript>()).await?;
        transcript.write(user);
        transcript.release().await?;
        Ok(())
    }
}
