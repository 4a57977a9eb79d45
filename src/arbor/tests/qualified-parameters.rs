mod common;

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use arbor::prelude::*;
use futures::executor::block_on;

use common::{host, FnModule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Role {
    Primary,
    Replica,
}

#[derive(Debug, PartialEq)]
struct Mirror {
    primary: &'static str,
    replica: &'static str,
    fallback: &'static str,
    port: u16,
}

#[component]
impl Mirror {
    #[inject]
    fn new(
        #[qualified(Role::Primary)] primary: &'static str,
        #[qualified(Role::Replica)] replica: &'static str,
        #[named("fallback")] fallback: &'static str,
        port: u16,
    ) -> Self {
        Self {
            primary,
            replica,
            fallback,
            port,
        }
    }
}

struct Twins;

#[component]
impl Twins {
    #[inject]
    fn new(#[named("left")] _first: u8, #[named("left")] _second: u8) -> Self {
        Self
    }
}

struct SameRole;

#[component]
impl SameRole {
    #[inject]
    fn new(#[qualified(Role::Replica)] _first: u8, #[qualified(Role::Replica)] _second: u8) -> Self {
        Self
    }
}

#[derive(Debug)]
struct PortTaken(u16);

impl Display for PortTaken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "port {} is taken", self.0)
    }
}

impl Error for PortTaken {}

#[derive(Debug)]
struct Listener {
    port: u16,
}

#[component]
impl Listener {
    #[inject]
    fn open(#[named("listen")] port: u16) -> Result<Self, PortTaken> {
        match port {
            0 => Err(PortTaken(port)),
            port => Ok(Self { port }),
        }
    }
}

fn endpoints(configurer: &mut dyn Configurer) {
    bind::<&'static str>()
        .to_instance("db-1")
        .qualified_by(Role::Primary)
        .set_on(configurer);
    bind::<&'static str>()
        .to_instance("db-2")
        .qualified_by(Role::Replica)
        .set_on(configurer);
    bind::<&'static str>()
        .to_instance("db-local")
        .named("fallback")
        .set_on(configurer);
    bind::<&'static str>()
        .to_instance("unqualified")
        .set_on(configurer);
    bind::<u16>().to_instance(5432).set_on(configurer);
}

#[test]
fn component_resolves_each_qualified_parameter() {
    let host = host(|configurer| {
        endpoints(configurer);
        bind::<Mirror>().to_component::<Mirror>().set_on(configurer);
    });

    let mirror = block_on(host.get(key::of::<Mirror>())).unwrap();
    assert_eq!(
        *mirror,
        Mirror {
            primary: "db-1",
            replica: "db-2",
            fallback: "db-local",
            port: 5432,
        }
    );
}

#[test]
fn init_fails_when_named_parameters_repeat() {
    let err = Host::init(FnModule(|configurer: &mut dyn Configurer| {
        bind::<Twins>().to_component::<Twins>().set_on(configurer);
    }))
    .unwrap_err();

    match err {
        ConfigError::DuplicateParameter { key, .. } => {
            assert_eq!(key.to_string(), "u8@\"left\"");
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn init_fails_when_qualified_parameters_repeat() {
    let err = Host::init(FnModule(|configurer: &mut dyn Configurer| {
        bind::<SameRole>().to_component::<SameRole>().set_on(configurer);
    }))
    .unwrap_err();

    assert!(matches!(err, ConfigError::DuplicateParameter { .. }));
}

#[test]
fn fallible_constructor_error_is_reported_as_source() {
    let host = host(|configurer| {
        bind::<u16>().to_instance(0).named("listen").set_on(configurer);
        bind::<Listener>().to_component::<Listener>().set_on(configurer);
    });

    let err = block_on(host.get(key::of::<Listener>())).unwrap_err();
    match err {
        ResolveError::ObjectConstruction { source, .. } => {
            assert_eq!(source.to_string(), "port 0 is taken");
        }
        err => panic!("unexpected error: {err}"),
    }
}

#[test]
fn fallible_constructor_succeeds_with_valid_argument() {
    let host = host(|configurer| {
        bind::<u16>().to_instance(8080).named("listen").set_on(configurer);
        bind::<Listener>().to_component::<Listener>().set_on(configurer);
    });

    let listener = block_on(host.get(key::of::<Listener>())).unwrap();
    assert_eq!(listener.port, 8080);
}
