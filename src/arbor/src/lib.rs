#![allow(clippy::new_without_default)]

extern crate self as arbor;

pub mod config;
pub mod container;
pub mod key;
pub mod lifecycle;
pub mod module;
pub mod provider;
pub mod tree;
mod util;

pub use arbor_derive::component;

pub mod prelude {
    pub use crate::component;
    pub use crate::container::injector::{Injector, Lease, ResolveArgs, ResolveError, Resolver};
    pub use crate::container::registry::{ConfigError, Configurer, Registry};
    pub use crate::container::{Host, RootScope};
    pub use crate::key;
    pub use crate::lifecycle::{Disposable, DisposeError};
    pub use crate::module::{bind, bind_key, scope, scope_key, Configuration, Module};
    pub use crate::provider::dispose::{AsyncDispose, Dispose};
}
