//! A fluent way of writing [`NodeConfig`]s.
//!
//! ```rust
//! # use std::error::Error;
//! # use arbor::prelude::*;
//! struct Application;
//!
//! impl Module for Application {
//!     fn configure(
//!         &self,
//!         configurer: &mut dyn Configurer,
//!     ) -> Result<(), Box<dyn Error + Send + Sync>> {
//!         bind::<u16>().to_instance(8080).set_on(configurer);
//!         bind::<String>()
//!             .to_factory(|port: u16| async move { Ok::<_, Fail>(format!("0.0.0.0:{port}")) })
//!             .transient()
//!             .set_on(configurer);
//!         Ok(())
//!     }
//! }
//! # type Fail = std::convert::Infallible;
//! ```
//!
//! [`NodeConfig`]: crate::config::NodeConfig

mod binding;
mod scope_helper;

use crate::container::Managed;
use crate::key::TypedKey;

pub use binding::Binding;
pub use scope_helper::ScopeDefinition;

pub fn bind<T: Managed>() -> Binding<T, ()> {
    Binding::new(())
}

pub fn bind_key<K: TypedKey>(key: K) -> Binding<K::Target, K::Qualifier> {
    Binding::new(key.qualifier())
}

pub fn scope<S: Managed>() -> ScopeDefinition {
    ScopeDefinition::new(Box::new(crate::key::of::<S>()))
}

pub fn scope_key<K: TypedKey>(key: K) -> ScopeDefinition {
    ScopeDefinition::new(Box::new(key))
}
