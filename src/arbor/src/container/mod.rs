pub mod injector;
pub mod registry;

mod binder;
mod core;
mod graph;
mod handle;
mod instance;
mod multiplicity;

use crate::util::any::AsAny;

pub use binder::ScopeBinder;
pub use graph::{GraphStats, InstanceId, LockId, LockKind};
pub use handle::{Host, RootScope};
pub use multiplicity::Multiplicity;

pub(crate) use self::core::Core;

pub trait Managed: AsAny + Send + Sync + 'static {}

impl<T> Managed for T where T: AsAny + Send + Sync + 'static {}
