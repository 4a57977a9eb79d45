mod wrapper;

use std::any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::container::injector::ResolveError;
use crate::container::registry::ConfigError;
use crate::container::Managed;
use crate::key::Key;
use crate::provider::{Activator, Arguments, BoxError};

pub use wrapper::ComponentActivator;

/// A type with a designated constructor for dependency injection.
///
/// Usually, you don't need to implement the [`Component`] trait manually for
/// your components, because the [`component`] macro helps with this. In case
/// that you really want to write implementation in your own, take a look at
/// the following code snippet:
///
/// ```rust
/// # use std::sync::Arc;
/// # use arbor::key;
/// # use arbor::provider::component::{Component, Constructor};
/// #
/// trait Greeter: Send + Sync + 'static {}
///
/// struct Polite {
///     name: &'static str,
///     times: i32,
/// }
///
/// impl Greeter for Polite {}
///
/// impl Component for Polite {
///     type Constructed = Arc<dyn Greeter>;
///
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new(
///             "new",
///             vec![Box::new(key::of::<&'static str>()), Box::new(key::of::<i32>())],
///             |arguments| {
///                 let mut cursor = arguments.cursor();
///                 let name = cursor.take_next()?;
///                 let times = cursor.take_next()?;
///                 Ok(Ok(Polite { name, times }))
///             },
///         )]
///     }
///
///     fn post_process(self) -> Self::Constructed {
///         Arc::new(self)
///     }
/// }
/// ```
///
/// Exactly one constructor must be declared. The count is checked when the
/// configuration is built, not when the component is compiled.
///
/// [`component`]: crate::component
pub trait Component: Managed + Sized {
    /// The object handed out for the component. This can be not only `Self`,
    /// but also some boxed `Self`, such as `Arc<Self>` and `Arc<dyn Trait>`.
    type Constructed: Managed;

    fn constructors() -> Vec<Constructor<Self>>;

    /// Converts `self` to [`Component::Constructed`].
    fn post_process(self) -> Self::Constructed;
}

type Invoke<C> = fn(&Arguments) -> Result<Result<C, BoxError>, ResolveError>;

/// One way of constructing a component from its resolved parameters.
///
/// The outer error of `invoke` reports arguments that could not be taken,
/// and the inner one a failure of the constructor itself.
pub struct Constructor<C> {
    name: &'static str,
    parameters: Vec<Box<dyn Key>>,
    invoke: Invoke<C>,
}

impl<C> Constructor<C> {
    pub fn new(name: &'static str, parameters: Vec<Box<dyn Key>>, invoke: Invoke<C>) -> Self {
        Self {
            name,
            parameters,
            invoke,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn parameters(&self) -> &[Box<dyn Key>] {
        &self.parameters
    }

    pub fn invoke(&self, arguments: &Arguments) -> Result<Result<C, BoxError>, ResolveError> {
        (self.invoke)(arguments)
    }
}

impl<C> Debug for Constructor<C> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Constructor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A component type, erased for the configuration tree.
#[derive(Clone, Copy)]
pub struct ComponentDescriptor {
    component: &'static str,
    activator: fn() -> Result<Arc<dyn Activator>, ConfigError>,
}

impl ComponentDescriptor {
    pub fn of<C: Component>() -> Self {
        Self {
            component: any::type_name::<C>(),
            activator: activator_of::<C>,
        }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Validates the constructors and builds the activator.
    pub fn activator(&self) -> Result<Arc<dyn Activator>, ConfigError> {
        (self.activator)()
    }
}

impl Debug for ComponentDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_tuple("ComponentDescriptor")
            .field(&self.component)
            .finish()
    }
}

fn activator_of<C: Component>() -> Result<Arc<dyn Activator>, ConfigError> {
    let activator = ComponentActivator::<C>::new()?;
    Ok(Arc::new(activator))
}
