use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::{ActivationConfig, DisposeCapability, MultiplicityConfig, NodeConfig};
use crate::container::registry::Configurer;
use crate::container::Managed;
use crate::key::{self, TypedQualifier};
use crate::provider::closure::{Factory, FactoryDescriptor, RawFactory};
use crate::provider::component::{Component, ComponentDescriptor};
use crate::provider::dispose::{AsyncDispose, Dispose, DisposeHandler};

/// A binding of objects of type `T` under a qualifier of type `Q`.
///
/// Objects are not torn down unless the binding says how. A `T` implementing
/// [`Dispose`] or [`AsyncDispose`] needs [`Binding::disposable`] or
/// [`Binding::async_disposable`], and any other teardown goes through
/// [`Binding::disposed_by`]. Without one of them the dispose handler is a
/// no-op.
pub struct Binding<T, Q>
where
    T: Managed,
    Q: TypedQualifier,
{
    qualifier: Q,
    activation: Option<ActivationConfig>,
    multiplicity: Option<MultiplicityConfig>,
    dispose: DisposeCapability,
    _marker: PhantomData<fn() -> T>,
}

impl<T, Q> Binding<T, Q>
where
    T: Managed,
    Q: TypedQualifier,
{
    pub(super) fn new(qualifier: Q) -> Self {
        Self {
            qualifier,
            activation: None,
            multiplicity: None,
            dispose: DisposeCapability::None,
            _marker: PhantomData,
        }
    }

    pub fn named(self, name: &'static str) -> Binding<T, &'static str> {
        self.qualified_by(name)
    }

    pub fn qualified_by<NewQ: TypedQualifier>(self, qualifier: NewQ) -> Binding<T, NewQ> {
        Binding {
            qualifier,
            activation: self.activation,
            multiplicity: self.multiplicity,
            dispose: self.dispose,
            _marker: PhantomData,
        }
    }

    pub fn to_instance(mut self, instance: T) -> Self {
        self.activation = Some(ActivationConfig::Instance(Arc::new(instance)));
        self
    }

    pub fn to_component<C>(mut self) -> Self
    where
        C: Component<Constructed = T>,
    {
        self.activation = Some(ActivationConfig::Component(ComponentDescriptor::of::<C>()));
        self
    }

    pub fn to_factory<F, D>(mut self, factory: F) -> Self
    where
        F: Factory<D, Constructed = T>,
        D: Send + Sync + 'static,
    {
        let descriptor = FactoryDescriptor::from_factory(factory);
        self.activation = Some(ActivationConfig::Factory(descriptor));
        self
    }

    pub fn to_raw_factory<F>(mut self, factory: F) -> Self
    where
        F: RawFactory<Constructed = T>,
    {
        let descriptor = FactoryDescriptor::from_raw(factory);
        self.activation = Some(ActivationConfig::Factory(descriptor));
        self
    }

    pub fn singleton(mut self) -> Self {
        self.multiplicity = Some(MultiplicityConfig::Singleton);
        self
    }

    pub fn per_resolve(mut self) -> Self {
        self.multiplicity = Some(MultiplicityConfig::PerResolve);
        self
    }

    pub fn transient(mut self) -> Self {
        self.multiplicity = Some(MultiplicityConfig::Transient);
        self
    }

    pub fn with_multiplicity(mut self, multiplicity: MultiplicityConfig) -> Self {
        self.multiplicity = Some(multiplicity);
        self
    }

    pub fn disposed_by<H: DisposeHandler>(mut self, handler: H) -> Self {
        self.dispose = DisposeCapability::Handler(Arc::new(handler));
        self
    }

    pub fn into_config(self) -> NodeConfig {
        let mut config = NodeConfig::binding(key::qualified::<T, Q>(self.qualifier))
            .disposed_with(self.dispose);
        if let Some(activation) = self.activation {
            config = config.with_activation(activation);
        }
        if let Some(multiplicity) = self.multiplicity {
            config = config.with_multiplicity(multiplicity);
        }
        config
    }

    pub fn set_on(self, configurer: &mut dyn Configurer) {
        configurer.register(self.into_config());
    }
}

impl<T, Q> Binding<T, Q>
where
    T: Managed + Dispose,
    Q: TypedQualifier,
{
    /// Calls [`Dispose::dispose`] on every object when it is torn down.
    pub fn disposable(mut self) -> Self {
        self.dispose = DisposeCapability::of_dispose::<T>();
        self
    }
}

impl<T, Q> Binding<T, Q>
where
    T: Managed + AsyncDispose,
    Q: TypedQualifier,
{
    /// Awaits [`AsyncDispose::dispose_async`] on every object when it is
    /// torn down.
    pub fn async_disposable(mut self) -> Self {
        self.dispose = DisposeCapability::of_async_dispose::<T>();
        self
    }
}

impl<T, Q> From<Binding<T, Q>> for NodeConfig
where
    T: Managed,
    Q: TypedQualifier,
{
    fn from(binding: Binding<T, Q>) -> Self {
        binding.into_config()
    }
}
