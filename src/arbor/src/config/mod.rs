//! Declarative configuration consumed by the build phase.
//!
//! A configuration is a tree of [`NodeConfig`]s. Every strategy a node needs
//! is described by plain data and turned into its runtime form by the
//! interceptor [`Pipeline`](crate::container::registry::Pipeline). Anything
//! left unset falls back to the pipeline's defaults.

use std::any::Any;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::container::Managed;
use crate::key::{Key, Pattern, TypedKey};
use crate::provider::closure::FactoryDescriptor;
use crate::provider::component::ComponentDescriptor;
use crate::provider::dispose::{AsyncDispose, Dispose, DisposeHandler};
use crate::provider::BoxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Groups children and mediates visibility. Its instances hold a unit
    /// object unless an activation is given.
    Scope,
    /// Provides objects and requires an activation.
    Binding,
}

pub struct NodeConfig {
    key: Box<dyn Key>,
    kind: NodeKind,
    activation: Option<ActivationConfig>,
    multiplicity: Option<MultiplicityConfig>,
    export: Option<FilterConfig>,
    export_to_parent: Option<FilterConfig>,
    import: Option<FilterConfig>,
    scope_binding: Option<ScopeBinding>,
    dispose: DisposeCapability,
    children: Vec<Arc<NodeConfig>>,
}

impl NodeConfig {
    pub fn scope<K: TypedKey>(key: K) -> Self {
        Self::new(Box::new(key), NodeKind::Scope)
    }

    pub fn binding<K: TypedKey>(key: K) -> Self {
        Self::new(Box::new(key), NodeKind::Binding)
    }

    pub fn new(key: Box<dyn Key>, kind: NodeKind) -> Self {
        Self {
            key,
            kind,
            activation: None,
            multiplicity: None,
            export: None,
            export_to_parent: None,
            import: None,
            scope_binding: None,
            dispose: DisposeCapability::None,
            children: Vec::new(),
        }
    }

    pub fn with_activation(mut self, activation: ActivationConfig) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn with_multiplicity(mut self, multiplicity: MultiplicityConfig) -> Self {
        self.multiplicity = Some(multiplicity);
        self
    }

    /// Filters what this node passes down to its children.
    pub fn exporting(mut self, filter: FilterConfig) -> Self {
        self.export = Some(filter);
        self
    }

    /// Filters what this node passes up to its parent.
    pub fn exporting_to_parent(mut self, filter: FilterConfig) -> Self {
        self.export_to_parent = Some(filter);
        self
    }

    /// Filters what this node accepts from its parent.
    pub fn importing(mut self, filter: FilterConfig) -> Self {
        self.import = Some(filter);
        self
    }

    pub fn bound_by(mut self, binding: ScopeBinding) -> Self {
        self.scope_binding = Some(binding);
        self
    }

    pub fn disposed_with(mut self, dispose: DisposeCapability) -> Self {
        self.dispose = dispose;
        self
    }

    pub fn with_child(mut self, child: impl Into<Arc<NodeConfig>>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn push_child(&mut self, child: impl Into<Arc<NodeConfig>>) {
        self.children.push(child.into());
    }

    pub fn key(&self) -> &dyn Key {
        self.key.as_ref()
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn activation(&self) -> Option<&ActivationConfig> {
        self.activation.as_ref()
    }

    pub fn multiplicity(&self) -> Option<&MultiplicityConfig> {
        self.multiplicity.as_ref()
    }

    pub fn export(&self) -> Option<&FilterConfig> {
        self.export.as_ref()
    }

    pub fn export_to_parent(&self) -> Option<&FilterConfig> {
        self.export_to_parent.as_ref()
    }

    pub fn import(&self) -> Option<&FilterConfig> {
        self.import.as_ref()
    }

    pub fn scope_binding(&self) -> Option<ScopeBinding> {
        self.scope_binding
    }

    pub fn dispose(&self) -> &DisposeCapability {
        &self.dispose
    }

    pub fn children(&self) -> &[Arc<NodeConfig>] {
        &self.children
    }
}

impl Debug for NodeConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("NodeConfig")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("activation", &self.activation)
            .field("multiplicity", &self.multiplicity)
            .field("scope_binding", &self.scope_binding)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

/// How the objects of a node are constructed.
#[derive(Clone)]
pub enum ActivationConfig {
    /// An object that already exists.
    Instance(Arc<dyn Managed>),
    /// A type with a single designated constructor.
    Component(ComponentDescriptor),
    /// An asynchronous factory.
    Factory(FactoryDescriptor),
    /// Left to a custom interceptor.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl Debug for ActivationConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Instance(object) => f
                .debug_tuple("Instance")
                .field(&(**object).type_name())
                .finish(),
            Self::Component(descriptor) => f.debug_tuple("Component").field(descriptor).finish(),
            Self::Factory(descriptor) => f.debug_tuple("Factory").field(descriptor).finish(),
            Self::Custom(_) => f.debug_tuple("Custom").finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MultiplicityConfig {
    Singleton,
    PerResolve,
    Transient,
    /// Left to a custom interceptor.
    Custom(&'static str),
}

/// A visibility filter over keys.
#[derive(Clone)]
pub enum FilterConfig {
    AllowAll,
    DenyAll,
    Keys(Vec<Box<dyn Key>>),
    Pattern(Arc<dyn Pattern>),
    /// Left to a custom interceptor.
    Custom(Arc<dyn Any + Send + Sync>),
}

impl FilterConfig {
    pub fn keys(keys: impl IntoIterator<Item = Box<dyn Key>>) -> Self {
        Self::Keys(keys.into_iter().collect())
    }

    pub fn pattern<P: Pattern>(pattern: P) -> Self {
        Self::Pattern(Arc::new(pattern))
    }
}

impl Debug for FilterConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::AllowAll => write!(f, "AllowAll"),
            Self::DenyAll => write!(f, "DenyAll"),
            Self::Keys(keys) => f.debug_tuple("Keys").field(keys).finish(),
            Self::Pattern(_) => f.debug_tuple("Pattern").finish_non_exhaustive(),
            Self::Custom(_) => f.debug_tuple("Custom").finish_non_exhaustive(),
        }
    }
}

/// Policy selecting the instance a resolved object is anchored under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ScopeBinding {
    /// The instance of the scope the provider is registered in.
    #[default]
    RegistrationScope,
    /// The instance of the scope the query was issued against.
    PerQuery,
    /// The instance the resolve originated from.
    ResolveOrigin,
}

type SyncDisposeFn = dyn Fn(&dyn Managed) + Send + Sync;

type AsyncDisposeFn =
    dyn Fn(Arc<dyn Managed>) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// How the objects of a node are torn down.
#[derive(Clone, Default)]
pub enum DisposeCapability {
    #[default]
    None,
    Sync(Arc<SyncDisposeFn>),
    Async(Arc<AsyncDisposeFn>),
    Handler(Arc<dyn DisposeHandler>),
}

impl DisposeCapability {
    /// Tears objects of type `T` down through [`Dispose`].
    pub fn of_dispose<T: Dispose + Managed>() -> Self {
        Self::Sync(Arc::new(|object: &dyn Managed| {
            if let Some(object) = object.as_any().downcast_ref::<T>() {
                object.dispose();
            }
        }))
    }

    /// Tears objects of type `T` down through [`AsyncDispose`].
    pub fn of_async_dispose<T: AsyncDispose + Managed>() -> Self {
        Self::Async(Arc::new(|object: Arc<dyn Managed>| {
            async move {
                let object: &dyn Managed = &*object;
                match object.as_any().downcast_ref::<T>() {
                    Some(object) => object.dispose_async().await,
                    None => Ok(()),
                }
            }
            .boxed()
        }))
    }
}

impl Debug for DisposeCapability {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let name = match self {
            Self::None => "None",
            Self::Sync(_) => "Sync",
            Self::Async(_) => "Async",
            Self::Handler(_) => "Handler",
        };
        f.write_str(name)
    }
}
