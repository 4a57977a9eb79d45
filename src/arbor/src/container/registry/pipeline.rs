use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::config::{FilterConfig, NodeConfig};
use crate::container::registry::builders::{
    DefaultActivatorBuilder, DefaultDisposeHandlerBuilder, DefaultMultiplicityBuilder,
    DefaultNodeBuilder, DefaultScopeBinderBuilder, DefaultVisibilityBuilder,
};
use crate::container::registry::ConfigError;
use crate::container::{Multiplicity, ScopeBinder};
use crate::provider::dispose::DisposeHandler;
use crate::provider::Activator;
use crate::tree::{NodeParts, Visibility};

/// One link of the build [`Pipeline`].
///
/// Every method either handles the configuration it is given or hands it to
/// the rest of the chain through `next`. The default implementations do the
/// latter, so an interceptor only overrides what it understands.
pub trait Interceptor: Send + Sync + 'static {
    fn build_node(&self, config: &NodeConfig, next: Next<'_>) -> Result<NodeParts, ConfigError> {
        next.build_node(config)
    }

    fn build_activator(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<Option<Arc<dyn Activator>>, ConfigError> {
        next.build_activator(config)
    }

    fn build_visibility(
        &self,
        filter: &FilterConfig,
        next: Next<'_>,
    ) -> Result<Arc<dyn Visibility>, ConfigError> {
        next.build_visibility(filter)
    }

    fn build_scope_binder(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<ScopeBinder, ConfigError> {
        next.build_scope_binder(config)
    }

    fn build_multiplicity(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<Multiplicity, ConfigError> {
        next.build_multiplicity(config)
    }

    fn build_dispose_handler(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<Arc<dyn DisposeHandler>, ConfigError> {
        next.build_dispose_handler(config)
    }
}

/// The remainder of a pipeline after the current interceptor.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    pipeline: &'a Pipeline,
    index: usize,
}

impl<'a> Next<'a> {
    /// The whole pipeline, for builders which assemble their result from
    /// the other kinds of strategies.
    pub fn pipeline(&self) -> &'a Pipeline {
        self.pipeline
    }

    fn split(self) -> Option<(&'a dyn Interceptor, Next<'a>)> {
        let interceptor = self.pipeline.interceptors.get(self.index)?;
        let next = Next {
            pipeline: self.pipeline,
            index: self.index + 1,
        };
        Some((interceptor.as_ref(), next))
    }

    pub fn build_node(self, config: &NodeConfig) -> Result<NodeParts, ConfigError> {
        match self.split() {
            Some((interceptor, next)) => interceptor.build_node(config, next),
            None => unsupported("node", config),
        }
    }

    pub fn build_activator(
        self,
        config: &NodeConfig,
    ) -> Result<Option<Arc<dyn Activator>>, ConfigError> {
        match self.split() {
            Some((interceptor, next)) => interceptor.build_activator(config, next),
            None => unsupported("activation", config),
        }
    }

    pub fn build_visibility(
        self,
        filter: &FilterConfig,
    ) -> Result<Arc<dyn Visibility>, ConfigError> {
        match self.split() {
            Some((interceptor, next)) => interceptor.build_visibility(filter, next),
            None => Err(ConfigError::Unsupported {
                kind: "filter",
                detail: format!("{filter:?}"),
            }),
        }
    }

    pub fn build_scope_binder(self, config: &NodeConfig) -> Result<ScopeBinder, ConfigError> {
        match self.split() {
            Some((interceptor, next)) => interceptor.build_scope_binder(config, next),
            None => unsupported("scope binding", config),
        }
    }

    pub fn build_multiplicity(self, config: &NodeConfig) -> Result<Multiplicity, ConfigError> {
        match self.split() {
            Some((interceptor, next)) => interceptor.build_multiplicity(config, next),
            None => unsupported("multiplicity", config),
        }
    }

    pub fn build_dispose_handler(
        self,
        config: &NodeConfig,
    ) -> Result<Arc<dyn DisposeHandler>, ConfigError> {
        match self.split() {
            Some((interceptor, next)) => interceptor.build_dispose_handler(config, next),
            None => unsupported("dispose", config),
        }
    }
}

fn unsupported<T>(kind: &'static str, config: &NodeConfig) -> Result<T, ConfigError> {
    Err(ConfigError::Unsupported {
        kind,
        detail: config.key().to_string(),
    })
}

/// An ordered chain of [`Interceptor`]s turning configuration into
/// strategies.
pub struct Pipeline {
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl Pipeline {
    /// A pipeline without any interceptor, rejecting every configuration.
    pub fn empty() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Puts `interceptor` in front of the chain.
    pub fn intercept<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.interceptors.insert(0, Box::new(interceptor));
        self
    }

    /// Puts `interceptor` at the end of the chain.
    pub fn append<I: Interceptor>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    fn start(&self) -> Next<'_> {
        Next {
            pipeline: self,
            index: 0,
        }
    }

    pub fn build_node(&self, config: &NodeConfig) -> Result<NodeParts, ConfigError> {
        self.start().build_node(config)
    }

    pub fn build_activator(
        &self,
        config: &NodeConfig,
    ) -> Result<Option<Arc<dyn Activator>>, ConfigError> {
        self.start().build_activator(config)
    }

    pub fn build_visibility(
        &self,
        filter: &FilterConfig,
    ) -> Result<Arc<dyn Visibility>, ConfigError> {
        self.start().build_visibility(filter)
    }

    pub fn build_scope_binder(&self, config: &NodeConfig) -> Result<ScopeBinder, ConfigError> {
        self.start().build_scope_binder(config)
    }

    pub fn build_multiplicity(&self, config: &NodeConfig) -> Result<Multiplicity, ConfigError> {
        self.start().build_multiplicity(config)
    }

    pub fn build_dispose_handler(
        &self,
        config: &NodeConfig,
    ) -> Result<Arc<dyn DisposeHandler>, ConfigError> {
        self.start().build_dispose_handler(config)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::empty()
            .append(DefaultNodeBuilder)
            .append(DefaultActivatorBuilder)
            .append(DefaultVisibilityBuilder)
            .append(DefaultScopeBinderBuilder)
            .append(DefaultMultiplicityBuilder)
            .append(DefaultDisposeHandlerBuilder)
    }
}

impl Debug for Pipeline {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Pipeline")
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{MultiplicityConfig, ScopeBinding};
    use crate::key;

    use super::*;

    struct Service;

    struct EveryoneTransient;

    impl Interceptor for EveryoneTransient {
        fn build_multiplicity(
            &self,
            _config: &NodeConfig,
            _next: Next<'_>,
        ) -> Result<Multiplicity, ConfigError> {
            Ok(Multiplicity::Transient)
        }
    }

    struct CustomMultiplicity;

    impl Interceptor for CustomMultiplicity {
        fn build_multiplicity(
            &self,
            config: &NodeConfig,
            next: Next<'_>,
        ) -> Result<Multiplicity, ConfigError> {
            match config.multiplicity() {
                Some(MultiplicityConfig::Custom("pooled")) => Ok(Multiplicity::PerResolve),
                _ => next.build_multiplicity(config),
            }
        }
    }

    #[test]
    fn pipeline_build_node_succeeds() {
        let config = NodeConfig::scope(key::of::<Service>());
        let parts = Pipeline::default().build_node(&config).unwrap();
        assert!(parts.activator.is_none());
        assert_eq!(parts.multiplicity, Multiplicity::Singleton);
        assert_eq!(parts.binder, ScopeBinder::Registration);
    }

    #[test]
    fn pipeline_intercept_overrides_defaults() {
        let pipeline = Pipeline::default().intercept(EveryoneTransient);
        assert_eq!(pipeline.len(), 7);

        let config = NodeConfig::scope(key::of::<Service>());
        let parts = pipeline.build_node(&config).unwrap();
        assert_eq!(parts.multiplicity, Multiplicity::Transient);
    }

    #[test]
    fn pipeline_intercept_forwards_to_next() {
        let pipeline = Pipeline::default().intercept(CustomMultiplicity);

        let custom = NodeConfig::scope(key::of::<Service>())
            .with_multiplicity(MultiplicityConfig::Custom("pooled"));
        assert_eq!(
            pipeline.build_multiplicity(&custom).unwrap(),
            Multiplicity::PerResolve
        );

        let plain = NodeConfig::scope(key::of::<Service>())
            .with_multiplicity(MultiplicityConfig::Transient);
        assert_eq!(
            pipeline.build_multiplicity(&plain).unwrap(),
            Multiplicity::Transient
        );
    }

    #[test]
    fn pipeline_build_fails_when_configuration_is_unsupported() {
        let custom = NodeConfig::scope(key::of::<Service>())
            .with_multiplicity(MultiplicityConfig::Custom("pooled"));
        let err = Pipeline::default().build_multiplicity(&custom).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { kind: "multiplicity", .. }));

        let per_query = NodeConfig::scope(key::of::<Service>()).bound_by(ScopeBinding::PerQuery);
        let err = Pipeline::default().build_node(&per_query).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { kind: "scope binding", .. }));

        let err = Pipeline::empty().build_node(&per_query).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { kind: "node", .. }));
    }
}
