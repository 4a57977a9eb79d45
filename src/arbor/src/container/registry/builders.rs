use std::sync::Arc;

use crate::config::{
    ActivationConfig, FilterConfig, MultiplicityConfig, NodeConfig, NodeKind, ScopeBinding,
};
use crate::container::registry::{ConfigError, Interceptor, Next};
use crate::container::{Multiplicity, ScopeBinder};
use crate::provider::dispose::{self, DisposeHandler};
use crate::provider::instance::InstanceActivator;
use crate::provider::Activator;
use crate::tree::{AllowAll, DenyAll, KeySet, NodeParts, PatternVisibility, Visibility};

/// Assembles a node from the strategies built by the whole pipeline.
///
/// Unset filters default to allow-all for exports to children and imports
/// from the parent, and to deny-all for exports to the parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNodeBuilder;

impl Interceptor for DefaultNodeBuilder {
    fn build_node(&self, config: &NodeConfig, next: Next<'_>) -> Result<NodeParts, ConfigError> {
        let pipeline = next.pipeline();
        let allow_all = FilterConfig::AllowAll;
        let deny_all = FilterConfig::DenyAll;
        Ok(NodeParts {
            key: config.key().dyn_clone(),
            export: pipeline.build_visibility(config.export().unwrap_or(&allow_all))?,
            export_to_parent: pipeline
                .build_visibility(config.export_to_parent().unwrap_or(&deny_all))?,
            import: pipeline.build_visibility(config.import().unwrap_or(&allow_all))?,
            binder: pipeline.build_scope_binder(config)?,
            activator: pipeline.build_activator(config)?,
            multiplicity: pipeline.build_multiplicity(config)?,
            dispose_handler: pipeline.build_dispose_handler(config)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultActivatorBuilder;

impl Interceptor for DefaultActivatorBuilder {
    fn build_activator(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<Option<Arc<dyn Activator>>, ConfigError> {
        let activator: Arc<dyn Activator> = match config.activation() {
            None if config.kind() == NodeKind::Scope => return Ok(None),
            None => {
                return Err(ConfigError::MissingStrategy {
                    key: config.key().dyn_clone(),
                })
            }
            Some(ActivationConfig::Instance(object)) => {
                Arc::new(InstanceActivator::new(Arc::clone(object)))
            }
            Some(ActivationConfig::Component(descriptor)) => descriptor.activator()?,
            Some(ActivationConfig::Factory(descriptor)) => descriptor.activator()?,
            Some(ActivationConfig::Custom(_)) => return next.build_activator(config),
        };
        Ok(Some(activator))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVisibilityBuilder;

impl Interceptor for DefaultVisibilityBuilder {
    fn build_visibility(
        &self,
        filter: &FilterConfig,
        next: Next<'_>,
    ) -> Result<Arc<dyn Visibility>, ConfigError> {
        match filter {
            FilterConfig::AllowAll => Ok(Arc::new(AllowAll)),
            FilterConfig::DenyAll => Ok(Arc::new(DenyAll)),
            FilterConfig::Keys(keys) => Ok(Arc::new(KeySet::new(keys.iter().cloned()))),
            FilterConfig::Pattern(pattern) => {
                Ok(Arc::new(PatternVisibility::new(Arc::clone(pattern))))
            }
            FilterConfig::Custom(_) => next.build_visibility(filter),
        }
    }
}

/// Supports anchoring under the registration scope only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultScopeBinderBuilder;

impl Interceptor for DefaultScopeBinderBuilder {
    fn build_scope_binder(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<ScopeBinder, ConfigError> {
        match config.scope_binding().unwrap_or_default() {
            ScopeBinding::RegistrationScope => Ok(ScopeBinder::Registration),
            ScopeBinding::PerQuery | ScopeBinding::ResolveOrigin => next.build_scope_binder(config),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMultiplicityBuilder;

impl Interceptor for DefaultMultiplicityBuilder {
    fn build_multiplicity(
        &self,
        config: &NodeConfig,
        next: Next<'_>,
    ) -> Result<Multiplicity, ConfigError> {
        match config.multiplicity() {
            None | Some(MultiplicityConfig::Singleton) => Ok(Multiplicity::Singleton),
            Some(MultiplicityConfig::PerResolve) => Ok(Multiplicity::PerResolve),
            Some(MultiplicityConfig::Transient) => Ok(Multiplicity::Transient),
            Some(MultiplicityConfig::Custom(_)) => next.build_multiplicity(config),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDisposeHandlerBuilder;

impl Interceptor for DefaultDisposeHandlerBuilder {
    fn build_dispose_handler(
        &self,
        config: &NodeConfig,
        _next: Next<'_>,
    ) -> Result<Arc<dyn DisposeHandler>, ConfigError> {
        Ok(dispose::handler_for(config.dispose()))
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DisposeCapability;
    use crate::container::registry::Pipeline;
    use crate::key::{self, TargetPattern};
    use crate::provider::dispose::MockDisposeHandler;

    use super::*;

    struct Service;

    #[test]
    fn default_activator_builder_fails_when_binding_has_no_activation() {
        let config = NodeConfig::binding(key::of::<Service>());
        let res = Pipeline::default().build_activator(&config);
        assert!(matches!(res, Err(ConfigError::MissingStrategy { .. })));
    }

    #[test]
    fn default_activator_builder_succeeds() {
        let config = NodeConfig::binding(key::of::<i32>())
            .with_activation(ActivationConfig::Instance(Arc::new(1i32)));
        let activator = Pipeline::default().build_activator(&config).unwrap();
        assert!(activator.is_some());
    }

    #[test]
    fn default_visibility_builder_succeeds() {
        let pipeline = Pipeline::default();
        let keys = FilterConfig::keys([Box::new(key::of::<i32>()) as Box<dyn crate::key::Key>]);
        let visibility = pipeline.build_visibility(&keys).unwrap();
        assert!(visibility.allows(&key::of::<i32>()));
        assert!(!visibility.allows(&key::of::<u8>()));

        let pattern = FilterConfig::pattern(TargetPattern::<u8>::new());
        let visibility = pipeline.build_visibility(&pattern).unwrap();
        assert!(visibility.allows(&key::named::<u8>("any")));

        let denied = pipeline.build_visibility(&FilterConfig::DenyAll).unwrap();
        assert!(!denied.allows(&key::of::<i32>()));
    }

    #[test]
    fn default_scope_binder_builder_fails_when_binding_is_resolve_origin() {
        let config = NodeConfig::scope(key::of::<Service>()).bound_by(ScopeBinding::ResolveOrigin);
        let err = Pipeline::default().build_scope_binder(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Unsupported { kind: "scope binding", .. }));
    }

    #[test]
    fn default_dispose_handler_builder_keeps_explicit_handler() {
        let mut handler = MockDisposeHandler::new();
        handler.expect_dispose().never();
        let handler: Arc<dyn DisposeHandler> = Arc::new(handler);

        let config = NodeConfig::scope(key::of::<Service>())
            .disposed_with(DisposeCapability::Handler(Arc::clone(&handler)));
        let built = Pipeline::default().build_dispose_handler(&config).unwrap();
        assert!(Arc::ptr_eq(&built, &handler));
    }
}
